//! Minimal TopoJSON reader for polygonal grid layers.
//!
//! Only what the climate grids need is supported: quantized or plain arcs,
//! `Polygon`/`MultiPolygon` geometries and nested `GeometryCollection`s.
//! Other geometry types are skipped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Quantization transform; present when arcs are delta-encoded integers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopoTransform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TopoGeometry {
    GeometryCollection {
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
        #[serde(default)]
        properties: Option<Map<String, Value>>,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
        #[serde(default)]
        properties: Option<Map<String, Value>>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub transform: Option<TopoTransform>,
    pub objects: BTreeMap<String, TopoGeometry>,
    pub arcs: Vec<Vec<Vec<f64>>>,
}

/// Exterior ring plus properties of one polygonal geometry
pub type RingFeature<'a> = (Vec<(f64, f64)>, Option<&'a Map<String, Value>>);

impl Topology {
    /// Absolute coordinates of every arc, undoing quantization and delta encoding
    pub fn decode_arcs(&self) -> Vec<Vec<(f64, f64)>> {
        self.arcs
            .iter()
            .map(|arc| {
                let (mut x, mut y) = (0.0, 0.0);
                arc.iter()
                    .filter(|position| position.len() >= 2)
                    .map(|position| match &self.transform {
                        Some(t) => {
                            x += position[0];
                            y += position[1];
                            (x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1])
                        }
                        None => (position[0], position[1]),
                    })
                    .collect()
            })
            .collect()
    }

    /// Exterior rings of all polygonal geometries, objects in name order
    pub fn rings(&self) -> Vec<RingFeature<'_>> {
        let arcs = self.decode_arcs();
        let mut out = Vec::new();
        for geometry in self.objects.values() {
            collect_rings(geometry, &arcs, &mut out);
        }
        out
    }
}

fn collect_rings<'a>(
    geometry: &'a TopoGeometry,
    arcs: &[Vec<(f64, f64)>],
    out: &mut Vec<RingFeature<'a>>,
) {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for child in geometries {
                collect_rings(child, arcs, out);
            }
        }
        TopoGeometry::Polygon { arcs: rings, properties } => {
            if let Some(exterior) = rings.first() {
                out.push((stitch_ring(arcs, exterior), properties.as_ref()));
            }
        }
        TopoGeometry::MultiPolygon { arcs: polygons, properties } => {
            if let Some(exterior) = polygons.first().and_then(|p| p.first()) {
                out.push((stitch_ring(arcs, exterior), properties.as_ref()));
            }
        }
        TopoGeometry::Unsupported => {}
    }
}

/// Joins arcs into a closed ring. A negative index `i` refers to arc `!i`
/// traversed backwards; consecutive arcs share their joining point.
fn stitch_ring(arcs: &[Vec<(f64, f64)>], indices: &[i64]) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = Vec::new();

    for &index in indices {
        let (arc_index, reversed) = if index < 0 {
            ((!index) as usize, true)
        } else {
            (index as usize, false)
        };
        let Some(arc) = arcs.get(arc_index) else {
            log::debug!("topology ring references missing arc {}", arc_index);
            continue;
        };

        points.pop();
        if reversed {
            points.extend(arc.iter().rev());
        } else {
            points.extend(arc.iter());
        }
    }

    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last {
            points.push(first);
        }
    }
    points
}
