//! Decoding of tile and base-layer payloads into raw cells
//!
//! Payloads are either a GeoJSON `FeatureCollection` or a TopoJSON
//! `Topology`. Each feature carries `t1..t12`, `p1..p12` and `lat`; features
//! missing any of them are skipped rather than failing the whole payload.

pub mod cell;
pub mod geojson;
pub mod topojson;

use self::cell::RawCell;
use self::geojson::GeoJsonFeature;
use self::topojson::Topology;
use crate::core::constants::{MONTHS, PRECIPITATION_KEYS, TEMPERATURE_KEYS};
use crate::{Error, Result};
use geo_types::{LineString, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClimatePayload {
    FeatureCollection { features: Vec<GeoJsonFeature> },
    Topology(Topology),
}

/// Parses a payload and returns its cells in document order
pub fn decode_cells(resource: &str, bytes: &[u8]) -> Result<Vec<Arc<RawCell>>> {
    let payload: ClimatePayload = serde_json::from_slice(bytes).map_err(|e| Error::Decode {
        resource: resource.to_string(),
        message: e.to_string(),
    })?;

    let mut skipped = 0usize;
    let cells: Vec<Arc<RawCell>> = match &payload {
        ClimatePayload::FeatureCollection { features } => features
            .iter()
            .filter_map(|feature| {
                let ring = feature.geometry.as_ref().and_then(|g| g.exterior_ring());
                let cell = cell_from_parts(ring, feature.properties.as_ref());
                if cell.is_none() {
                    skipped += 1;
                }
                cell
            })
            .map(Arc::new)
            .collect(),
        ClimatePayload::Topology(topology) => topology
            .rings()
            .into_iter()
            .filter_map(|(ring, properties)| {
                let cell = cell_from_parts(Some(ring), properties);
                if cell.is_none() {
                    skipped += 1;
                }
                cell
            })
            .map(Arc::new)
            .collect(),
    };

    if skipped > 0 {
        log::debug!("{}: skipped {} features without complete climate data", resource, skipped);
    }

    Ok(cells)
}

/// Decodes a payload off the async executor when a tokio runtime is available
pub async fn decode_cells_async(resource: String, bytes: Vec<u8>) -> Result<Vec<Arc<RawCell>>> {
    #[cfg(feature = "tokio-runtime")]
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            let name = resource.clone();
            return tokio::task::spawn_blocking(move || decode_cells(&resource, &bytes))
                .await
                .map_err(|e| Error::Decode {
                    resource: name,
                    message: format!("decode task failed: {}", e),
                })?;
        }
    }

    decode_cells(&resource, &bytes)
}

/// Builds a cell from a ring and feature properties; `None` when anything is missing
fn cell_from_parts(
    ring: Option<Vec<(f64, f64)>>,
    properties: Option<&Map<String, Value>>,
) -> Option<RawCell> {
    let ring = ring.filter(|r| r.len() >= 3)?;
    let properties = properties?;

    let lat = number(properties, "lat")?;
    let temperature = monthly(properties, &TEMPERATURE_KEYS)?;
    let precipitation = monthly(properties, &PRECIPITATION_KEYS)?;

    let mut cell = RawCell::new(
        Polygon::new(LineString::from(ring), vec![]),
        lat,
        temperature,
        precipitation,
    );
    cell.lon = number(properties, "lon");
    Some(cell)
}

fn number(properties: &Map<String, Value>, key: &str) -> Option<f64> {
    properties
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn monthly(properties: &Map<String, Value>, keys: &[&str; MONTHS]) -> Option<[f64; MONTHS]> {
    let mut values = [0.0; MONTHS];
    for (slot, key) in values.iter_mut().zip(keys.iter()) {
        *slot = number(properties, key)?;
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn properties(lat: f64) -> Value {
        let mut props = serde_json::Map::new();
        props.insert("lat".into(), json!(lat));
        props.insert("lon".into(), json!(5.0));
        for month in 1..=12 {
            props.insert(format!("t{}", month), json!(month as f64));
            props.insert(format!("p{}", month), json!(10.0 * month as f64));
        }
        Value::Object(props)
    }

    #[test]
    fn test_decode_feature_collection() {
        let mut incomplete = properties(1.0);
        incomplete.as_object_mut().unwrap().remove("p7");

        let payload = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Polygon", "coordinates": [[[4.5, 0.5], [5.5, 0.5], [5.5, 1.5], [4.5, 1.5], [4.5, 0.5]]] },
                    "properties": properties(1.0)
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Polygon", "coordinates": [[[4.5, 1.5], [5.5, 1.5], [5.5, 2.5], [4.5, 2.5], [4.5, 1.5]]] },
                    "properties": incomplete
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": properties(3.0)
                }
            ]
        });

        let cells = decode_cells("tile.json", payload.to_string().as_bytes()).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].lat, 1.0);
        assert_eq!(cells[0].lon, Some(5.0));
        assert_eq!(cells[0].temperature[11], 12.0);
        assert_eq!(cells[0].precipitation[0], 10.0);
        assert_eq!(cells[0].geometry.exterior().0.len(), 5);
    }

    #[test]
    fn test_decode_topology() {
        let payload = json!({
            "type": "Topology",
            "objects": {
                "climate": {
                    "type": "GeometryCollection",
                    "geometries": [
                        { "type": "Polygon", "arcs": [[0]], "properties": properties(-12.5) }
                    ]
                }
            },
            "arcs": [[[0.0, -13.0], [1.0, -13.0], [1.0, -12.0], [0.0, -12.0], [0.0, -13.0]]]
        });

        let cells = decode_cells("base.topojson", payload.to_string().as_bytes()).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].lat, -12.5);
        assert!(!cells[0].is_northern());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_cells("broken.json", b"{\"type\": \"Nope\"}").unwrap_err();
        assert!(matches!(err, Error::Decode { ref resource, .. } if resource == "broken.json"));
    }
}
