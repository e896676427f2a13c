use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// GeoJSON geometry types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point {
        coordinates: Vec<f64>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPoint {
        coordinates: Vec<Vec<f64>>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJsonGeometry>,
    },
}

impl GeoJsonGeometry {
    /// Exterior ring of the first polygon, as `(lon, lat)` pairs.
    ///
    /// Grid cells are simple boxes, so holes and extra parts are ignored.
    pub fn exterior_ring(&self) -> Option<Vec<(f64, f64)>> {
        match self {
            GeoJsonGeometry::Polygon { coordinates } => coordinates.first().map(|r| positions(r)),
            GeoJsonGeometry::MultiPolygon { coordinates } => coordinates
                .first()
                .and_then(|polygon| polygon.first())
                .map(|r| positions(r)),
            GeoJsonGeometry::GeometryCollection { geometries } => {
                geometries.iter().find_map(|g| g.exterior_ring())
            }
            _ => None,
        }
    }
}

fn positions(ring: &[Vec<f64>]) -> Vec<(f64, f64)> {
    ring.iter()
        .filter(|p| p.len() >= 2)
        .map(|p| (p[0], p[1]))
        .collect()
}

/// GeoJSON feature with geometry and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

/// A GeoJSON feature collection; the only top-level GeoJSON shape tiles use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<GeoJsonFeature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_exterior_ring() {
        let geometry: GeoJsonGeometry = serde_json::from_str(
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]],[[0.2,0.2],[0.3,0.2],[0.3,0.3],[0.2,0.2]]]}"#,
        )
        .unwrap();
        let ring = geometry.exterior_ring().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[1], (1.0, 0.0));
    }

    #[test]
    fn test_multipolygon_uses_first_part() {
        let geometry: GeoJsonGeometry = serde_json::from_str(
            r#"{"type":"MultiPolygon","coordinates":[[[[5,5],[6,5],[6,6],[5,5]]],[[[0,0],[1,0],[1,1],[0,0]]]]}"#,
        )
        .unwrap();
        assert_eq!(geometry.exterior_ring().unwrap()[0], (5.0, 5.0));
    }

    #[test]
    fn test_point_has_no_ring() {
        let geometry: GeoJsonGeometry =
            serde_json::from_str(r#"{"type":"Point","coordinates":[1.0,2.0]}"#).unwrap();
        assert!(geometry.exterior_ring().is_none());
    }

    #[test]
    fn test_feature_ignores_type_member() {
        let feature: GeoJsonFeature = serde_json::from_str(
            r#"{"type":"Feature","geometry":null,"properties":{"lat":1.5}}"#,
        )
        .unwrap();
        assert!(feature.geometry.is_none());
        assert_eq!(feature.properties.unwrap()["lat"], 1.5);
    }
}
