use crate::core::geo::LatLng;
use serde::{Deserialize, Serialize};

/// Geographic bounding box in degrees, stored as `[west, south, east, north]`.
///
/// A box whose `east` is numerically smaller than its `west` wraps across the
/// antimeridian and covers `[west, 180]` plus `[-180, east]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    /// Creates bounds from the four edges in manifest order
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Creates bounds in the `{south, west, north, east}` order used by map viewports
    pub fn from_view(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(west, south, east, north)
    }

    /// Creates bounds that cover the whole globe
    pub fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// True when the box wraps across ±180° longitude
    pub fn crosses_antimeridian(&self) -> bool {
        self.east < self.west
    }

    /// Checks if the bounds contain a point, honoring antimeridian wrapping
    pub fn contains(&self, point: &LatLng) -> bool {
        if point.lat < self.south || point.lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            point.lng >= self.west || point.lng <= self.east
        } else {
            point.lng >= self.west && point.lng <= self.east
        }
    }

    /// Checks if this (tile) box overlaps `view`. See [`intersects`].
    pub fn intersects(&self, view: &GeoBounds) -> bool {
        intersects(self, view)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::world()
    }
}

impl From<[f64; 4]> for GeoBounds {
    fn from(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }
}

impl From<GeoBounds> for [f64; 4] {
    fn from(bounds: GeoBounds) -> Self {
        bounds.as_array()
    }
}

/// Inclusive overlap of two closed ranges
fn ranges_overlap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> bool {
    a_min <= b_max && a_max >= b_min
}

/// Tests whether a tile bounding box intersects the view bounds.
///
/// Edges that only touch count as intersecting. A view whose eastern bound is
/// smaller than its western bound is split into `[west, 180]` and
/// `[-180, east]`; the tile intersects if it overlaps either range in
/// longitude and the view in latitude. Any NaN edge yields `false`.
pub fn intersects(tile: &GeoBounds, view: &GeoBounds) -> bool {
    if !ranges_overlap(tile.south, tile.north, view.south, view.north) {
        return false;
    }

    if view.crosses_antimeridian() {
        ranges_overlap(tile.west, tile.east, view.west, 180.0)
            || ranges_overlap(tile.west, tile.east, -180.0, view.east)
    } else {
        ranges_overlap(tile.west, tile.east, view.west, view.east)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_overlap() {
        let view = GeoBounds::new(0.0, 0.0, 12.0, 12.0);
        assert!(intersects(&GeoBounds::new(0.0, 0.0, 10.0, 10.0), &view));
        assert!(intersects(&GeoBounds::new(5.0, 5.0, 15.0, 15.0), &view));
        assert!(!intersects(&GeoBounds::new(20.0, 20.0, 30.0, 30.0), &view));
    }

    #[test]
    fn test_touching_edges_intersect() {
        let view = GeoBounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(intersects(&GeoBounds::new(10.0, 0.0, 20.0, 10.0), &view));
        assert!(intersects(&GeoBounds::new(0.0, 10.0, 10.0, 20.0), &view));
        assert!(intersects(&GeoBounds::new(10.0, 10.0, 11.0, 11.0), &view));
        assert!(!intersects(&GeoBounds::new(10.001, 0.0, 20.0, 10.0), &view));
    }

    #[test]
    fn test_matches_rectangle_overlap_grid() {
        let view = GeoBounds::new(-20.0, -10.0, 20.0, 10.0);
        for west in (-60..=40).step_by(10) {
            for south in (-40..=30).step_by(10) {
                let tile = GeoBounds::new(west as f64, south as f64, west as f64 + 10.0, south as f64 + 10.0);
                let expected = !(tile.east < view.west
                    || tile.west > view.east
                    || tile.north < view.south
                    || tile.south > view.north);
                assert_eq!(intersects(&tile, &view), expected, "tile {:?}", tile);
            }
        }
    }

    #[test]
    fn test_antimeridian_view() {
        let view = GeoBounds::new(170.0, -10.0, -170.0, 10.0);
        assert!(view.crosses_antimeridian());
        assert!(intersects(&GeoBounds::new(175.0, -5.0, 180.0, 5.0), &view));
        assert!(intersects(&GeoBounds::new(-180.0, -5.0, -175.0, 5.0), &view));
        assert!(!intersects(&GeoBounds::new(-10.0, -5.0, 10.0, 5.0), &view));
        // Right longitude, wrong latitude
        assert!(!intersects(&GeoBounds::new(175.0, 20.0, 180.0, 30.0), &view));
    }

    #[test]
    fn test_nan_never_intersects() {
        let view = GeoBounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(!intersects(&GeoBounds::new(f64::NAN, 0.0, 5.0, 5.0), &view));
        assert!(!intersects(&GeoBounds::new(0.0, 0.0, 5.0, 5.0), &GeoBounds::new(0.0, f64::NAN, 10.0, 10.0)));
    }

    #[test]
    fn test_contains_wrapped() {
        let view = GeoBounds::new(170.0, -10.0, -170.0, 10.0);
        assert!(view.contains(&LatLng::new(0.0, 179.0)));
        assert!(view.contains(&LatLng::new(0.0, -175.0)));
        assert!(!view.contains(&LatLng::new(0.0, 0.0)));
    }

    #[test]
    fn test_bbox_round_trip_through_serde() {
        let bounds: GeoBounds = serde_json::from_str("[1.0, 2.0, 3.0, 4.0]").unwrap();
        assert_eq!(bounds, GeoBounds::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(serde_json::to_string(&bounds).unwrap(), "[1.0,2.0,3.0,4.0]");
    }
}
