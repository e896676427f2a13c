use crate::core::bounds::GeoBounds;
use crate::core::geo::LatLng;
use serde::{Deserialize, Serialize};

/// What the map-rendering layer reports on every pan/zoom settle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// The visible area in geographical coordinates
    pub bounds: GeoBounds,
    /// The current zoom level
    pub zoom: f64,
}

impl ViewState {
    pub fn new(bounds: GeoBounds, zoom: f64) -> Self {
        Self { bounds, zoom }
    }
}

/// Helper for hosts that only know the map center, zoom and pixel size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    /// Width and height in pixels
    pub size: (f64, f64),
}

impl Viewport {
    pub fn new(center: LatLng, zoom: f64, size: (f64, f64)) -> Self {
        Self { center, zoom, size }
    }

    /// Geographic bounds of the viewport.
    ///
    /// Longitudes are wrapped into [-180, 180], so a viewport straddling the
    /// antimeridian yields bounds with `east < west`. A viewport wider than
    /// the world covers every longitude.
    pub fn bounds(&self) -> GeoBounds {
        let (cx, cy) = self.center.project(self.zoom);
        let half_w = self.size.0 / 2.0;
        let half_h = self.size.1 / 2.0;

        let north_west = LatLng::unproject(cx - half_w, cy - half_h, self.zoom);
        let south_east = LatLng::unproject(cx + half_w, cy + half_h, self.zoom);

        let span = south_east.lng - north_west.lng;
        let (west, east) = if span >= 360.0 {
            (-180.0, 180.0)
        } else {
            (
                LatLng::wrap_lng(north_west.lng),
                LatLng::wrap_lng(south_east.lng),
            )
        };

        GeoBounds::new(west, south_east.lat, east, north_west.lat)
    }

    pub fn view_state(&self) -> ViewState {
        ViewState::new(self.bounds(), self.zoom)
    }
}
