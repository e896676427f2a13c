//! Raw climate grid cells and the parameters derived from their monthly series

use crate::core::bounds::GeoBounds;
use crate::core::constants::{MONTHS, NORTHERN_SUMMER, NORTHERN_WINTER};
use crate::core::geo::LatLng;
use geo::{BoundingRect, Contains};
use geo_types::{Coord, Polygon};

/// One unclassified grid cell as delivered by a tile or the base layer.
///
/// Cells are immutable once decoded and shared as `Arc<RawCell>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    pub geometry: Polygon<f64>,
    pub lat: f64,
    pub lon: Option<f64>,
    /// Monthly mean temperature in °C, January first
    pub temperature: [f64; MONTHS],
    /// Monthly precipitation in mm, January first
    pub precipitation: [f64; MONTHS],
}

impl RawCell {
    pub fn new(
        geometry: Polygon<f64>,
        lat: f64,
        temperature: [f64; MONTHS],
        precipitation: [f64; MONTHS],
    ) -> Self {
        Self {
            geometry,
            lat,
            lon: None,
            temperature,
            precipitation,
        }
    }

    /// Square cell of `size` degrees centered on `(lat, lon)`
    pub fn square(
        lat: f64,
        lon: f64,
        size: f64,
        temperature: [f64; MONTHS],
        precipitation: [f64; MONTHS],
    ) -> Self {
        let half = size / 2.0;
        let geometry = geo::Rect::new(
            Coord {
                x: lon - half,
                y: lat - half,
            },
            Coord {
                x: lon + half,
                y: lat + half,
            },
        )
        .to_polygon();
        Self {
            geometry,
            lat,
            lon: Some(lon),
            temperature,
            precipitation,
        }
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        self.geometry
            .bounding_rect()
            .map(|rect| GeoBounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Point-in-cell test used for hit testing
    pub fn contains(&self, point: &LatLng) -> bool {
        let inside_box = self
            .bounds()
            .map(|b| b.contains(point))
            .unwrap_or(false);
        inside_box
            && self.geometry.contains(&Coord {
                x: point.lng,
                y: point.lat,
            })
    }

    pub fn is_northern(&self) -> bool {
        self.lat >= 0.0
    }

    pub fn summary(&self) -> ClimateSummary {
        ClimateSummary::from_cell(self)
    }
}

/// Climate parameters derived from one cell's monthly series.
///
/// Computed once per cell per classification; every rule and threshold is
/// evaluated against these fields, never against the raw series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSummary {
    /// Mean annual temperature (°C)
    pub mat: f64,
    /// Total annual precipitation (mm)
    pub map: f64,
    pub t_cold: f64,
    pub t_hot: f64,
    pub p_dry: f64,
    pub p_wet: f64,
    /// Driest / wettest month of the summer half-year
    pub ps_dry: f64,
    pub ps_wet: f64,
    /// Driest / wettest month of the winter half-year
    pub pw_dry: f64,
    pub pw_wet: f64,
    pub p_summer: f64,
    pub p_winter: f64,
    pub months_above_10: u8,
    /// True when the driest month lies in the summer half-year
    pub driest_in_summer: bool,
}

impl ClimateSummary {
    pub fn from_cell(cell: &RawCell) -> Self {
        let t = &cell.temperature;
        let p = &cell.precipitation;

        let (summer, winter) = if cell.is_northern() {
            (NORTHERN_SUMMER, NORTHERN_WINTER)
        } else {
            (NORTHERN_WINTER, NORTHERN_SUMMER)
        };

        let mut t_sum = 0.0;
        let mut t_cold = f64::INFINITY;
        let mut t_hot = f64::NEG_INFINITY;
        let mut p_sum = 0.0;
        let mut p_dry = f64::INFINITY;
        let mut p_wet = f64::NEG_INFINITY;
        let mut driest_month = 0;
        let mut months_above_10 = 0u8;

        for month in 0..MONTHS {
            t_sum += t[month];
            t_cold = t_cold.min(t[month]);
            t_hot = t_hot.max(t[month]);
            if t[month] >= 10.0 {
                months_above_10 += 1;
            }

            p_sum += p[month];
            p_wet = p_wet.max(p[month]);
            if p[month] < p_dry {
                p_dry = p[month];
                driest_month = month;
            }
        }

        let (ps_dry, ps_wet, p_summer) = half_year(p, &summer);
        let (pw_dry, pw_wet, p_winter) = half_year(p, &winter);

        Self {
            mat: t_sum / MONTHS as f64,
            map: p_sum,
            t_cold,
            t_hot,
            p_dry,
            p_wet,
            ps_dry,
            ps_wet,
            pw_dry,
            pw_wet,
            p_summer,
            p_winter,
            months_above_10,
            driest_in_summer: summer.contains(&driest_month),
        }
    }
}

/// (driest, wettest, total) precipitation over the given months
fn half_year(p: &[f64; MONTHS], months: &[usize; 6]) -> (f64, f64, f64) {
    let mut dry = f64::INFINITY;
    let mut wet = f64::NEG_INFINITY;
    let mut total = 0.0;
    for &month in months {
        dry = dry.min(p[month]);
        wet = wet.max(p[month]);
        total += p[month];
    }
    (dry, wet, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(lat: f64, precipitation: [f64; 12]) -> RawCell {
        RawCell::square(
            lat,
            0.0,
            1.0,
            [-5.0, -3.0, 2.0, 8.0, 14.0, 18.0, 21.0, 20.0, 15.0, 9.0, 3.0, -2.0],
            precipitation,
        )
    }

    #[test]
    fn test_summary_northern() {
        let precipitation = [40.0, 30.0, 35.0, 45.0, 60.0, 80.0, 90.0, 85.0, 70.0, 55.0, 50.0, 45.0];
        let summary = cell(45.0, precipitation).summary();

        assert!((summary.mat - 100.0 / 12.0).abs() < 1e-9);
        assert_eq!(summary.map, 685.0);
        assert_eq!(summary.t_cold, -5.0);
        assert_eq!(summary.t_hot, 21.0);
        assert_eq!(summary.p_dry, 30.0);
        assert_eq!(summary.p_wet, 90.0);
        assert_eq!(summary.ps_dry, 45.0);
        assert_eq!(summary.ps_wet, 90.0);
        assert_eq!(summary.pw_dry, 30.0);
        assert_eq!(summary.pw_wet, 55.0);
        assert_eq!(summary.p_summer, 430.0);
        assert_eq!(summary.p_winter, 255.0);
        assert_eq!(summary.months_above_10, 5);
        assert!(!summary.driest_in_summer);
    }

    #[test]
    fn test_summary_southern_swaps_seasons() {
        let precipitation = [40.0, 30.0, 35.0, 45.0, 60.0, 80.0, 90.0, 85.0, 70.0, 55.0, 50.0, 45.0];
        let summary = cell(-45.0, precipitation).summary();

        assert_eq!(summary.p_summer, 255.0);
        assert_eq!(summary.p_winter, 430.0);
        assert_eq!(summary.ps_dry, 30.0);
        assert!(summary.driest_in_summer);
    }

    #[test]
    fn test_square_cell_hit_test() {
        let cell = RawCell::square(10.0, 20.0, 0.5, [0.0; 12], [0.0; 12]);
        assert!(cell.contains(&LatLng::new(10.1, 20.1)));
        assert!(!cell.contains(&LatLng::new(10.5, 20.1)));

        let bounds = cell.bounds().unwrap();
        assert_eq!(bounds, GeoBounds::new(19.75, 9.75, 20.25, 10.25));
    }
}
