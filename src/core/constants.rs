//! Engine-wide constants for the climate grid and the resolution switch.
//! Keeping them in a single place makes it easier to tweak magic numbers.

/// Months in every monthly series.
pub const MONTHS: usize = 12;

/// Zoom level at or above which the fine tiles are shown.
pub const FINE_ZOOM_THRESHOLD: f64 = 6.0;

/// Default number of tile fetches in flight per viewport batch.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

/// Default relative locations of the pre-baked data.
pub const DEFAULT_MANIFEST_PATH: &str = "tiles/manifest.json";
pub const DEFAULT_BASE_LAYER_PATH: &str = "climate.topojson";
pub const DEFAULT_TILE_DIR: &str = "tiles";

/// Month indices (0 = January) of the northern-hemisphere summer half-year.
/// South of the equator the halves swap.
pub const NORTHERN_SUMMER: [usize; 6] = [3, 4, 5, 6, 7, 8];
pub const NORTHERN_WINTER: [usize; 6] = [9, 10, 11, 0, 1, 2];

/// Property keys of the monthly series in tile payloads.
pub const TEMPERATURE_KEYS: [&str; MONTHS] = [
    "t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10", "t11", "t12",
];
pub const PRECIPITATION_KEYS: [&str; MONTHS] = [
    "p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8", "p9", "p10", "p11", "p12",
];

/// Label and fill used for cells no custom category matched.
pub const UNCLASSIFIED_NAME: &str = "Unclassified";
pub const UNCLASSIFIED_COLOR: &str = "#cccccc";
