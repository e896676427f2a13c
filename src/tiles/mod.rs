pub mod loader;
pub mod manifest;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use loader::{LoadOutcome, LoadReport, ViewportLoader};
pub use manifest::{Manifest, ManifestLoader, ManifestState, TileDescriptor};
pub use source::{ClimateSource, DirectorySource, HttpSource};
pub use store::FeatureStore;
