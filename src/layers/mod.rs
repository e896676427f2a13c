pub mod presentation;
pub mod resolution;

pub use presentation::{LayerSet, LayerSnapshot, PresentedLayer, Selection};
pub use resolution::{ResolutionController, ResolutionMode};
