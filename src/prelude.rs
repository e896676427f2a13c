//! Prelude module for common koppen types and traits
//!
//! Re-exports what a host usually needs with `use koppen::prelude::*;`

pub use crate::core::{
    bounds::GeoBounds,
    config::{HttpSourceConfig, SessionConfig},
    geo::LatLng,
    viewport::{ViewState, Viewport},
};

pub use crate::classify::{
    classify,
    koppen::KoppenCode,
    rules::{CategoryNode, Operator, Parameter, Rule, RuleGraph},
    thresholds::{RulesetIssue, ThresholdParam, ThresholdRuleset},
    AsRawCell, CategoryInfo, CategoryStats, Classification, ClassifiedCell, Ruleset,
};

pub use crate::data::cell::{ClimateSummary, RawCell};

pub use crate::events::{CoreEvent, EventBus};

pub use crate::layers::{LayerSnapshot, ResolutionMode, Selection};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::session::{ClimateSession, ViewportOutcome};

pub use crate::tiles::{
    ClimateSource, DirectorySource, HttpSource, LoadOutcome, LoadReport, Manifest, ManifestState,
    TileDescriptor,
};

pub use crate::Error;

pub use std::sync::Arc;
