//! # koppen
//!
//! Hybrid-resolution tile cache and Köppen climate classification core.
//!
//! A [`ClimateSession`] keeps an always-resident coarse grid, fetches fine
//! tiles for the current viewport at most once each, classifies every cell
//! with either the Köppen threshold tree or a user-authored rule graph, and
//! reclassifies everything resident whenever the ruleset changes. Rendering
//! is left to the host, which listens to [`CoreEvent`]s.

pub mod classify;
pub mod core;
pub mod data;
pub mod events;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod session;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::{intersects, GeoBounds},
    config::{HttpSourceConfig, SessionConfig},
    geo::LatLng,
    viewport::{ViewState, Viewport},
};

pub use classify::{
    classify, CategoryInfo, CategoryStats, Classification, ClassifiedCell, Ruleset,
};

pub use classify::koppen::KoppenCode;
pub use classify::rules::{CategoryNode, Operator, Parameter, Rule, RuleGraph};
pub use classify::thresholds::{RulesetIssue, ThresholdParam, ThresholdRuleset};

pub use data::cell::{ClimateSummary, RawCell};

pub use events::{CoreEvent, EventBus};

pub use runtime::AsyncHandle;

pub use layers::{
    presentation::{LayerSnapshot, Selection},
    resolution::ResolutionMode,
};

pub use session::{ClimateSession, ViewportOutcome};

pub use tiles::{
    loader::{LoadOutcome, LoadReport},
    manifest::{Manifest, ManifestState, TileDescriptor},
    source::{ClimateSource, DirectorySource, HttpSource},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core.
///
/// `Clone` so a single in-flight fetch can hand its outcome to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("failed to fetch {resource}: {message}")]
    Fetch { resource: String, message: String },

    #[error("failed to decode {resource}: {message}")]
    Decode { resource: String, message: String },

    #[error("invalid ruleset: {0}")]
    Ruleset(String),

    #[error("cannot enter {mode} mode: {reason}")]
    ModeTransition {
        mode: ResolutionMode,
        reason: String,
    },
}

impl Error {
    pub(crate) fn fetch(resource: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Fetch {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// True for errors raised while retrieving or decoding data
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Decode { .. })
    }
}

/// Installs `env_logger` honoring `RUST_LOG`; safe to call more than once
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
