//! Coarse/fine resolution state and the transition guard

use crate::runtime::{BusyFlag, BusyGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    #[default]
    Coarse,
    Fine,
}

impl ResolutionMode {
    pub fn other(self) -> Self {
        match self {
            ResolutionMode::Coarse => ResolutionMode::Fine,
            ResolutionMode::Fine => ResolutionMode::Coarse,
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMode::Coarse => f.write_str("coarse"),
            ResolutionMode::Fine => f.write_str("fine"),
        }
    }
}

/// Tracks the active mode and serializes transitions between modes.
///
/// A transition holds the switching flag across its suspension points; a
/// request that finds the flag taken is dropped and the next viewport signal
/// reconciles state.
pub struct ResolutionController {
    fine_zoom_threshold: f64,
    mode: Mutex<ResolutionMode>,
    switching: BusyFlag,
}

impl ResolutionController {
    pub fn new(fine_zoom_threshold: f64) -> Self {
        Self {
            fine_zoom_threshold,
            mode: Mutex::new(ResolutionMode::Coarse),
            switching: BusyFlag::new(),
        }
    }

    /// Fine at or above the threshold; NaN zoom stays coarse
    pub fn target_for(&self, zoom: f64) -> ResolutionMode {
        if zoom >= self.fine_zoom_threshold {
            ResolutionMode::Fine
        } else {
            ResolutionMode::Coarse
        }
    }

    pub fn mode(&self) -> ResolutionMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_mode(&self, mode: ResolutionMode) {
        let mut current = self.mode.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != mode {
            log::info!("resolution {} -> {}", *current, mode);
            *current = mode;
        }
    }

    pub fn begin_transition(&self) -> Option<BusyGuard<'_>> {
        self.switching.try_acquire()
    }

    pub fn is_switching(&self) -> bool {
        self.switching.is_busy()
    }

    pub fn fine_zoom_threshold(&self) -> f64 {
        self.fine_zoom_threshold
    }
}
