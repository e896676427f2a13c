//! Classified presentation sets for both resolutions, and cell selection

use super::resolution::ResolutionMode;
use crate::classify::{CategoryStats, Classification, ClassifiedCell};
use crate::core::geo::LatLng;
use std::sync::Arc;

/// Read-only view of a presentation layer handed to hosts.
///
/// Cheap to clone; the cell slice is shared with the layer until the layer
/// is next replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSnapshot {
    pub mode: ResolutionMode,
    pub cells: Arc<[ClassifiedCell]>,
    pub stats: CategoryStats,
    /// Ruleset generation the cells were classified under
    pub generation: u64,
    pub ready: bool,
    pub active: bool,
}

impl LayerSnapshot {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// The classified cells of one resolution
#[derive(Debug, Clone)]
pub struct PresentedLayer {
    mode: ResolutionMode,
    cells: Arc<[ClassifiedCell]>,
    stats: CategoryStats,
    generation: u64,
    ready: bool,
    active: bool,
}

impl PresentedLayer {
    pub fn new(mode: ResolutionMode) -> Self {
        Self {
            mode,
            cells: Arc::from(Vec::new()),
            stats: CategoryStats::default(),
            generation: 0,
            ready: false,
            active: false,
        }
    }

    /// Swaps in a fresh classification of everything in the layer
    pub fn replace(&mut self, classification: Classification, generation: u64) {
        self.cells = Arc::from(classification.cells);
        self.stats = classification.stats;
        self.generation = generation;
        self.ready = true;
    }

    /// Adds newly classified cells; the existing slice is copied, never edited
    pub fn append(&mut self, classification: Classification, generation: u64) {
        if generation != self.generation && !self.cells.is_empty() {
            log::warn!(
                "{} layer: appending generation {} cells to generation {}",
                self.mode,
                generation,
                self.generation
            );
        }
        let mut cells = Vec::with_capacity(self.cells.len() + classification.cells.len());
        cells.extend(self.cells.iter().cloned());
        cells.extend(classification.cells);

        self.cells = Arc::from(cells);
        self.stats.merge(&classification.stats);
        self.generation = generation;
        self.ready = true;
    }

    pub fn mark_ready(&mut self, generation: u64) {
        if !self.ready {
            self.generation = generation;
            self.ready = true;
        }
    }

    pub fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot {
            mode: self.mode,
            cells: Arc::clone(&self.cells),
            stats: self.stats.clone(),
            generation: self.generation,
            ready: self.ready,
            active: self.active,
        }
    }

    /// First cell containing `point`
    pub fn hit_test(&self, point: &LatLng) -> Option<(usize, &ClassifiedCell)> {
        self.cells
            .iter()
            .enumerate()
            .find(|(_, cell)| cell.raw().contains(point))
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn cells(&self) -> &Arc<[ClassifiedCell]> {
        &self.cells
    }

    pub fn stats(&self) -> &CategoryStats {
        &self.stats
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Both presentation layers; exactly one is active
#[derive(Debug, Clone)]
pub struct LayerSet {
    coarse: PresentedLayer,
    fine: PresentedLayer,
}

impl Default for LayerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerSet {
    pub fn new() -> Self {
        let mut coarse = PresentedLayer::new(ResolutionMode::Coarse);
        coarse.active = true;
        Self {
            coarse,
            fine: PresentedLayer::new(ResolutionMode::Fine),
        }
    }

    pub fn get(&self, mode: ResolutionMode) -> &PresentedLayer {
        match mode {
            ResolutionMode::Coarse => &self.coarse,
            ResolutionMode::Fine => &self.fine,
        }
    }

    pub fn get_mut(&mut self, mode: ResolutionMode) -> &mut PresentedLayer {
        match mode {
            ResolutionMode::Coarse => &mut self.coarse,
            ResolutionMode::Fine => &mut self.fine,
        }
    }

    /// Activates `mode` and deactivates the other layer
    pub fn activate(&mut self, mode: ResolutionMode) {
        self.coarse.active = mode == ResolutionMode::Coarse;
        self.fine.active = mode == ResolutionMode::Fine;
    }

    pub fn active(&self) -> &PresentedLayer {
        if self.fine.active {
            &self.fine
        } else {
            &self.coarse
        }
    }

    pub fn active_mode(&self) -> ResolutionMode {
        self.active().mode
    }
}

/// A cell picked by the user, tied to the layer snapshot it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub mode: ResolutionMode,
    pub index: usize,
    pub cell: ClassifiedCell,
    pub generation: u64,
    pub point: LatLng,
}
