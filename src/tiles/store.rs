//! Append-only store of raw cells, the source of truth for reclassification

use crate::data::cell::RawCell;
use fxhash::FxHashSet;
use std::sync::Arc;

/// Raw cells resident for the session.
///
/// The coarse grid is set once; fine cells are appended per tile and never
/// evicted. Cells are never edited after insertion.
#[derive(Debug, Default)]
pub struct FeatureStore {
    coarse: Arc<Vec<Arc<RawCell>>>,
    fine: Vec<Arc<RawCell>>,
    tiles: FxHashSet<String>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_coarse(&mut self, cells: Arc<Vec<Arc<RawCell>>>) {
        if !self.coarse.is_empty() {
            log::debug!("replacing {} coarse cells", self.coarse.len());
        }
        self.coarse = cells;
    }

    pub fn coarse(&self) -> &Arc<Vec<Arc<RawCell>>> {
        &self.coarse
    }

    /// Appends a tile's cells; false if the tile is already resident
    pub fn insert_tile(&mut self, file: &str, cells: &[Arc<RawCell>]) -> bool {
        if !self.tiles.insert(file.to_string()) {
            log::debug!("tile {} already resident", file);
            return false;
        }
        self.fine.extend(cells.iter().cloned());
        true
    }

    /// All fine cells in arrival order
    pub fn fine(&self) -> &[Arc<RawCell>] {
        &self.fine
    }

    pub fn contains_tile(&self, file: &str) -> bool {
        self.tiles.contains(file)
    }
}
