//! Viewport tile loading
//!
//! One batch at a time: a call that arrives while a batch is in flight is
//! dropped, not queued. Missing tiles are fetched concurrently and joined
//! with partial-failure tolerance. A tile is marked loaded only right before
//! its cells are merged, so a failed tile is simply retried by a later batch.

use super::manifest::{Manifest, TileDescriptor};
use super::source::ClimateSource;
use crate::core::bounds::GeoBounds;
use crate::core::config::SessionConfig;
use crate::data::cell::RawCell;
use crate::data::decode_cells_async;
use crate::runtime::BusyFlag;
use crate::Result;
use futures::stream::{self, StreamExt};
use fxhash::FxHashSet;
use instant::Instant;
use std::sync::{Arc, Mutex, PoisonError};

/// A tile that was fetched and accepted for merging
#[derive(Debug, Clone)]
pub struct FetchedTile {
    pub descriptor: TileDescriptor,
    pub cells: Vec<Arc<RawCell>>,
}

/// Counters for one fetch batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Tiles fetched in this batch (needed and not yet loaded)
    pub requested: usize,
    /// Tiles merged
    pub loaded: usize,
    pub failed: usize,
    /// Cells merged
    pub features: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Another batch was in flight
    Skipped,
    /// Every needed tile was already loaded
    UpToDate,
    Loaded(LoadReport),
}

pub struct ViewportLoader {
    loading: BusyFlag,
    loaded: Mutex<FxHashSet<String>>,
}

impl Default for ViewportLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportLoader {
    pub fn new() -> Self {
        Self {
            loading: BusyFlag::new(),
            loaded: Mutex::new(FxHashSet::default()),
        }
    }

    pub fn compute_needed(manifest: &Manifest, bounds: &GeoBounds) -> Vec<TileDescriptor> {
        manifest.compute_needed(bounds)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_busy()
    }

    pub fn is_loaded(&self, file: &str) -> bool {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(file)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Fetches the tiles of `tiles` not yet loaded and hands the successful
    /// ones to `merge` in request order.
    ///
    /// `merge` runs synchronously after the join; each tile it receives has
    /// just been added to the loaded set.
    pub async fn load<F>(
        &self,
        source: &dyn ClimateSource,
        config: &SessionConfig,
        tiles: Vec<TileDescriptor>,
        merge: F,
    ) -> LoadOutcome
    where
        F: FnOnce(Vec<FetchedTile>),
    {
        let Some(_guard) = self.loading.try_acquire() else {
            log::debug!("tile batch already in flight; dropping request for {} tiles", tiles.len());
            return LoadOutcome::Skipped;
        };

        // A file may be listed under several boxes, e.g. split at ±180°
        let missing: Vec<TileDescriptor> = {
            let loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            let mut seen = FxHashSet::default();
            tiles
                .into_iter()
                .filter(|tile| !loaded.contains(&tile.file) && seen.insert(tile.file.clone()))
                .collect()
        };
        if missing.is_empty() {
            return LoadOutcome::UpToDate;
        }

        let started = Instant::now();
        let requested = missing.len();
        log::debug!("fetching {} tiles", requested);

        let results: Vec<(TileDescriptor, Result<Vec<Arc<RawCell>>>)> = stream::iter(missing)
            .map(|tile| async move {
                let path = config.tile_path(&tile.file);
                let result = fetch_tile(source, path).await;
                (tile, result)
            })
            .buffered(config.effective_concurrency())
            .collect()
            .await;

        let mut report = LoadReport {
            requested,
            ..LoadReport::default()
        };
        let mut accepted = Vec::with_capacity(results.len());
        {
            let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            for (descriptor, result) in results {
                match result {
                    Ok(cells) => {
                        if !loaded.insert(descriptor.file.clone()) {
                            log::debug!("tile {} loaded meanwhile; skipping", descriptor.file);
                            continue;
                        }
                        report.loaded += 1;
                        report.features += cells.len();
                        accepted.push(FetchedTile { descriptor, cells });
                    }
                    Err(e) => {
                        log::warn!("tile {} failed, will retry later: {}", descriptor.file, e);
                        report.failed += 1;
                    }
                }
            }
        }

        merge(accepted);

        log::info!(
            "loaded {}/{} tiles ({} cells) in {:?}",
            report.loaded,
            report.requested,
            report.features,
            started.elapsed()
        );
        LoadOutcome::Loaded(report)
    }
}

async fn fetch_tile(source: &dyn ClimateSource, path: String) -> Result<Vec<Arc<RawCell>>> {
    let bytes = source.fetch(&path).await?;
    decode_cells_async(path, bytes).await
}
