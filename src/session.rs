//! The climate session: owner of every cache, layer and guard.
//!
//! Hosts create one [`ClimateSession`] per map, call
//! [`initialize`](ClimateSession::initialize) once, then forward viewport
//! changes and ruleset edits. Everything the host needs to draw is read back
//! through [`LayerSnapshot`]s and [`CoreEvent`]s.

use crate::classify::{classify, CategoryStats, Ruleset};
use crate::core::bounds::GeoBounds;
use crate::core::config::SessionConfig;
use crate::core::geo::LatLng;
use crate::core::viewport::ViewState;
use crate::events::{CoreEvent, EventBus};
use crate::layers::presentation::{LayerSet, LayerSnapshot, Selection};
use crate::layers::resolution::{ResolutionController, ResolutionMode};
use crate::runtime::{self, AsyncHandle};
use crate::tiles::loader::{FetchedTile, LoadOutcome, ViewportLoader};
use crate::tiles::manifest::{Manifest, ManifestLoader, ManifestState};
use crate::tiles::source::ClimateSource;
use crate::tiles::store::FeatureStore;
use crate::{Error, Result};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a viewport change ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportOutcome {
    /// A mode transition was in progress; the request was ignored
    Dropped,
    /// Coarse view, nothing to do
    Unchanged,
    /// The session switched to `mode`; entering fine also runs a tile batch
    Entered {
        mode: ResolutionMode,
        load: Option<LoadOutcome>,
    },
    /// Fine view moved; a tile batch ran for the new bounds
    Loaded(LoadOutcome),
}

struct CoreState {
    store: FeatureStore,
    layers: LayerSet,
    ruleset: Arc<Ruleset>,
    generation: u64,
    selection: Option<Selection>,
}

impl CoreState {
    /// Rebuilds the layer for `mode` from raw cells under the current ruleset.
    /// Layers that were never populated are left alone.
    fn reclassify(&mut self, mode: ResolutionMode) -> Option<(usize, CategoryStats)> {
        if !self.layers.get(mode).is_ready() {
            return None;
        }

        let classification = match mode {
            ResolutionMode::Coarse => classify(self.store.coarse().as_slice(), &self.ruleset),
            ResolutionMode::Fine => classify(self.store.fine(), &self.ruleset),
        };
        self.drop_selection_in(mode);

        let generation = self.generation;
        let layer = self.layers.get_mut(mode);
        layer.replace(classification, generation);
        Some((layer.len(), layer.stats().clone()))
    }

    /// Brings a populated layer up to the current ruleset generation
    fn refresh(&mut self, mode: ResolutionMode) {
        let layer = self.layers.get(mode);
        if layer.is_ready() && layer.generation() != self.generation {
            log::debug!(
                "{} layer is at generation {}, reclassifying to {}",
                mode,
                layer.generation(),
                self.generation
            );
            self.reclassify(mode);
        }
    }

    fn drop_selection_in(&mut self, mode: ResolutionMode) -> bool {
        if self.selection.as_ref().map(|s| s.mode) == Some(mode) {
            self.selection = None;
            true
        } else {
            false
        }
    }
}

pub struct ClimateSession {
    config: SessionConfig,
    source: Arc<dyn ClimateSource>,
    manifests: ManifestLoader,
    loader: ViewportLoader,
    resolution: ResolutionController,
    state: Mutex<CoreState>,
    events: EventBus,
}

impl ClimateSession {
    pub fn new(source: Arc<dyn ClimateSource>, config: SessionConfig) -> Self {
        Self::with_ruleset(source, config, Ruleset::default())
    }

    pub fn with_ruleset(
        source: Arc<dyn ClimateSource>,
        config: SessionConfig,
        ruleset: Ruleset,
    ) -> Self {
        let manifests = ManifestLoader::new(
            Arc::clone(&source),
            config.manifest_path.clone(),
            config.base_layer_path.clone(),
        );
        Self {
            resolution: ResolutionController::new(config.fine_zoom_threshold),
            manifests,
            loader: ViewportLoader::new(),
            state: Mutex::new(CoreState {
                store: FeatureStore::new(),
                layers: LayerSet::new(),
                ruleset: Arc::new(ruleset),
                generation: 0,
                selection: None,
            }),
            events: EventBus::new(),
            source,
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads and classifies the coarse base layer, and starts the manifest
    /// fetch when `prefetch_manifest` is set.
    ///
    /// A manifest failure is logged and only disables fine resolution; a
    /// base-layer failure is returned.
    pub async fn initialize(&self) -> Result<()> {
        let prefetch = async {
            if self.config.prefetch_manifest {
                if let Err(e) = self.manifests.load_manifest().await {
                    log::warn!("manifest prefetch failed: {}", e);
                }
            }
        };
        let (cells, ()) = futures::join!(self.manifests.load_base_layer(), prefetch);
        let cells = cells?;

        let (count, stats, cleared) = {
            let mut state = self.state();
            state.store.set_coarse(cells);
            let cleared = state.drop_selection_in(ResolutionMode::Coarse);
            let classification = classify(state.store.coarse().as_slice(), &state.ruleset);
            let generation = state.generation;
            let layer = state.layers.get_mut(ResolutionMode::Coarse);
            layer.replace(classification, generation);
            (layer.len(), layer.stats().clone(), cleared)
        };

        if cleared {
            self.events.publish(CoreEvent::SelectionCleared);
        }
        log::info!("coarse layer ready: {} cells", count);
        self.events.publish(CoreEvent::LayerReady { count, stats });
        Ok(())
    }

    /// Reconciles resolution and tiles with a new view.
    ///
    /// Returns an error only when a transition had to be aborted; the session
    /// then stays in its previous mode.
    pub async fn viewport_changed(&self, view: ViewState) -> Result<ViewportOutcome> {
        if self.resolution.is_switching() {
            log::debug!("mode transition in progress; dropping viewport change");
            return Ok(ViewportOutcome::Dropped);
        }

        let current = self.resolution.mode();
        let target = self.resolution.target_for(view.zoom);

        match (current, target) {
            (ResolutionMode::Coarse, ResolutionMode::Coarse) => Ok(ViewportOutcome::Unchanged),
            (ResolutionMode::Fine, ResolutionMode::Fine) => {
                let load = self.load_tiles_for(&view.bounds).await?;
                Ok(ViewportOutcome::Loaded(load))
            }
            (_, target) => {
                let Some(_guard) = self.resolution.begin_transition() else {
                    return Ok(ViewportOutcome::Dropped);
                };
                match target {
                    ResolutionMode::Fine => self.enter_fine(&view.bounds).await,
                    ResolutionMode::Coarse => self.enter_coarse(),
                }
            }
        }
    }

    async fn enter_fine(&self, bounds: &GeoBounds) -> Result<ViewportOutcome> {
        let manifest = match self.manifests.load_manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("cannot enter fine mode, staying coarse: {}", e);
                return Err(e);
            }
        };

        {
            let mut state = self.state();
            state.refresh(ResolutionMode::Fine);
            let generation = state.generation;
            state.layers.get_mut(ResolutionMode::Fine).mark_ready(generation);
            state.layers.activate(ResolutionMode::Fine);
        }
        self.resolution.set_mode(ResolutionMode::Fine);

        let load = self.load_with_manifest(&manifest, bounds).await;
        self.events.publish(CoreEvent::ModeChanged {
            mode: ResolutionMode::Fine,
        });
        Ok(ViewportOutcome::Entered {
            mode: ResolutionMode::Fine,
            load: Some(load),
        })
    }

    fn enter_coarse(&self) -> Result<ViewportOutcome> {
        {
            let mut state = self.state();
            if !state.layers.get(ResolutionMode::Coarse).is_ready() {
                let err = Error::ModeTransition {
                    mode: ResolutionMode::Coarse,
                    reason: "coarse layer has not been loaded".to_string(),
                };
                log::warn!("{}; staying fine", err);
                return Err(err);
            }
            state.refresh(ResolutionMode::Coarse);
            state.layers.activate(ResolutionMode::Coarse);
        }
        self.resolution.set_mode(ResolutionMode::Coarse);

        self.events.publish(CoreEvent::ModeChanged {
            mode: ResolutionMode::Coarse,
        });
        Ok(ViewportOutcome::Entered {
            mode: ResolutionMode::Coarse,
            load: None,
        })
    }

    /// Fetches and merges the fine tiles covering `bounds`
    pub async fn load_tiles_for(&self, bounds: &GeoBounds) -> Result<LoadOutcome> {
        let manifest = self.manifests.load_manifest().await?;
        Ok(self.load_with_manifest(&manifest, bounds).await)
    }

    async fn load_with_manifest(&self, manifest: &Manifest, bounds: &GeoBounds) -> LoadOutcome {
        let tiles = ViewportLoader::compute_needed(manifest, bounds);
        let outcome = self
            .loader
            .load(self.source.as_ref(), &self.config, tiles, |batch| {
                self.merge_tiles(batch)
            })
            .await;

        if let LoadOutcome::Loaded(report) = outcome {
            self.events.publish(CoreEvent::TilesLoaded {
                tiles_loaded: report.loaded,
                total_tiles: report.requested,
                features: report.features,
            });
        }
        outcome
    }

    /// Stores new tiles and classifies them under the ruleset current now
    fn merge_tiles(&self, batch: Vec<FetchedTile>) {
        if batch.is_empty() {
            return;
        }
        let mut state = self.state();

        let mut fresh = Vec::new();
        for tile in &batch {
            debug_assert!(
                !state.store.contains_tile(&tile.descriptor.file),
                "tile {} merged twice",
                tile.descriptor.file
            );
            if state.store.insert_tile(&tile.descriptor.file, &tile.cells) {
                fresh.extend(tile.cells.iter().cloned());
            }
        }

        state.refresh(ResolutionMode::Fine);
        let classification = classify(&fresh, &state.ruleset);
        let generation = state.generation;
        state
            .layers
            .get_mut(ResolutionMode::Fine)
            .append(classification, generation);
    }

    /// Replaces the ruleset and reclassifies everything resident.
    ///
    /// Synchronous and offline: the visible layer is rebuilt first and
    /// announced with `ClassificationUpdated`, then the background layer, so
    /// a later mode switch never shows stale categories.
    pub fn set_ruleset(&self, ruleset: Ruleset) {
        let (visible, cleared) = {
            let mut state = self.state();
            state.ruleset = Arc::new(ruleset);
            state.generation += 1;
            let cleared = state.selection.take().is_some();

            let active = state.layers.active_mode();
            let visible = state.reclassify(active);
            state.reclassify(active.other());
            (visible, cleared)
        };

        if cleared {
            self.events.publish(CoreEvent::SelectionCleared);
        }
        let (count, stats) = visible.unwrap_or_default();
        self.events
            .publish(CoreEvent::ClassificationUpdated { count, stats });
    }

    pub fn ruleset(&self) -> Arc<Ruleset> {
        Arc::clone(&self.state().ruleset)
    }

    /// Number of ruleset changes applied so far
    pub fn ruleset_generation(&self) -> u64 {
        self.state().generation
    }

    pub fn mode(&self) -> ResolutionMode {
        self.resolution.mode()
    }

    pub fn is_switching(&self) -> bool {
        self.resolution.is_switching()
    }

    /// False until the manifest has loaded, and for good once it has failed
    pub fn fine_available(&self) -> bool {
        matches!(self.manifests.manifest_state(), ManifestState::Ready(_))
    }

    pub fn manifest_state(&self) -> ManifestState {
        self.manifests.manifest_state()
    }

    pub fn layer(&self, mode: ResolutionMode) -> LayerSnapshot {
        self.state().layers.get(mode).snapshot()
    }

    pub fn active_layer(&self) -> LayerSnapshot {
        self.state().layers.active().snapshot()
    }

    /// Selects the cell of the active layer under `point`
    pub fn select_at(&self, point: LatLng) -> Option<Selection> {
        let mut state = self.state();
        let active = state.layers.active();
        let selection = active.hit_test(&point).map(|(index, cell)| Selection {
            mode: active.mode(),
            index,
            cell: cell.clone(),
            generation: active.generation(),
            point,
        });
        state.selection = selection.clone();
        selection
    }

    pub fn selected(&self) -> Option<Selection> {
        self.state().selection.clone()
    }

    pub fn clear_selection(&self) {
        let cleared = self.state().selection.take().is_some();
        if cleared {
            self.events.publish(CoreEvent::SelectionCleared);
        }
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn loaded_tile_count(&self) -> usize {
        self.loader.loaded_count()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fire-and-forget [`viewport_changed`](Self::viewport_changed); errors are logged
    pub fn spawn_viewport_changed(self: &Arc<Self>, view: ViewState) -> Box<dyn AsyncHandle> {
        let session = Arc::clone(self);
        runtime::spawn(async move {
            match session.viewport_changed(view).await {
                Ok(outcome) => log::debug!("viewport handled: {:?}", outcome),
                Err(e) => log::warn!("viewport change failed: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::thresholds::ThresholdRuleset;
    use async_trait::async_trait;

    struct StaticSource;

    #[async_trait]
    impl ClimateSource for StaticSource {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
            match path {
                "base.json" => Ok(serde_json::json!({
                    "type": "FeatureCollection",
                    "features": [{
                        "type": "Feature",
                        "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]] },
                        "properties": {
                            "lat": 1.0,
                            "t1": 27, "t2": 27, "t3": 27, "t4": 27, "t5": 27, "t6": 27,
                            "t7": 27, "t8": 27, "t9": 27, "t10": 27, "t11": 27, "t12": 27,
                            "p1": 200, "p2": 200, "p3": 200, "p4": 200, "p5": 200, "p6": 200,
                            "p7": 200, "p8": 200, "p9": 200, "p10": 200, "p11": 200, "p12": 200
                        }
                    }]
                })
                .to_string()
                .into_bytes()),
                _ => Err(Error::fetch(path, "HTTP 404")),
            }
        }
    }

    fn session() -> ClimateSession {
        ClimateSession::new(Arc::new(StaticSource), SessionConfig::for_testing())
    }

    #[tokio::test]
    async fn test_initialize_classifies_coarse_layer() {
        let session = session();
        let events = session.subscribe();
        session.initialize().await.unwrap();

        let coarse = session.active_layer();
        assert_eq!(coarse.mode, ResolutionMode::Coarse);
        assert!(coarse.ready && coarse.active);
        assert_eq!(coarse.stats.get("Af"), 1);
        assert!(matches!(events.try_recv(), Ok(CoreEvent::LayerReady { count: 1, .. })));
    }

    #[tokio::test]
    async fn test_missing_manifest_keeps_coarse() {
        let session = session();
        session.initialize().await.unwrap();

        let view = ViewState::new(GeoBounds::new(0.0, 0.0, 2.0, 2.0), 8.0);
        assert!(session.viewport_changed(view).await.is_err());
        assert_eq!(session.mode(), ResolutionMode::Coarse);
        assert!(!session.is_switching());
        assert!(!session.fine_available());
        assert!(session.select_at(LatLng::new(1.0, 1.0)).is_some());
    }

    #[tokio::test]
    async fn test_ruleset_change_clears_selection() {
        let session = session();
        session.initialize().await.unwrap();
        let events = session.subscribe();

        let selection = session.select_at(LatLng::new(1.0, 1.0)).unwrap();
        assert_eq!(selection.cell.code(), Some("Af"));

        session.set_ruleset(
            ThresholdRuleset::koppen_default()
                .with("tropical", "min_temperature", 28.0)
                .into(),
        );
        assert!(session.selected().is_none());
        assert_eq!(session.ruleset_generation(), 1);
        assert_eq!(session.active_layer().generation, 1);
        assert_ne!(session.active_layer().stats.get("Af"), 1);

        let received: Vec<CoreEvent> = events.try_iter().collect();
        assert_eq!(received[0], CoreEvent::SelectionCleared);
        assert!(matches!(received[1], CoreEvent::ClassificationUpdated { count: 1, .. }));
    }

    #[test]
    fn test_entering_coarse_requires_coarse_layer() {
        let session = session();
        assert!(session.enter_coarse().is_err());
        assert_eq!(session.mode(), ResolutionMode::Coarse);
    }
}
