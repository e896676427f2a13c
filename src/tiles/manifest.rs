//! Tile manifest and the once-per-session fetches of manifest and base layer

use super::source::ClimateSource;
use crate::core::bounds::{intersects, GeoBounds};
use crate::data::cell::RawCell;
use crate::data::decode_cells_async;
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// One fine tile file and the area it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub file: String,
    pub bbox: GeoBounds,
}

impl TileDescriptor {
    pub fn new(file: impl Into<String>, bbox: GeoBounds) -> Self {
        Self {
            file: file.into(),
            bbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub tiles: Vec<TileDescriptor>,
}

impl Manifest {
    pub fn from_slice(resource: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }

    /// Tiles whose bounding box overlaps `bounds`, in manifest order
    pub fn compute_needed(&self, bounds: &GeoBounds) -> Vec<TileDescriptor> {
        self.tiles
            .iter()
            .filter(|tile| intersects(&tile.bbox, bounds))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

pub type BaseLayer = Arc<Vec<Arc<RawCell>>>;

/// State of the manifest fetch as seen without waiting
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestState {
    NotRequested,
    Pending,
    Ready(Arc<Manifest>),
    Failed(Error),
}

/// Fetches the manifest and the coarse base layer at most once each.
///
/// The first caller starts the fetch; everyone else, including callers that
/// arrive while it is in flight, awaits the same shared future. The outcome
/// is kept for the rest of the session, failures included.
pub struct ManifestLoader {
    source: Arc<dyn ClimateSource>,
    manifest_path: String,
    base_layer_path: String,
    manifest: Mutex<Option<SharedFetch<Arc<Manifest>>>>,
    base_layer: Mutex<Option<SharedFetch<BaseLayer>>>,
}

impl ManifestLoader {
    pub fn new(
        source: Arc<dyn ClimateSource>,
        manifest_path: impl Into<String>,
        base_layer_path: impl Into<String>,
    ) -> Self {
        Self {
            source,
            manifest_path: manifest_path.into(),
            base_layer_path: base_layer_path.into(),
            manifest: Mutex::new(None),
            base_layer: Mutex::new(None),
        }
    }

    pub async fn load_manifest(&self) -> Result<Arc<Manifest>> {
        let fetch = shared(&self.manifest, || {
            fetch_manifest(Arc::clone(&self.source), self.manifest_path.clone()).boxed()
        });
        fetch.await
    }

    pub async fn load_base_layer(&self) -> Result<BaseLayer> {
        let fetch = shared(&self.base_layer, || {
            fetch_base_layer(Arc::clone(&self.source), self.base_layer_path.clone()).boxed()
        });
        fetch.await
    }

    pub fn manifest_state(&self) -> ManifestState {
        let slot = self.manifest.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            None => ManifestState::NotRequested,
            Some(fetch) => match fetch.peek() {
                None => ManifestState::Pending,
                Some(Ok(manifest)) => ManifestState::Ready(Arc::clone(manifest)),
                Some(Err(e)) => ManifestState::Failed(e.clone()),
            },
        }
    }
}

async fn fetch_manifest(source: Arc<dyn ClimateSource>, path: String) -> Result<Arc<Manifest>> {
    let manifest = match source.fetch(&path).await {
        Ok(bytes) => Manifest::from_slice(&path, &bytes),
        Err(e) => Err(e),
    };
    match manifest {
        Ok(manifest) => {
            log::info!("manifest {} lists {} tiles", source.describe(&path), manifest.len());
            Ok(Arc::new(manifest))
        }
        Err(e) => {
            log::error!("manifest unavailable, fine resolution disabled: {}", e);
            Err(e)
        }
    }
}

async fn fetch_base_layer(source: Arc<dyn ClimateSource>, path: String) -> Result<BaseLayer> {
    let bytes = source.fetch(&path).await?;
    let cells = decode_cells_async(path.clone(), bytes).await?;
    log::info!("base layer {}: {} cells", source.describe(&path), cells.len());
    Ok(Arc::new(cells))
}

/// Returns the memoized fetch in `slot`, starting it with `start` if absent
fn shared<T, F>(slot: &Mutex<Option<SharedFetch<T>>>, start: F) -> SharedFetch<T>
where
    T: Clone,
    F: FnOnce() -> BoxFuture<'static, Result<T>>,
{
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref() {
        Some(fetch) => {
            log::debug!("joining memoized fetch");
            fetch.clone()
        }
        None => {
            let fetch = start().shared();
            *slot = Some(fetch.clone());
            fetch
        }
    }
}
