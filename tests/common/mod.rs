//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use koppen::{ClimateSession, ClimateSource, CoreEvent, Error, SessionConfig};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TROPICAL_T: [f64; 12] = [27.0; 12];
pub const TROPICAL_P: [f64; 12] = [200.0; 12];
pub const DESERT_T: [f64; 12] = [
    15.0, 17.0, 21.0, 26.0, 31.0, 34.0, 36.0, 35.0, 32.0, 27.0, 21.0, 16.0,
];
pub const DESERT_P: [f64; 12] = [15.0, 10.0, 20.0, 15.0, 5.0, 0.0, 0.0, 0.0, 0.0, 2.0, 8.0, 15.0];

/// In-memory source that counts fetches per path, delays every response and
/// can be told to fail chosen paths.
pub struct MemorySource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    fetches: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl MemorySource {
    pub fn new(delay: Duration) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            fetches: Mutex::new(HashMap::new()),
            delay,
        }
    }

    pub fn insert(&self, path: &str, body: Value) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), body.to_string().into_bytes());
    }

    pub fn fail(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn heal(&self, path: &str) {
        self.failing.lock().unwrap().remove(path);
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ClimateSource for MemorySource {
    async fn fetch(&self, path: &str) -> koppen::Result<Vec<u8>> {
        *self.fetches.lock().unwrap().entry(path.to_string()).or_insert(0) += 1;
        tokio::time::sleep(self.delay).await;

        if self.failing.lock().unwrap().contains(path) {
            return Err(Error::Fetch {
                resource: path.to_string(),
                message: "HTTP 503".to_string(),
            });
        }
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Fetch {
                resource: path.to_string(),
                message: "HTTP 404".to_string(),
            })
    }
}

/// A square cell feature centered on `(lat, lon)`
pub fn cell(lat: f64, lon: f64, size: f64, t: [f64; 12], p: [f64; 12]) -> Value {
    let h = size / 2.0;
    let mut properties = serde_json::Map::new();
    properties.insert("lat".into(), json!(lat));
    properties.insert("lon".into(), json!(lon));
    for month in 0..12 {
        properties.insert(format!("t{}", month + 1), json!(t[month]));
        properties.insert(format!("p{}", month + 1), json!(p[month]));
    }
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lon - h, lat - h], [lon + h, lat - h], [lon + h, lat + h], [lon - h, lat + h], [lon - h, lat - h]
            ]]
        },
        "properties": properties
    })
}

pub fn collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

/// Coarse grid: one tropical cell over [0,10]², one desert cell over [20,30]².
/// Manifest: `a.json` (4 tropical cells) and `b.json` (2 desert cells).
pub fn climate_world(delay: Duration) -> Arc<MemorySource> {
    let source = MemorySource::new(delay);
    source.insert(
        "base.json",
        collection(vec![
            cell(5.0, 5.0, 10.0, TROPICAL_T, TROPICAL_P),
            cell(25.0, 25.0, 10.0, DESERT_T, DESERT_P),
        ]),
    );
    source.insert(
        "manifest.json",
        json!({ "tiles": [
            { "file": "a.json", "bbox": [0, 0, 10, 10] },
            { "file": "b.json", "bbox": [20, 20, 30, 30] }
        ]}),
    );
    source.insert(
        "tiles/a.json",
        collection(vec![
            cell(2.5, 2.5, 5.0, TROPICAL_T, TROPICAL_P),
            cell(2.5, 7.5, 5.0, TROPICAL_T, TROPICAL_P),
            cell(7.5, 2.5, 5.0, TROPICAL_T, TROPICAL_P),
            cell(7.5, 7.5, 5.0, TROPICAL_T, TROPICAL_P),
        ]),
    );
    source.insert(
        "tiles/b.json",
        collection(vec![
            cell(25.0, 22.5, 5.0, DESERT_T, DESERT_P),
            cell(25.0, 27.5, 5.0, DESERT_T, DESERT_P),
        ]),
    );
    Arc::new(source)
}

pub fn session(source: &Arc<MemorySource>) -> ClimateSession {
    let _ = env_logger::builder().is_test(true).try_init();
    ClimateSession::new(source.clone(), SessionConfig::for_testing())
}

pub fn mode_changes(events: &[CoreEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, CoreEvent::ModeChanged { .. }))
        .count()
}
