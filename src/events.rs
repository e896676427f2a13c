//! Notifications from the core to the presentation layer

use crate::classify::CategoryStats;
use crate::layers::resolution::ResolutionMode;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// The visible layer was reclassified after a ruleset change
    ClassificationUpdated { count: usize, stats: CategoryStats },
    /// A viewport fetch batch finished
    TilesLoaded {
        tiles_loaded: usize,
        total_tiles: usize,
        features: usize,
    },
    ModeChanged { mode: ResolutionMode },
    /// The coarse base layer is classified and can be shown
    LayerReady { count: usize, stats: CategoryStats },
    /// The selected cell no longer exists in any layer
    SelectionCleared,
}

/// Fan-out of [`CoreEvent`]s to any number of subscribers.
///
/// Subscribers receive every event published after they subscribed, in
/// order. Dropped receivers are pruned on the next publish.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<CoreEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, event: CoreEvent) {
        log::debug!("event {:?}", event);
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
