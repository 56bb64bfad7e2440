//! onair-core/src/eventbus/mod.rs
//!
//! In-process fan-out of UI events. Every subscriber (one per connected UI
//! client) gets its own bounded queue.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

/// Events pushed to every connected UI client. Serialized as
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum UiEvent {
    SourceChanged {
        scene_name: String,
        source_name: String,
        visible: bool,
    },
    /// A volume change made outside this process.
    VolumeChanged {
        source_name: String,
        volume_db: f64,
    },
    SourceMediaAssigned {
        episode_id: i64,
        source_name: String,
        media_id: i64,
        title: String,
    },
    SourceGroupAssigned {
        episode_id: i64,
        source_name: String,
        group_id: i64,
        group_name: String,
        item_count: usize,
    },
    OverlayMessage(Value),
}

impl UiEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            UiEvent::SourceChanged { .. } => "source_changed",
            UiEvent::VolumeChanged { .. } => "volume_changed",
            UiEvent::SourceMediaAssigned { .. } => "source_media_assigned",
            UiEvent::SourceGroupAssigned { .. } => "source_group_assigned",
            UiEvent::OverlayMessage(_) => "overlay_message",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 1024;

#[derive(Clone)]
pub struct UiEventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<UiEvent>>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl Default for UiEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UiEventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<UiEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        self.subscribers.lock().await.push(tx);
        rx
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Publish an event to all subscribers.
    ///
    /// Never waits on a subscriber: publishers include the control-server
    /// receive loop. A subscriber whose queue is full misses the event;
    /// a subscriber that went away is dropped.
    pub async fn publish(&self, event: UiEvent) {
        let mut subs = self.subscribers.lock().await;
        debug!("Publishing {} to {} UI subscriber(s)", event.event_name(), subs.len());
        subs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("UI subscriber queue full, dropping {}", event.event_name());
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}
