use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use onair_obs::{InputVolumeChanged, ObsClient};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::ShowConfig;
use crate::eventbus::{UiEvent, UiEventBus};

/// Who caused an observed volume change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOrigin {
    /// Matches a change this process just made.
    Ours,
    External,
}

#[derive(Debug, Clone, Copy)]
struct EchoRecord {
    expected_db: f64,
    set_at: Instant,
}

/// Remembers volumes we set so their echo events can be recognised.
///
/// One record per input; a newer registration replaces the older one. A
/// record stops matching once `window` has passed and is then removed by
/// the timer scheduled when it was registered.
pub struct EchoSuppressor {
    records: Arc<RwLock<HashMap<String, EchoRecord>>>,
    window: Duration,
    tolerance: f64,
}

impl EchoSuppressor {
    pub fn new(window: Duration, tolerance: f64) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            window,
            tolerance,
        }
    }

    fn records_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, EchoRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, input_name: &str, expected_db: f64) {
        let set_at = Instant::now();
        self.records_mut().insert(
            input_name.to_string(),
            EchoRecord {
                expected_db,
                set_at,
            },
        );

        // Without a runtime the age check in `classify` still expires it.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let records = Arc::clone(&self.records);
        let window = self.window;
        let name = input_name.to_string();
        handle.spawn(async move {
            sleep(window).await;
            let mut records = records.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Leave a newer registration for the same input alone.
            if records.get(&name).is_some_and(|r| r.set_at == set_at) {
                records.remove(&name);
                debug!("Echo expectation for {} expired", name);
            }
        });
    }

    /// Consumes the record for `input_name` when `observed_db` matches it.
    pub fn classify(&self, input_name: &str, observed_db: f64) -> VolumeOrigin {
        let mut records = self.records_mut();
        let Some(record) = records.get(input_name).copied() else {
            return VolumeOrigin::External;
        };
        if record.set_at.elapsed() >= self.window {
            records.remove(input_name);
            return VolumeOrigin::External;
        }
        if (observed_db - record.expected_db).abs() < self.tolerance {
            records.remove(input_name);
            VolumeOrigin::Ours
        } else {
            VolumeOrigin::External
        }
    }

    pub fn pending(&self, input_name: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(input_name)
    }
}

pub type VolumeListener = Arc<dyn Fn(&str, f64) + Send + Sync>;

/// Watches `InputVolumeChanged`, keeps the last known level of every input
/// and forwards only external changes to the UI.
#[derive(Clone)]
pub struct VolumeMonitor {
    suppressor: Arc<EchoSuppressor>,
    cache: Arc<DashMap<String, f64>>,
    bus: UiEventBus,
    listeners: Arc<RwLock<Vec<VolumeListener>>>,
}

impl VolumeMonitor {
    pub fn new(bus: UiEventBus, window: Duration, tolerance: f64) -> Self {
        Self {
            suppressor: Arc::new(EchoSuppressor::new(window, tolerance)),
            cache: Arc::new(DashMap::new()),
            bus,
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn from_config(config: &ShowConfig, bus: UiEventBus) -> Self {
        Self::new(bus, config.echo_window, config.echo_tolerance)
    }

    /// Subscribes to volume events on `client`. Call once per client.
    pub fn start(&self, client: &ObsClient) {
        let monitor = self.clone();
        client.on_event(InputVolumeChanged::EVENT_TYPE, move |event| {
            let monitor = monitor.clone();
            async move {
                let body: InputVolumeChanged = event.data()?;
                monitor
                    .handle_volume_event(&body.input_name, body.input_volume_db)
                    .await;
                Ok(())
            }
        });
        info!("Volume monitor started");
    }

    /// Call right before asking the control server for a new volume.
    pub fn register_our_change(&self, input_name: &str, volume_db: f64) {
        self.suppressor.register(input_name, volume_db);
        debug!("Expecting echo {} = {:.2} dB", input_name, volume_db);
    }

    pub async fn handle_volume_event(&self, input_name: &str, volume_db: f64) -> VolumeOrigin {
        self.cache.insert(input_name.to_string(), volume_db);

        let origin = self.suppressor.classify(input_name, volume_db);
        match origin {
            VolumeOrigin::Ours => {
                debug!("Volume echo suppressed: {} = {:.2} dB", input_name, volume_db);
            }
            VolumeOrigin::External => {
                debug!("External volume change: {} = {:.2} dB", input_name, volume_db);
                let listeners = self
                    .listeners
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
                for listener in listeners {
                    listener(input_name, volume_db);
                }
                self.bus
                    .publish(UiEvent::VolumeChanged {
                        source_name: input_name.to_string(),
                        volume_db,
                    })
                    .await;
            }
        }
        origin
    }

    pub fn get_cached(&self, input_name: &str) -> Option<f64> {
        self.cache.get(input_name).map(|v| *v)
    }

    /// Records a level learned some other way, e.g. a `GetInputVolume` reply.
    pub fn update_cache(&self, input_name: &str, volume_db: f64) {
        self.cache.insert(input_name.to_string(), volume_db);
    }

    /// Adds a listener for external volume changes.
    pub fn on_volume_changed<F>(&self, listener: F)
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(listener));
    }
}
