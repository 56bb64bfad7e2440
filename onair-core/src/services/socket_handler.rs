use std::collections::HashSet;
use std::sync::Arc;

use onair_common::error::Error;
use onair_common::models::Source;
use onair_common::traits::repository_traits::SceneRepository;
use onair_obs::ItemPosition;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ShowConfig;
use crate::eventbus::{UiEvent, UiEventBus};
use crate::platforms::obs::ObsControl;
use crate::services::media_assignment_service::MediaAssignmentService;
use crate::services::volume_monitor::VolumeMonitor;

/// Reply to one UI command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SocketResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToggleSource {
    scene_name: String,
    source_name: String,
    visible: bool,
}

#[derive(Debug, Deserialize)]
struct SetSourceIndex {
    scene_name: String,
    source_name: String,
    #[serde(default)]
    to_top: bool,
}

#[derive(Debug, Deserialize)]
struct SceneOnly {
    scene_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputVolumeArgs {
    input_name: String,
    input_volume_db: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputOnly {
    input_name: String,
}

#[derive(Debug, Deserialize)]
struct AssignMedia {
    episode_id: i64,
    source_name: String,
    media_id: i64,
}

#[derive(Debug, Deserialize)]
struct AssignGroup {
    episode_id: i64,
    source_name: String,
    group_id: i64,
}

#[derive(Debug, Deserialize)]
struct EpisodeOnly {
    episode_id: i64,
}

/// Commands sent by UI clients over the socket.
pub struct SocketHandler {
    obs: Arc<dyn ObsControl>,
    scenes: Arc<dyn SceneRepository>,
    volume: VolumeMonitor,
    bus: UiEventBus,
    config: Arc<ShowConfig>,
    media: Option<Arc<MediaAssignmentService>>,
}

fn parse<T: DeserializeOwned>(data: Value) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|e| Error::Validation(format!("invalid payload: {}", e)))
}

impl SocketHandler {
    pub fn new(
        obs: Arc<dyn ObsControl>,
        scenes: Arc<dyn SceneRepository>,
        volume: VolumeMonitor,
        bus: UiEventBus,
        config: Arc<ShowConfig>,
    ) -> Self {
        Self {
            obs,
            scenes,
            volume,
            bus,
            config,
            media: None,
        }
    }

    /// Enables the media assignment commands.
    pub fn with_media_assignments(mut self, media: Arc<MediaAssignmentService>) -> Self {
        self.media = Some(media);
        self
    }

    fn media(&self) -> Result<&MediaAssignmentService, Error> {
        self.media
            .as_deref()
            .ok_or_else(|| Error::Validation("media assignments are not enabled".to_string()))
    }

    /// Routes one command by name. Failures become `{success: false, error}`.
    pub async fn dispatch(&self, event: &str, data: Value) -> SocketResponse {
        let result = match event {
            "get_sources" => self.get_sources(data).await,
            "toggle_source" => self.toggle_source(data).await,
            "send_to_overlay" => self.send_to_overlay(data).await,
            "set_source_index" => self.set_source_index(data).await,
            "set_current_scene" => self.set_current_scene(data).await,
            "save_source_order" => self.save_source_order(data).await,
            "sync_source_order" => self.sync_source_order(data).await,
            "mute_all_microphones" => self.mute_all_microphones().await,
            "restore_microphones" => self.restore_microphones().await,
            "set_input_volume" => self.set_input_volume(data).await,
            "get_input_volume" => self.get_input_volume(data).await,
            "assign_media_to_source" => self.assign_media_to_source(data).await,
            "assign_group_to_source" => self.assign_group_to_source(data).await,
            "load_current_media" => self.load_current_media(data).await,
            "get_vlc_assignments" => self.get_vlc_assignments(data),
            other => Err(Error::Validation(format!("unknown event {}", other))),
        };
        match result {
            Ok(data) => SocketResponse::ok(data),
            Err(e) => {
                warn!("Socket command {} failed: {}", event, e);
                SocketResponse::error(e.to_string())
            }
        }
    }

    /// Pulls the scene's items from the control server and stores sources it
    /// has not seen yet. Existing rows are left untouched.
    pub async fn get_sources(&self, data: Value) -> Result<Value, Error> {
        let scene_name = match data {
            Value::String(name) => name,
            other => parse::<SceneOnly>(other)?.scene_name,
        };

        let items = self.obs.get_scene_item_list(&scene_name).await?;
        let scene = self.scenes.ensure_scene(&scene_name).await?;
        let known: HashSet<String> = self
            .scenes
            .list_sources(scene.id)
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();

        let mut has_changes = false;
        for item in &items {
            if !item.is_controllable() {
                debug!("Skipping {} ({:?})", item.source_name, item.source_type);
                continue;
            }
            if known.contains(&item.source_name) {
                continue;
            }
            let source_type = item
                .source_type
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or(Source::UNKNOWN_TYPE);
            self.scenes
                .create_source(scene.id, &item.source_name, source_type, item.scene_item_index)
                .await?;
            has_changes = true;
        }

        Ok(json!({ "sources": items, "has_changes": has_changes }))
    }

    pub async fn toggle_source(&self, data: Value) -> Result<Value, Error> {
        let req: ToggleSource = parse(data)?;
        self.obs
            .set_source_visibility(&req.scene_name, &req.source_name, req.visible)
            .await?;

        // Only microphones remember the operator's choice.
        if req.scene_name == self.config.microphone_scene {
            if let Some(scene) = self.scenes.get_scene_by_name(&req.scene_name).await? {
                if let Some(source) = self.scenes.get_source(scene.id, &req.source_name).await? {
                    self.scenes.set_source_visibility(source.id, req.visible).await?;
                }
            }
        }

        self.bus
            .publish(UiEvent::SourceChanged {
                scene_name: req.scene_name.clone(),
                source_name: req.source_name.clone(),
                visible: req.visible,
            })
            .await;

        Ok(json!({
            "scene_name": req.scene_name,
            "source_name": req.source_name,
            "visible": req.visible,
        }))
    }

    pub async fn send_to_overlay(&self, data: Value) -> Result<Value, Error> {
        if !data.is_object() {
            return Err(Error::Validation("overlay message must be an object".to_string()));
        }
        self.bus.publish(UiEvent::OverlayMessage(data.clone())).await;
        Ok(data)
    }

    /// Moves a source to the top or bottom. Not persisted.
    pub async fn set_source_index(&self, data: Value) -> Result<Value, Error> {
        let req: SetSourceIndex = parse(data)?;
        let position = if req.to_top {
            ItemPosition::Top
        } else {
            ItemPosition::Bottom
        };
        self.obs
            .set_scene_item_index(&req.scene_name, &req.source_name, position)
            .await?;
        debug!("Moved {} / {} to {:?}", req.scene_name, req.source_name, position);

        Ok(json!({
            "scene_name": req.scene_name,
            "source_name": req.source_name,
            "to_top": req.to_top,
        }))
    }

    pub async fn set_current_scene(&self, data: Value) -> Result<Value, Error> {
        let req: SceneOnly = parse(data)?;
        self.obs.set_current_program_scene(&req.scene_name).await?;
        Ok(json!({ "scene_name": req.scene_name }))
    }

    /// Copies the control server's current order into the store.
    pub async fn save_source_order(&self, data: Value) -> Result<Value, Error> {
        let req: SceneOnly = parse(data)?;
        let items = self.obs.get_scene_item_list(&req.scene_name).await?;
        let scene = self
            .scenes
            .get_scene_by_name(&req.scene_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("scene {} is not stored", req.scene_name)))?;

        for item in &items {
            if self
                .scenes
                .set_source_order(scene.id, &item.source_name, item.scene_item_index)
                .await?
            {
                debug!("Stored order {} for {}", item.scene_item_index, item.source_name);
            }
        }

        Ok(json!({ "scene_name": req.scene_name, "updated": items.len() }))
    }

    /// Pushes the stored order to the control server. A scene with no stored
    /// sources is seeded from the control server instead.
    pub async fn sync_source_order(&self, data: Value) -> Result<Value, Error> {
        let req: SceneOnly = parse(data)?;
        let scene = self
            .scenes
            .get_scene_by_name(&req.scene_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("scene {} is not stored", req.scene_name)))?;

        let mut sources = self.scenes.list_sources(scene.id).await?;
        if sources.is_empty() {
            info!("No stored sources for {}, reading them from OBS", req.scene_name);
            let items = self.obs.get_scene_item_list(&req.scene_name).await?;
            for item in &items {
                let source_type = item.source_type.as_deref().unwrap_or(Source::UNKNOWN_TYPE);
                self.scenes
                    .create_source(scene.id, &item.source_name, source_type, item.scene_item_index)
                    .await?;
            }
            return Ok(json!({ "scene_name": req.scene_name, "action": "saved_from_obs" }));
        }

        // Highest index first so lower ones do not shift what is already placed.
        sources.sort_by(|a, b| b.source_order.cmp(&a.source_order));
        for source in &sources {
            if let Err(e) = self
                .obs
                .set_scene_item_index(
                    &req.scene_name,
                    &source.name,
                    ItemPosition::Index(source.source_order),
                )
                .await
            {
                warn!("Could not reorder {} in {}: {}", source.name, req.scene_name, e);
            }
        }

        Ok(json!({
            "scene_name": req.scene_name,
            "action": "synced_to_obs",
            "count": sources.len(),
        }))
    }

    /// Hides every microphone without touching the stored visibility.
    pub async fn mute_all_microphones(&self) -> Result<Value, Error> {
        let sources = self.microphones().await?;
        let muted = self.show_microphones(&sources, false).await;
        info!("Muted {} microphone(s)", muted);
        Ok(json!({ "muted": muted }))
    }

    /// Re-shows the microphones whose stored visibility is on.
    pub async fn restore_microphones(&self) -> Result<Value, Error> {
        let sources: Vec<Source> = self
            .microphones()
            .await?
            .into_iter()
            .filter(|s| s.is_visible)
            .collect();
        let restored = self.show_microphones(&sources, true).await;
        info!("Restored {} microphone(s)", restored);
        Ok(json!({ "restored": restored }))
    }

    async fn microphones(&self) -> Result<Vec<Source>, Error> {
        let scene_name = &self.config.microphone_scene;
        let scene = self
            .scenes
            .get_scene_by_name(scene_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("scene {} is not stored", scene_name)))?;
        self.scenes.list_sources(scene.id).await
    }

    async fn show_microphones(&self, sources: &[Source], visible: bool) -> usize {
        let scene_name = &self.config.microphone_scene;
        let mut changed = 0;
        for source in sources {
            match self
                .obs
                .set_source_visibility(scene_name, &source.name, visible)
                .await
            {
                Ok(()) => {
                    changed += 1;
                    self.bus
                        .publish(UiEvent::SourceChanged {
                            scene_name: scene_name.clone(),
                            source_name: source.name.clone(),
                            visible,
                        })
                        .await;
                }
                Err(e) => warn!("Could not set {} visible={}: {}", source.name, visible, e),
            }
        }
        changed
    }

    /// Sets a volume, registering the expected echo first so the resulting
    /// event is not reported back as an external change.
    pub async fn set_input_volume(&self, data: Value) -> Result<Value, Error> {
        let req: InputVolumeArgs = parse(data)?;
        self.volume
            .register_our_change(&req.input_name, req.input_volume_db);
        self.obs
            .set_input_volume(&req.input_name, req.input_volume_db)
            .await?;
        info!("Volume set: {} = {:.2} dB", req.input_name, req.input_volume_db);

        Ok(json!({
            "source_name": req.input_name,
            "volume_db": req.input_volume_db,
        }))
    }

    /// Last known level, asking the control server only on a cache miss.
    pub async fn get_input_volume(&self, data: Value) -> Result<Value, Error> {
        let req: InputOnly = parse(data)?;
        if let Some(volume_db) = self.volume.get_cached(&req.input_name) {
            return Ok(json!({
                "source_name": req.input_name,
                "volume_db": volume_db,
                "cached": true,
            }));
        }

        let volume = self.obs.get_input_volume(&req.input_name).await?;
        self.volume.update_cache(&req.input_name, volume.db);
        Ok(json!({
            "source_name": req.input_name,
            "volume_db": volume.db,
            "cached": false,
        }))
    }

    async fn assign_media_to_source(&self, data: Value) -> Result<Value, Error> {
        let req: AssignMedia = parse(data)?;
        let row = self
            .media()?
            .assign_media_to_source(req.episode_id, &req.source_name, req.media_id)
            .await?;
        Ok(serde_json::to_value(row)?)
    }

    async fn assign_group_to_source(&self, data: Value) -> Result<Value, Error> {
        let req: AssignGroup = parse(data)?;
        let row = self
            .media()?
            .assign_group_to_source(req.episode_id, &req.source_name, req.group_id)
            .await?;
        Ok(serde_json::to_value(row)?)
    }

    async fn load_current_media(&self, data: Value) -> Result<Value, Error> {
        let req: SceneOnly = parse(data)?;
        let loaded = self
            .media()?
            .load_current_media_for_scene(&req.scene_name)
            .await?;
        Ok(serde_json::to_value(loaded)?)
    }

    fn get_vlc_assignments(&self, data: Value) -> Result<Value, Error> {
        let req: EpisodeOnly = parse(data)?;
        Ok(serde_json::to_value(self.media()?.get_vlc_assignments(req.episode_id))?)
    }
}
