use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use onair_common::error::Error;
use onair_common::models::{EpisodeSource, GroupMediaEntry, MediaGroup};
use onair_common::traits::repository_traits::{
    CurrentAssignmentRepository, MediaRepository, SceneRepository,
};

use crate::config::ShowConfig;
use crate::eventbus::{UiEvent, UiEventBus};
use crate::platforms::obs::ObsControl;

/// Group most recently loaded into a playlist input, per episode and input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VlcAssignment {
    pub group_id: i64,
    pub group_name: String,
    pub item_count: usize,
    pub assigned_at: DateTime<Utc>,
}

/// What `load_current_media_for_scene` put on air.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedMedia {
    pub media_id: i64,
    pub title: String,
    pub file_path: Option<String>,
    pub group: String,
    /// False when nothing was sent to the control server.
    pub loaded: bool,
}

pub struct MediaAssignmentService {
    obs: Arc<dyn ObsControl>,
    media: Arc<dyn MediaRepository>,
    scenes: Arc<dyn SceneRepository>,
    media_in_group: Arc<dyn CurrentAssignmentRepository>,
    bus: UiEventBus,
    config: Arc<ShowConfig>,
    vlc_assignments: DashMap<(i64, String), VlcAssignment>,
}

impl MediaAssignmentService {
    pub fn new(
        obs: Arc<dyn ObsControl>,
        media: Arc<dyn MediaRepository>,
        scenes: Arc<dyn SceneRepository>,
        media_in_group: Arc<dyn CurrentAssignmentRepository>,
        bus: UiEventBus,
        config: Arc<ShowConfig>,
    ) -> Self {
        Self {
            obs,
            media,
            scenes,
            media_in_group,
            bus,
            config,
            vlc_assignments: DashMap::new(),
        }
    }

    /// Plays one media item on `source_name` and records it for the episode.
    pub async fn assign_media_to_source(
        &self,
        episode_id: i64,
        source_name: &str,
        media_id: i64,
    ) -> Result<EpisodeSource, Error> {
        let media = self
            .media
            .get_media(media_id)
            .await?
            .filter(|m| m.episode_id == episode_id)
            .ok_or_else(|| {
                Error::NotFound(format!("media {} in episode {}", media_id, episode_id))
            })?;

        let file_path = media
            .file_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Validation(format!("media {} has no file", media_id)))?;

        if self.obs.is_connected() {
            let full_path = self.config.media_path(file_path);
            self.obs.set_local_file(source_name, &full_path).await?;
            debug!("Loaded {} into {}", full_path, source_name);
        } else {
            warn!("OBS not connected; storing {} -> media {} only", source_name, media_id);
        }

        let row = self
            .media
            .set_episode_source_media(episode_id, source_name, media_id, "manual")
            .await?;
        self.vlc_assignments
            .remove(&(episode_id, source_name.to_string()));

        self.bus
            .publish(UiEvent::SourceMediaAssigned {
                episode_id,
                source_name: source_name.to_string(),
                media_id,
                title: media.title,
            })
            .await;
        Ok(row)
    }

    /// Loads a whole group as a playlist on `source_name`.
    pub async fn assign_group_to_source(
        &self,
        episode_id: i64,
        source_name: &str,
        group_id: i64,
    ) -> Result<EpisodeSource, Error> {
        let group = self.episode_group(episode_id, group_id).await?;
        let entries = self.media.list_group_media(group_id).await?;
        let playlist = self.playlist(&entries);
        if playlist.is_empty() {
            return Err(Error::Validation(format!(
                "group {} has no playable media",
                group.name
            )));
        }
        let item_count = playlist.len();

        if self.obs.is_connected() {
            self.obs.set_playlist(source_name, playlist).await?;
        } else {
            warn!("OBS not connected; storing {} -> group {} only", source_name, group.name);
        }

        let row = self
            .media
            .set_episode_source_group(episode_id, source_name, group_id, "manual")
            .await?;

        self.vlc_assignments.insert(
            (episode_id, source_name.to_string()),
            VlcAssignment {
                group_id,
                group_name: group.name.clone(),
                item_count,
                assigned_at: Utc::now(),
            },
        );
        info!(
            "Episode {}: {} plays group {} ({} items)",
            episode_id, source_name, group.name, item_count
        );

        self.bus
            .publish(UiEvent::SourceGroupAssigned {
                episode_id,
                source_name: source_name.to_string(),
                group_id,
                group_name: group.name,
                item_count,
            })
            .await;
        Ok(row)
    }

    /// Playlist inputs of `episode_id` that were loaded from a group.
    pub fn get_vlc_assignments(&self, episode_id: i64) -> HashMap<String, VlcAssignment> {
        self.vlc_assignments
            .iter()
            .filter(|entry| entry.key().0 == episode_id)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect()
    }

    /// Puts the current media of a channel scene on that scene's input.
    ///
    /// The group named after the scene is consulted; without a current item
    /// for the scene its first item is used.
    pub async fn load_current_media_for_scene(&self, scene_name: &str) -> Result<LoadedMedia, Error> {
        if !self.config.is_tracked_scene(scene_name) {
            return Err(Error::Validation(format!(
                "{} is not a media channel scene",
                scene_name
            )));
        }

        let episode = self
            .media
            .get_current_episode()
            .await?
            .ok_or_else(|| Error::NotFound("no current episode".to_string()))?;
        let scene = self
            .scenes
            .get_scene_by_name(scene_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("scene {}", scene_name)))?;
        let group = self
            .media
            .get_group_by_name(episode.id, scene_name)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("group {} in episode {}", scene_name, episode.id))
            })?;

        let entries = self.media.list_group_media(group.id).await?;
        let entry = match self.media_in_group.get_current(group.id, scene.id).await {
            Ok(current) => entries.iter().find(|e| e.media_id == current.target_id),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        }
        .or_else(|| entries.first())
        .ok_or_else(|| Error::NotFound(format!("group {} is empty", group.name)))?;

        let mut loaded = false;
        match (
            entry.file_path.as_deref().filter(|p| !p.is_empty()),
            self.config.input_for_scene(scene_name),
        ) {
            (Some(path), Some(input)) if self.obs.is_connected() => {
                self.obs
                    .set_playlist(input, vec![self.config.media_path(path)])
                    .await?;
                loaded = true;
                info!("{}: loaded {} on {}", scene_name, entry.title, input);
            }
            (None, _) => warn!("Media {} has no file; nothing to load", entry.media_id),
            (_, None) => warn!("No playlist input configured for {}", scene_name),
            _ => warn!("OBS not connected; {} not loaded", entry.title),
        }

        Ok(LoadedMedia {
            media_id: entry.media_id,
            title: entry.title.clone(),
            file_path: entry.file_path.clone(),
            group: group.name,
            loaded,
        })
    }

    async fn episode_group(&self, episode_id: i64, group_id: i64) -> Result<MediaGroup, Error> {
        self.media
            .get_group(group_id)
            .await?
            .filter(|g| g.episode_id == episode_id)
            .ok_or_else(|| Error::NotFound(format!("group {} in episode {}", group_id, episode_id)))
    }

    fn playlist(&self, entries: &[GroupMediaEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(|e| e.file_path.as_deref().filter(|p| !p.is_empty()))
            .map(|p| self.config.media_path(p))
            .collect()
    }
}
