use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EpisodeMedia {
    pub id: i64,
    pub episode_id: i64,
    pub title: String,
    pub description: String,
    /// Path relative to the media root. `None` for external media.
    pub file_path: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MediaGroup {
    pub id: i64,
    pub episode_id: i64,
    pub name: String,
    pub description: String,
    pub order: i64,
    /// System groups are named after the tracked scenes.
    pub is_system: bool,
    pub current_in_scene: Option<i64>,
}

/// Membership of a media item in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EpisodeMediaGroup {
    pub id: i64,
    pub episode_media_id: i64,
    pub media_group_id: i64,
    pub order: i64,
    pub current_in_scene: Option<i64>,
}

/// A group member joined with the media it points at, in group order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GroupMediaEntry {
    pub membership_id: i64,
    pub media_id: i64,
    pub order: i64,
    pub current_in_scene: Option<i64>,
    pub title: String,
    pub file_path: Option<String>,
}

/// What a named control-server input plays in an episode: a single media
/// item or a whole group, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EpisodeSource {
    pub id: i64,
    pub episode_id: i64,
    pub source_name: String,
    pub media_id: Option<i64>,
    pub group_id: Option<i64>,
    pub assigned_by: String,
    pub updated_at: DateTime<Utc>,
}
