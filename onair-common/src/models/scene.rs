use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A scene known to the control server, mirrored by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Scene {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A controllable source inside a scene.
///
/// `is_visible` is the operator's stored choice; it is only written for the
/// microphone scene, where it drives `restore_microphones`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Source {
    pub id: i64,
    pub scene_id: i64,
    pub name: String,
    pub source_type: String,
    pub source_order: i64,
    pub is_visible: bool,
    pub icon_url: Option<String>,
    pub color: Option<String>,
}

impl Source {
    pub const UNKNOWN_TYPE: &'static str = "UNKNOWN";
}
