use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsConnectionConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub use_password: bool,
    /// Re-dial after an established connection drops.
    pub reconnect: bool,
    pub reconnect_delay: Duration,
    /// `None` waits for a response forever.
    pub request_timeout: Option<Duration>,
    pub handshake_timeout: Duration,
}

impl Default for ObsConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4455,
            password: None,
            use_password: true,
            reconnect: true,
            reconnect_delay: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(10)),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl ObsConnectionConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub(crate) fn effective_password(&self) -> Option<&str> {
        match (&self.password, self.use_password) {
            (Some(password), true) => Some(password.as_str()),
            _ => None,
        }
    }
}

/// One entry of `GetSceneItemList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItem {
    pub scene_item_id: i64,
    pub scene_item_index: i64,
    pub source_name: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub input_kind: Option<String>,
    #[serde(default)]
    pub scene_item_enabled: bool,
}

impl SceneItem {
    /// Nested scenes and filters are not controllable sources.
    pub fn is_controllable(&self) -> bool {
        !matches!(
            self.source_type.as_deref(),
            Some("OBS_SOURCE_TYPE_SCENE") | Some("OBS_SOURCE_TYPE_FILTER")
        )
    }
}

/// Target draw-order slot for `set_scene_item_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPosition {
    /// Highest index, drawn above everything else.
    Top,
    /// Index 0.
    Bottom,
    Index(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub value: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub selected: bool,
}

impl PlaylistItem {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            value: path.into(),
            hidden: false,
            selected: false,
        }
    }
}

/// Settings blob for a VLC video source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlcPlaylistSettings {
    pub playlist: Vec<PlaylistItem>,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub shuffle: bool,
}

impl VlcPlaylistSettings {
    pub fn new(paths: impl IntoIterator<Item = String>) -> Self {
        Self {
            playlist: paths.into_iter().map(PlaylistItem::new).collect(),
            looping: false,
            shuffle: false,
        }
    }
}

/// Settings blob for a plain media source playing one local file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFileSettings {
    pub local_file: String,
    pub clear_on_media_end: bool,
    pub close_when_inactive: bool,
}

impl LocalFileSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            local_file: path.into(),
            clear_on_media_end: false,
            close_when_inactive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputVolume {
    pub mul: f64,
    pub db: f64,
}
