use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Show layout: which control-server scenes act as playback channels, which
/// input plays each channel's media, and where media files live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowConfig {
    /// Scenes whose media/group assignments are tracked. A stored scene id of
    /// zero means "all of these".
    pub tracked_scenes: Vec<String>,
    pub microphone_scene: String,
    /// Tracked scene name -> name of the playlist input on that scene.
    pub scene_inputs: HashMap<String, String>,
    pub media_dir: PathBuf,
    pub echo_window: Duration,
    /// Absolute dB difference under which an observed volume matches ours.
    pub echo_tolerance: f64,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            tracked_scenes: vec!["MEDIA".to_string(), "REPORTAZE".to_string()],
            microphone_scene: "MIKROFONY".to_string(),
            scene_inputs: HashMap::from([
                ("MEDIA".to_string(), "Media1".to_string()),
                ("REPORTAZE".to_string(), "Reportaze1".to_string()),
            ]),
            media_dir: PathBuf::from("./media"),
            echo_window: Duration::from_millis(500),
            echo_tolerance: 0.1,
        }
    }
}

impl ShowConfig {
    pub fn is_tracked_scene(&self, scene_name: &str) -> bool {
        self.tracked_scenes.iter().any(|s| s == scene_name)
    }

    pub fn input_for_scene(&self, scene_name: &str) -> Option<&str> {
        self.scene_inputs.get(scene_name).map(String::as_str)
    }

    /// Absolute path of a stored media path. Stored paths always use `/`.
    pub fn media_path(&self, relative: &str) -> String {
        let root = std::path::absolute(&self.media_dir).unwrap_or_else(|_| self.media_dir.clone());
        let mut full = root;
        for part in relative.split('/').filter(|p| !p.is_empty()) {
            full.push(part);
        }
        full.to_string_lossy().into_owned()
    }
}
