use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored `current_in_scene` value meaning "active in every tracked scene".
pub const ALL_SCENES: i64 = 0;

/// Where a current target is active. A missing marker (`None` in storage)
/// means the target is not current anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneMarker {
    AllScenes,
    Scene(i64),
}

impl SceneMarker {
    pub fn from_scene_id(scene_id: i64) -> Self {
        if scene_id == ALL_SCENES {
            SceneMarker::AllScenes
        } else {
            SceneMarker::Scene(scene_id)
        }
    }

    /// The value written to the `current_in_scene` column.
    pub fn scene_id(self) -> i64 {
        match self {
            SceneMarker::AllScenes => ALL_SCENES,
            SceneMarker::Scene(id) => id,
        }
    }

    /// Whether a target carrying this marker is active in `scene_id`.
    /// Asking about `ALL_SCENES` only matches the all-scenes marker.
    pub fn covers(self, scene_id: i64) -> bool {
        match self {
            SceneMarker::AllScenes => true,
            SceneMarker::Scene(id) => scene_id != ALL_SCENES && id == scene_id,
        }
    }
}

/// The two levels the current-assignment rules apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentScope {
    /// Scope is a media group, targets are the media it contains.
    MediaInGroup,
    /// Scope is an episode, targets are its media groups.
    GroupInEpisode,
}

impl AssignmentScope {
    pub fn table(self) -> &'static str {
        match self {
            AssignmentScope::MediaInGroup => "episode_media_groups",
            AssignmentScope::GroupInEpisode => "media_groups",
        }
    }

    pub fn scope_column(self) -> &'static str {
        match self {
            AssignmentScope::MediaInGroup => "media_group_id",
            AssignmentScope::GroupInEpisode => "episode_id",
        }
    }

    pub fn target_column(self) -> &'static str {
        match self {
            AssignmentScope::MediaInGroup => "episode_media_id",
            AssignmentScope::GroupInEpisode => "id",
        }
    }

    pub fn scope_label(self) -> &'static str {
        match self {
            AssignmentScope::MediaInGroup => "group",
            AssignmentScope::GroupInEpisode => "episode",
        }
    }

    pub fn target_label(self) -> &'static str {
        match self {
            AssignmentScope::MediaInGroup => "media",
            AssignmentScope::GroupInEpisode => "group",
        }
    }
}

/// One candidate row of a scope as seen by the assignment engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CurrentAssignment {
    pub row_id: i64,
    pub scope_id: i64,
    pub target_id: i64,
    pub current_in_scene: Option<i64>,
}

impl CurrentAssignment {
    pub fn marker(&self) -> Option<SceneMarker> {
        self.current_in_scene.map(SceneMarker::from_scene_id)
    }

    pub fn is_current_in(&self, scene_id: i64) -> bool {
        self.marker().is_some_and(|m| m.covers(scene_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_the_all_scenes_sentinel() {
        assert_eq!(SceneMarker::from_scene_id(0), SceneMarker::AllScenes);
        assert_eq!(SceneMarker::from_scene_id(5), SceneMarker::Scene(5));
        assert_eq!(SceneMarker::AllScenes.scene_id(), 0);
        assert_eq!(SceneMarker::Scene(9).scene_id(), 9);
    }

    #[test]
    fn all_scenes_covers_every_scene() {
        assert!(SceneMarker::AllScenes.covers(5));
        assert!(SceneMarker::AllScenes.covers(ALL_SCENES));
        assert!(SceneMarker::Scene(5).covers(5));
        assert!(!SceneMarker::Scene(5).covers(9));
        assert!(!SceneMarker::Scene(5).covers(ALL_SCENES));
    }

    #[test]
    fn inactive_row_is_current_nowhere() {
        let row = CurrentAssignment {
            row_id: 1,
            scope_id: 1,
            target_id: 3,
            current_in_scene: None,
        };
        assert!(!row.is_current_in(5));
        assert!(!row.is_current_in(ALL_SCENES));
    }
}
