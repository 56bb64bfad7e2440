use async_trait::async_trait;

use crate::error::Error;
use crate::models::{
    AssignmentScope, CurrentAssignment, Episode, EpisodeMedia, EpisodeSource, GroupMediaEntry,
    MediaGroup, Scene, Source,
};

/// Scenes and their sources, looked up by the names the control server uses.
#[async_trait]
pub trait SceneRepository: Send + Sync {
    async fn get_scene_by_name(&self, name: &str) -> Result<Option<Scene>, Error>;
    /// Returns the matching scenes ordered by id. Unknown names are skipped.
    async fn get_scenes_by_names(&self, names: &[String]) -> Result<Vec<Scene>, Error>;
    /// Returns the scene, creating it first if needed.
    async fn ensure_scene(&self, name: &str) -> Result<Scene, Error>;

    async fn list_sources(&self, scene_id: i64) -> Result<Vec<Source>, Error>;
    async fn get_source(&self, scene_id: i64, name: &str) -> Result<Option<Source>, Error>;
    async fn create_source(
        &self,
        scene_id: i64,
        name: &str,
        source_type: &str,
        source_order: i64,
    ) -> Result<Source, Error>;
    async fn set_source_visibility(&self, source_id: i64, visible: bool) -> Result<(), Error>;
    /// Returns false when the scene has no source with that name.
    async fn set_source_order(&self, scene_id: i64, name: &str, order: i64) -> Result<bool, Error>;
}

/// Episode, media and group lookups plus the per-episode source assignments.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn get_current_episode(&self) -> Result<Option<Episode>, Error>;
    async fn get_media(&self, media_id: i64) -> Result<Option<EpisodeMedia>, Error>;
    async fn get_group(&self, group_id: i64) -> Result<Option<MediaGroup>, Error>;
    async fn get_group_by_name(&self, episode_id: i64, name: &str) -> Result<Option<MediaGroup>, Error>;
    /// Members of a group in playback order.
    async fn list_group_media(&self, group_id: i64) -> Result<Vec<GroupMediaEntry>, Error>;

    async fn get_episode_source(
        &self,
        episode_id: i64,
        source_name: &str,
    ) -> Result<Option<EpisodeSource>, Error>;
    /// Points the source at one media item and clears any group.
    async fn set_episode_source_media(
        &self,
        episode_id: i64,
        source_name: &str,
        media_id: i64,
        assigned_by: &str,
    ) -> Result<EpisodeSource, Error>;
    /// Points the source at a group and clears any single media item.
    async fn set_episode_source_group(
        &self,
        episode_id: i64,
        source_name: &str,
        group_id: i64,
        assigned_by: &str,
    ) -> Result<EpisodeSource, Error>;
}

/// Which target of a scope is current for a scene.
///
/// `scene_id == 0` addresses the all-scenes marker. Implementations apply the
/// same rules to every [`AssignmentScope`].
#[async_trait]
pub trait CurrentAssignmentRepository: Send + Sync {
    fn scope(&self) -> AssignmentScope;

    /// Makes `target_id` current for `scene_id`. The target must already be a
    /// member of the scope.
    async fn set_current(&self, scope_id: i64, target_id: i64, scene_id: i64) -> Result<(), Error>;

    /// Deactivates whatever is current for `scene_id`. Returns the number of
    /// rows cleared.
    async fn clear_current(&self, scope_id: i64, scene_id: i64) -> Result<u64, Error>;

    /// `Error::NotFound` when nothing is current for `scene_id`.
    async fn get_current(&self, scope_id: i64, scene_id: i64) -> Result<CurrentAssignment, Error>;

    /// Every row of the scope, for inspection.
    async fn list_assignments(&self, scope_id: i64) -> Result<Vec<CurrentAssignment>, Error>;
}
