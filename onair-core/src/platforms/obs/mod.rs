// File: onair-core/src/platforms/obs/mod.rs

use async_trait::async_trait;
use onair_obs::{InputVolume, ItemPosition, ObsClient, ObsError, SceneItem};

/// The control-server operations the services depend on.
///
/// Implemented by [`ObsClient`]; services hold it as `Arc<dyn ObsControl>`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObsControl: Send + Sync {
    /// Racy snapshot, see [`ObsClient::is_connected`].
    fn is_connected(&self) -> bool;

    async fn set_source_visibility(
        &self,
        scene_name: &str,
        source_name: &str,
        visible: bool,
    ) -> Result<(), ObsError>;

    async fn set_scene_item_index(
        &self,
        scene_name: &str,
        source_name: &str,
        position: ItemPosition,
    ) -> Result<(), ObsError>;

    async fn set_current_program_scene(&self, scene_name: &str) -> Result<(), ObsError>;

    async fn get_scene_item_list(&self, scene_name: &str) -> Result<Vec<SceneItem>, ObsError>;

    async fn set_input_volume(&self, input_name: &str, volume_db: f64) -> Result<(), ObsError>;

    async fn get_input_volume(&self, input_name: &str) -> Result<InputVolume, ObsError>;

    async fn set_local_file(&self, input_name: &str, path: &str) -> Result<(), ObsError>;

    async fn set_playlist(&self, input_name: &str, paths: Vec<String>) -> Result<(), ObsError>;
}

#[async_trait]
impl ObsControl for ObsClient {
    fn is_connected(&self) -> bool {
        ObsClient::is_connected(self)
    }

    async fn set_source_visibility(
        &self,
        scene_name: &str,
        source_name: &str,
        visible: bool,
    ) -> Result<(), ObsError> {
        ObsClient::set_source_visibility(self, scene_name, source_name, visible).await
    }

    async fn set_scene_item_index(
        &self,
        scene_name: &str,
        source_name: &str,
        position: ItemPosition,
    ) -> Result<(), ObsError> {
        ObsClient::set_scene_item_index(self, scene_name, source_name, position).await
    }

    async fn set_current_program_scene(&self, scene_name: &str) -> Result<(), ObsError> {
        ObsClient::set_current_program_scene(self, scene_name).await
    }

    async fn get_scene_item_list(&self, scene_name: &str) -> Result<Vec<SceneItem>, ObsError> {
        ObsClient::get_scene_item_list(self, scene_name).await
    }

    async fn set_input_volume(&self, input_name: &str, volume_db: f64) -> Result<(), ObsError> {
        ObsClient::set_input_volume(self, input_name, volume_db).await
    }

    async fn get_input_volume(&self, input_name: &str) -> Result<InputVolume, ObsError> {
        ObsClient::get_input_volume(self, input_name).await
    }

    async fn set_local_file(&self, input_name: &str, path: &str) -> Result<(), ObsError> {
        ObsClient::set_local_file(self, input_name, path).await
    }

    async fn set_playlist(&self, input_name: &str, paths: Vec<String>) -> Result<(), ObsError> {
        ObsClient::set_playlist(self, input_name, paths).await
    }
}
