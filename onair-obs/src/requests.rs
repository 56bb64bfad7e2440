//! Typed request catalogue. Each struct serializes to the `requestData` map
//! OBS expects and names the shape of its `responseData`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::SceneItem;

pub trait ObsRequest: Serialize {
    const REQUEST_TYPE: &'static str;
    type Response: DeserializeOwned;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSceneItemId<'a> {
    pub scene_name: &'a str,
    pub source_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemIdResponse {
    pub scene_item_id: i64,
}

impl ObsRequest for GetSceneItemId<'_> {
    const REQUEST_TYPE: &'static str = "GetSceneItemId";
    type Response = SceneItemIdResponse;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSceneItemEnabled<'a> {
    pub scene_name: &'a str,
    pub scene_item_id: i64,
    pub scene_item_enabled: bool,
}

impl ObsRequest for SetSceneItemEnabled<'_> {
    const REQUEST_TYPE: &'static str = "SetSceneItemEnabled";
    type Response = Value;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSceneItemIndex<'a> {
    pub scene_name: &'a str,
    pub scene_item_id: i64,
    pub scene_item_index: i64,
}

impl ObsRequest for SetSceneItemIndex<'_> {
    const REQUEST_TYPE: &'static str = "SetSceneItemIndex";
    type Response = Value;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCurrentProgramScene<'a> {
    pub scene_name: &'a str,
}

impl ObsRequest for SetCurrentProgramScene<'_> {
    const REQUEST_TYPE: &'static str = "SetCurrentProgramScene";
    type Response = Value;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSceneItemList<'a> {
    pub scene_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemListResponse {
    #[serde(default)]
    pub scene_items: Vec<SceneItem>,
}

impl ObsRequest for GetSceneItemList<'_> {
    const REQUEST_TYPE: &'static str = "GetSceneItemList";
    type Response = SceneItemListResponse;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInputVolume<'a> {
    pub input_name: &'a str,
    pub input_volume_db: f64,
}

impl ObsRequest for SetInputVolume<'_> {
    const REQUEST_TYPE: &'static str = "SetInputVolume";
    type Response = Value;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInputVolume<'a> {
    pub input_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputVolumeResponse {
    pub input_volume_mul: f64,
    pub input_volume_db: f64,
}

impl ObsRequest for GetInputVolume<'_> {
    const REQUEST_TYPE: &'static str = "GetInputVolume";
    type Response = InputVolumeResponse;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInputSettings<'a> {
    pub input_name: &'a str,
    pub input_settings: Value,
    /// Merge into the existing settings instead of replacing them.
    pub overlay: bool,
}

impl ObsRequest for SetInputSettings<'_> {
    const REQUEST_TYPE: &'static str = "SetInputSettings";
    type Response = Value;
}
