// File: onair-common/src/models/mod.rs
pub mod assignment;
pub mod media;
pub mod scene;
pub mod show;

pub use assignment::{AssignmentScope, CurrentAssignment, SceneMarker, ALL_SCENES};
pub use media::{EpisodeMedia, EpisodeMediaGroup, EpisodeSource, GroupMediaEntry, MediaGroup};
pub use scene::{Scene, Source};
pub use show::{Episode, Season};
