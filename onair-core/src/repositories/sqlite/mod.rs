// onair-core/src/repositories/sqlite/mod.rs

pub mod assignment;
pub mod media;
pub mod scene;

pub use assignment::SqliteCurrentAssignmentRepository;
pub use media::SqliteMediaRepository;
pub use scene::SqliteSceneRepository;
