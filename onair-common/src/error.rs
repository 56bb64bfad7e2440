// onair-common/src/error.rs

use thiserror::Error;
use onair_obs::ObsError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("OBS error: {0}")]
    Obs(#[from] ObsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
