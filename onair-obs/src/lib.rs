pub mod client;
pub mod correlator;
pub mod error;
pub mod models;
pub mod protocol;
pub mod requests;

pub use client::{EventHandler, ObsClient};
pub use error::{ObsError, Result};
pub use models::*;
pub use protocol::{InputVolumeChanged, ObsEvent};
