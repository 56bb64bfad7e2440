pub mod media_assignment_service;
pub mod socket_handler;
pub mod volume_monitor;

pub use media_assignment_service::{LoadedMedia, MediaAssignmentService, VlcAssignment};
pub use socket_handler::{SocketHandler, SocketResponse};
pub use volume_monitor::{EchoSuppressor, VolumeMonitor, VolumeOrigin};
