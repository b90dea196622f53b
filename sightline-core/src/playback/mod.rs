//! Playback supervision.
//!
//! A [`FailoverController`] decides what to play; a [`PlaybackSession`]
//! owns the single active backend. The actor in [`actor`] serializes ticks
//! and operator commands for one camera selection behind a
//! [`ControllerHandle`].

pub mod actor;
pub mod commands;
pub mod controller;
pub mod handle;
pub mod session;

pub use actor::spawn_controller;
pub use commands::ControllerCommand;
pub use controller::{ControllerSnapshot, FailoverController, Phase};
pub use handle::ControllerHandle;
pub use session::PlaybackSession;

/// Errors returned by [`ControllerHandle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("Playback controller has shut down")]
    ControllerShutdown,

    #[error("Start cancelled by a later stop")]
    Cancelled,
}
