//! Command definitions for the playback controller actor.

use tokio::sync::oneshot;

use super::ControllerError;
use super::controller::ControllerSnapshot;
use crate::backend::VideoSurface;
use crate::config::PlaybackConfig;
use crate::source::CandidateList;

pub type SnapshotResponder = oneshot::Sender<Result<ControllerSnapshot, ControllerError>>;

/// Commands processed one at a time by the controller actor.
///
/// Commands that start a backend carry the cancellation epoch observed when
/// they were sent. The actor rejects them if a stop has been requested since.
pub enum ControllerCommand {
    /// Replace the selection with a new camera.
    SelectCamera {
        camera: String,
        candidates: CandidateList,
        config: PlaybackConfig,
        epoch: u64,
        responder: SnapshotResponder,
    },
    /// Scan the next candidate (wrapping).
    SelectNext {
        epoch: u64,
        responder: SnapshotResponder,
    },
    /// Scan the previous candidate (wrapping).
    SelectPrevious {
        epoch: u64,
        responder: SnapshotResponder,
    },
    /// Re-scan the current candidate.
    Restart {
        epoch: u64,
        responder: SnapshotResponder,
    },
    /// Continue after a pause.
    Resume {
        epoch: u64,
        responder: SnapshotResponder,
    },
    /// Stop playback and suspend automatic decisions.
    Pause {
        message: Option<String>,
        responder: SnapshotResponder,
    },
    /// Stop playback and return to idle.
    Stop { responder: SnapshotResponder },
    /// Current snapshot.
    GetSnapshot { responder: SnapshotResponder },
    /// Renderable surface of the active backend.
    GetSurface {
        responder: oneshot::Sender<Option<VideoSurface>>,
    },
    /// Stop playback and end the actor.
    Shutdown { responder: oneshot::Sender<()> },
}

impl ControllerCommand {
    /// Cancellation epoch of a start-type command.
    pub fn start_epoch(&self) -> Option<u64> {
        match self {
            ControllerCommand::SelectCamera { epoch, .. }
            | ControllerCommand::SelectNext { epoch, .. }
            | ControllerCommand::SelectPrevious { epoch, .. }
            | ControllerCommand::Restart { epoch, .. }
            | ControllerCommand::Resume { epoch, .. } => Some(*epoch),
            _ => None,
        }
    }
}
