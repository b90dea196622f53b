//! Handle for communicating with the playback controller actor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot, watch};

use super::ControllerError;
use super::commands::{ControllerCommand, SnapshotResponder};
use super::controller::ControllerSnapshot;
use crate::backend::VideoSurface;
use crate::config::PlaybackConfig;
use crate::source::CandidateList;

/// Handle for communicating with the playback controller actor.
///
/// Cheap to clone; every clone talks to the same actor.
#[derive(Clone)]
pub struct ControllerHandle {
    sender: mpsc::Sender<ControllerCommand>,
    epoch: Arc<AtomicU64>,
    snapshots: watch::Receiver<ControllerSnapshot>,
}

impl ControllerHandle {
    pub fn new(
        sender: mpsc::Sender<ControllerCommand>,
        epoch: Arc<AtomicU64>,
        snapshots: watch::Receiver<ControllerSnapshot>,
    ) -> Self {
        Self {
            sender,
            epoch,
            snapshots,
        }
    }

    /// Selects a camera with its resolved candidates and playback settings.
    ///
    /// The previous candidate list is discarded. Scanning starts at the first
    /// candidate when the settings enable autostart.
    ///
    /// # Errors
    /// - `ControllerError::Cancelled` - A stop was requested before this ran
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn select_camera(
        &self,
        camera: impl Into<String>,
        candidates: CandidateList,
        config: PlaybackConfig,
    ) -> Result<ControllerSnapshot, ControllerError> {
        let camera = camera.into();
        let epoch = self.current_epoch();
        self.request(|responder| ControllerCommand::SelectCamera {
            camera,
            candidates,
            config,
            epoch,
            responder,
        })
        .await
    }

    /// Scans the next candidate, wrapping to the first after the last.
    ///
    /// # Errors
    /// - `ControllerError::Cancelled` - A stop was requested before this ran
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn select_next(&self) -> Result<ControllerSnapshot, ControllerError> {
        let epoch = self.current_epoch();
        self.request(|responder| ControllerCommand::SelectNext { epoch, responder })
            .await
    }

    /// Scans the previous candidate, wrapping to the last before the first.
    ///
    /// # Errors
    /// - `ControllerError::Cancelled` - A stop was requested before this ran
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn select_previous(&self) -> Result<ControllerSnapshot, ControllerError> {
        let epoch = self.current_epoch();
        self.request(|responder| ControllerCommand::SelectPrevious { epoch, responder })
            .await
    }

    /// Re-scans the current candidate.
    ///
    /// # Errors
    /// - `ControllerError::Cancelled` - A stop was requested before this ran
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn restart(&self) -> Result<ControllerSnapshot, ControllerError> {
        let epoch = self.current_epoch();
        self.request(|responder| ControllerCommand::Restart { epoch, responder })
            .await
    }

    /// Stops playback and suspends automatic decisions.
    ///
    /// `message` replaces the status text until playback resumes.
    ///
    /// # Errors
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn pause(
        &self,
        message: Option<String>,
    ) -> Result<ControllerSnapshot, ControllerError> {
        self.request(|responder| ControllerCommand::Pause { message, responder })
            .await
    }

    /// Continues after a pause.
    ///
    /// # Errors
    /// - `ControllerError::Cancelled` - A stop was requested before this ran
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn resume(&self) -> Result<ControllerSnapshot, ControllerError> {
        let epoch = self.current_epoch();
        self.request(|responder| ControllerCommand::Resume { epoch, responder })
            .await
    }

    /// Stops playback and returns to idle.
    ///
    /// Any start already queued but not yet executed is cancelled.
    ///
    /// # Errors
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn stop(&self) -> Result<ControllerSnapshot, ControllerError> {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.request(|responder| ControllerCommand::Stop { responder })
            .await
    }

    /// Gets the current controller snapshot.
    ///
    /// # Errors
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn snapshot(&self) -> Result<ControllerSnapshot, ControllerError> {
        self.request(|responder| ControllerCommand::GetSnapshot { responder })
            .await
    }

    /// Gets the renderable surface of the active backend.
    ///
    /// Returns `None` while no backend is active; display layers should show
    /// a placeholder and ask again after the next snapshot change.
    ///
    /// # Errors
    /// - `ControllerError::ControllerShutdown` - Actor is no longer running
    pub async fn surface(&self) -> Result<Option<VideoSurface>, ControllerError> {
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(ControllerCommand::GetSurface { responder })
            .await
            .map_err(|_| ControllerError::ControllerShutdown)?;

        rx.await.map_err(|_| ControllerError::ControllerShutdown)
    }

    /// Receiver notified after every change of the controller snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.clone()
    }

    /// Stops playback and ends the actor.
    ///
    /// # Errors
    /// - `ControllerError::ControllerShutdown` - Actor already stopped
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(ControllerCommand::Shutdown { responder })
            .await
            .map_err(|_| ControllerError::ControllerShutdown)?;

        rx.await.map_err(|_| ControllerError::ControllerShutdown)
    }

    /// Checks if the controller actor is still running.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    async fn request<F>(&self, command: F) -> Result<ControllerSnapshot, ControllerError>
    where
        F: FnOnce(SnapshotResponder) -> ControllerCommand,
    {
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(command(responder))
            .await
            .map_err(|_| ControllerError::ControllerShutdown)?;

        rx.await.map_err(|_| ControllerError::ControllerShutdown)?
    }
}
