//! Actor running one camera selection's failover controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};

use super::ControllerError;
use super::commands::ControllerCommand;
use super::controller::{ControllerSnapshot, FailoverController};
use super::handle::ControllerHandle;
use crate::backend::BackendFactory;
use crate::config::PlaybackConfig;

/// Spawns a controller actor and returns its handle.
///
/// The actor owns the [`FailoverController`] and processes commands and
/// liveness ticks strictly one at a time, so a tick never races an operator
/// action. Backend connects happen on the backends' own tasks and never
/// block the loop.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() {
/// use std::sync::Arc;
/// use sightline_core::backend::NativeBackendFactory;
/// use sightline_core::config::SightlineConfig;
/// use sightline_core::playback::spawn_controller;
///
/// let config = SightlineConfig::default();
/// let factory = NativeBackendFactory::new(config.http.clone(), config.pipeline.clone());
/// let handle = spawn_controller(Arc::new(factory), config.playback);
/// # }
/// ```
pub fn spawn_controller(
    factory: Arc<dyn BackendFactory>,
    config: PlaybackConfig,
) -> ControllerHandle {
    let (sender, receiver) = mpsc::channel(32);
    let (snapshot_sender, snapshot_receiver) = watch::channel(ControllerSnapshot::default());
    let epoch = Arc::new(AtomicU64::new(0));

    let mut ticker = tokio::time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let controller = FailoverController::new(factory, config);

    let actor_epoch = Arc::clone(&epoch);
    tokio::spawn(async move {
        run_actor_loop(controller, receiver, ticker, actor_epoch, snapshot_sender).await;
    });

    ControllerHandle::new(sender, epoch, snapshot_receiver)
}

async fn run_actor_loop(
    mut controller: FailoverController,
    mut receiver: mpsc::Receiver<ControllerCommand>,
    mut ticker: Interval,
    epoch: Arc<AtomicU64>,
    snapshots: watch::Sender<ControllerSnapshot>,
) {
    tracing::debug!("Playback controller actor started");

    loop {
        tokio::select! {
            command = receiver.recv() => {
                let Some(command) = command else {
                    break;
                };
                let restarts_clock = command.start_epoch().is_some();
                let keep_running =
                    handle_command(&mut controller, command, &epoch, &snapshots).await;
                if restarts_clock {
                    ticker.reset();
                }
                if !keep_running {
                    break;
                }
            }
            _ = ticker.tick() => {
                controller.tick().await;
            }
        }
        publish(&snapshots, controller.snapshot());
    }

    controller.stop().await;
    publish(&snapshots, controller.snapshot());
    tracing::debug!("Playback controller actor stopped");
}

/// Handles a single command.
/// Returns true to continue processing, false to shut down.
async fn handle_command(
    controller: &mut FailoverController,
    command: ControllerCommand,
    epoch: &AtomicU64,
    snapshots: &watch::Sender<ControllerSnapshot>,
) -> bool {
    let current_epoch = epoch.load(Ordering::Acquire);
    if let Some(command_epoch) = command.start_epoch() {
        if command_epoch < current_epoch {
            tracing::debug!("Dropping start queued before a stop");
            reject_cancelled(command);
            return true;
        }
    }

    match command {
        ControllerCommand::SelectCamera {
            camera,
            candidates,
            config,
            responder,
            ..
        } => {
            controller.select_camera(camera, candidates, config).await;
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::SelectNext { responder, .. } => {
            controller.select_next().await;
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::SelectPrevious { responder, .. } => {
            controller.select_previous().await;
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::Restart { responder, .. } => {
            controller.restart().await;
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::Resume { responder, .. } => {
            controller.resume().await;
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::Pause { message, responder } => {
            controller.pause(message).await;
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::Stop { responder } => {
            controller.stop().await;
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::GetSnapshot { responder } => {
            let _ = responder.send(Ok(controller.snapshot()));
        }

        ControllerCommand::GetSurface { responder } => {
            let _ = responder.send(controller.surface());
        }

        ControllerCommand::Shutdown { responder } => {
            tracing::debug!("Playback controller actor shutting down");
            controller.stop().await;
            publish(snapshots, controller.snapshot());
            let _ = responder.send(());
            return false;
        }
    }

    true
}

fn reject_cancelled(command: ControllerCommand) {
    let responder = match command {
        ControllerCommand::SelectCamera { responder, .. }
        | ControllerCommand::SelectNext { responder, .. }
        | ControllerCommand::SelectPrevious { responder, .. }
        | ControllerCommand::Restart { responder, .. }
        | ControllerCommand::Resume { responder, .. } => responder,
        _ => return,
    };
    let _ = responder.send(Err(ControllerError::Cancelled));
}

fn publish(snapshots: &watch::Sender<ControllerSnapshot>, snapshot: ControllerSnapshot) {
    snapshots.send_if_modified(|current| {
        if *current == snapshot {
            return false;
        }
        *current = snapshot;
        true
    });
}
