//! Timeout, failover and reconnect supervision of one camera's playback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::session::PlaybackSession;
use crate::backend::{BackendFactory, VideoSurface};
use crate::config::PlaybackConfig;
use crate::source::{CandidateList, StreamDescriptor};

/// Shown when automatic failover ran out of candidates.
pub const MSG_ALL_SOURCES_FAILED: &str = "All video sources failed";
/// Shown when a camera resolved to no playable source.
pub const MSG_NO_SOURCES: &str = "No video sources available";
/// Shown when a stream reached its maximum duration.
pub const MSG_STREAM_EXPIRED: &str = "Stream expired";

const MINUTE_SECONDS: u32 = 60;
const HOUR_SECONDS: u32 = 60 * MINUTE_SECONDS;
const DAY_SECONDS: u32 = 24 * HOUR_SECONDS;

/// Playback phase of a camera selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// No camera selected, or stopped deliberately
    Idle,
    /// Waiting for the first frames from the current candidate
    Scanning,
    /// Frames are arriving
    Viewing,
    /// Gave up; needs an operator action
    Failed,
    /// Retrying the same candidate after frames stopped
    Reconnecting,
    /// Stream ran for its maximum allowed duration
    Expired,
}

impl Phase {
    /// Phases in which the liveness tick is evaluated.
    pub fn is_supervised(self) -> bool {
        matches!(
            self,
            Phase::Scanning | Phase::Viewing | Phase::Reconnecting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Scanning => "scanning",
            Phase::Viewing => "viewing",
            Phase::Failed => "failed",
            Phase::Reconnecting => "reconnecting",
            Phase::Expired => "expired",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Point-in-time view of a controller for display layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub camera: Option<String>,
    pub phase: Phase,
    /// When the current phase was entered
    pub phase_since: Option<DateTime<Utc>>,
    pub index: usize,
    pub candidate_count: usize,
    pub source_label: Option<String>,
    pub status_text: String,
    pub error_text: Option<String>,
    pub streaming: bool,
    pub paused: bool,
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        Self {
            camera: None,
            phase: Phase::Idle,
            phase_since: None,
            index: 0,
            candidate_count: 0,
            source_label: None,
            status_text: String::new(),
            error_text: None,
            streaming: false,
            paused: false,
        }
    }
}

/// Source and latched error of a session stopped by a terminal phase.
#[derive(Debug, Clone)]
struct FinalOutcome {
    label: String,
    error: Option<String>,
}

/// State machine deciding when to hold, advance, reconnect or give up.
///
/// Driven by [`tick`](Self::tick) once per tick interval and by the manual
/// operations. Not internally synchronized; the playback actor serializes
/// every call.
pub struct FailoverController {
    session: PlaybackSession,
    config: PlaybackConfig,
    camera: Option<String>,
    candidates: CandidateList,
    index: usize,
    phase: Phase,
    phase_since: Option<DateTime<Utc>>,
    timeout_counter: u32,
    duration_seconds: u32,
    paused: bool,
    message: Option<String>,
    paused_error: Option<String>,
    outcome: Option<FinalOutcome>,
}

impl FailoverController {
    pub fn new(factory: Arc<dyn BackendFactory>, config: PlaybackConfig) -> Self {
        Self {
            session: PlaybackSession::new(factory),
            config,
            camera: None,
            candidates: CandidateList::new(),
            index: 0,
            phase: Phase::Idle,
            phase_since: None,
            timeout_counter: 0,
            duration_seconds: 0,
            paused: false,
            message: None,
            paused_error: None,
            outcome: None,
        }
    }

    /// Replaces the selection with a new camera and its candidates.
    ///
    /// Starts scanning from the first candidate when autostart is enabled.
    pub async fn select_camera(
        &mut self,
        camera: impl Into<String>,
        candidates: CandidateList,
        config: PlaybackConfig,
    ) {
        self.session.stop().await;
        self.camera = Some(camera.into());
        self.candidates = candidates;
        self.config = config;
        self.index = 0;
        self.set_phase(Phase::Idle);
        self.timeout_counter = 0;
        self.duration_seconds = 0;
        self.outcome = None;
        self.clear_pause();

        tracing::info!(
            "Selected camera {} with {} candidate source(s)",
            self.camera.as_deref().unwrap_or_default(),
            self.candidates.len()
        );

        if self.config.autostart {
            self.enter_scanning().await;
        }
    }

    /// Evaluates one liveness tick.
    pub async fn tick(&mut self) {
        if self.paused || !self.phase.is_supervised() {
            return;
        }
        self.duration_seconds = self.duration_seconds.saturating_add(1);

        if self.session.poll_frames() > 0 {
            self.timeout_counter = 0;
            if self.phase != Phase::Viewing {
                self.set_phase(Phase::Viewing);
            }
        } else {
            self.timeout_counter = self.timeout_counter.saturating_add(1);
        }

        match self.phase {
            Phase::Scanning if self.timeout_counter >= self.config.connect_fail_seconds => {
                if !self.config.failover_enabled {
                    self.enter_failed(None).await;
                } else if self.index + 1 < self.candidates.len() {
                    self.index += 1;
                    self.enter_scanning().await;
                } else {
                    self.enter_failed(Some(MSG_ALL_SOURCES_FAILED)).await;
                }
            }
            Phase::Viewing if self.timeout_counter >= self.config.lost_timeout_seconds => {
                if self.config.auto_reconnect {
                    self.enter_reconnecting().await;
                } else {
                    self.enter_failed(None).await;
                }
            }
            Phase::Viewing
                if self.config.max_duration_seconds != 0
                    && self.duration_seconds >= self.config.max_duration_seconds =>
            {
                self.stop_retaining_outcome().await;
                self.set_phase(Phase::Expired);
                self.message = Some(MSG_STREAM_EXPIRED.to_string());
            }
            Phase::Reconnecting
                if self.timeout_counter >= self.config.reconnect_timeout_seconds =>
            {
                if self.config.auto_reconnect {
                    self.enter_reconnecting().await;
                } else {
                    self.enter_failed(None).await;
                }
            }
            _ => {}
        }
    }

    /// Scans the next candidate, wrapping past the end.
    pub async fn select_next(&mut self) {
        self.step(1).await;
    }

    /// Scans the previous candidate, wrapping past the start.
    pub async fn select_previous(&mut self) {
        self.step(-1).await;
    }

    /// Re-scans the current candidate and resets the duration limit.
    pub async fn restart(&mut self) {
        self.duration_seconds = 0;
        self.clear_pause();
        self.enter_scanning().await;
    }

    /// Stops playback and suspends automatic decisions until resumed.
    pub async fn pause(&mut self, message: Option<String>) {
        if !self.paused {
            self.paused_error = self.session.error_message();
        }
        self.session.stop().await;
        self.paused = true;
        self.message = message.filter(|message| !message.is_empty());
        tracing::info!("Playback paused in phase {}", self.phase);
    }

    /// Continues from the phase playback was paused in.
    ///
    /// A scan that had already failed moves on to the next candidate when
    /// there is one; an interrupted viewing stream reconnects to the same
    /// source. Terminal phases only lose their pause.
    pub async fn resume(&mut self) {
        if !self.paused {
            return;
        }
        let errored = self.paused_error.is_some();
        self.clear_pause();

        match self.phase {
            Phase::Scanning => {
                if errored && self.index + 1 < self.candidates.len() {
                    self.index += 1;
                }
                self.enter_scanning().await;
            }
            Phase::Viewing | Phase::Reconnecting => self.enter_reconnecting().await,
            Phase::Idle | Phase::Failed | Phase::Expired => {}
        }
    }

    /// Stops playback and returns to idle.
    pub async fn stop(&mut self) {
        self.session.stop().await;
        self.outcome = None;
        self.clear_pause();
        self.timeout_counter = 0;
        self.set_phase(Phase::Idle);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn candidates(&self) -> &[StreamDescriptor] {
        &self.candidates
    }

    pub fn current(&self) -> Option<&StreamDescriptor> {
        self.candidates.get(self.index)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_streaming()
    }

    /// Latched error of the active source, or of the source a terminal
    /// phase stopped.
    pub fn error_text(&self) -> Option<String> {
        self.session.error_message().or_else(|| {
            self.outcome
                .as_ref()
                .and_then(|outcome| outcome.error.clone())
        })
    }

    pub fn surface(&self) -> Option<VideoSurface> {
        self.session.surface()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Seconds left before the stream expires, when a limit applies.
    pub fn remaining_seconds(&self) -> Option<u32> {
        (self.config.max_duration_seconds != 0).then(|| {
            self.config
                .max_duration_seconds
                .saturating_sub(self.duration_seconds)
        })
    }

    /// One-line status for display.
    pub fn status_text(&self) -> String {
        if self.camera.is_none() {
            return String::new();
        }
        if let Some(message) = &self.message {
            return message.clone();
        }
        let Some(descriptor) = self.session.descriptor() else {
            return match &self.outcome {
                Some(FinalOutcome {
                    label,
                    error: Some(error),
                }) => format!("{label}: {error}"),
                _ => String::new(),
            };
        };

        let label = descriptor.source_label();
        if let Some(error) = self.session.error_message() {
            return format!("{label}: {error}");
        }
        if self.phase != Phase::Viewing {
            let status = self.session.status_text();
            return if status.is_empty() {
                label.to_string()
            } else {
                format!("{label}: {status}")
            };
        }
        match self.remaining_seconds() {
            Some(seconds) => format!("{label} ({})", remaining_time_text(seconds)),
            None => label.to_string(),
        }
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            camera: self.camera.clone(),
            phase: self.phase,
            phase_since: self.phase_since,
            index: self.index,
            candidate_count: self.candidates.len(),
            source_label: self
                .session
                .descriptor()
                .map(|descriptor| descriptor.source_label().to_string())
                .or_else(|| self.outcome.as_ref().map(|outcome| outcome.label.clone())),
            status_text: self.status_text(),
            error_text: self.error_text(),
            streaming: self.is_streaming(),
            paused: self.paused,
        }
    }

    async fn step(&mut self, delta: isize) {
        let len = self.candidates.len();
        if len > 0 {
            self.index = (self.index as isize + delta).rem_euclid(len as isize) as usize;
        }
        self.clear_pause();
        self.enter_scanning().await;
    }

    async fn enter_scanning(&mut self) {
        let Some(descriptor) = self.candidates.get(self.index).cloned() else {
            self.enter_failed(Some(MSG_NO_SOURCES)).await;
            return;
        };
        self.timeout_counter = 0;
        self.message = None;
        self.outcome = None;
        self.set_phase(Phase::Scanning);
        tracing::info!(
            "Scanning candidate {}/{}: {}",
            self.index + 1,
            self.candidates.len(),
            descriptor.source_label()
        );
        self.session.start(&descriptor).await;
    }

    async fn enter_reconnecting(&mut self) {
        let Some(descriptor) = self.candidates.get(self.index).cloned() else {
            self.enter_failed(Some(MSG_NO_SOURCES)).await;
            return;
        };
        self.timeout_counter = 0;
        self.message = None;
        self.outcome = None;
        self.set_phase(Phase::Reconnecting);
        self.session.start(&descriptor).await;
    }

    async fn enter_failed(&mut self, message: Option<&str>) {
        self.stop_retaining_outcome().await;
        self.timeout_counter = 0;
        self.set_phase(Phase::Failed);
        self.message = message.map(str::to_string);
        if let Some(message) = message {
            tracing::warn!(
                "Playback failed for camera {}: {}",
                self.camera.as_deref().unwrap_or_default(),
                message
            );
        }
    }

    /// Stops the session, keeping what the operator needs to see.
    async fn stop_retaining_outcome(&mut self) {
        if let Some(descriptor) = self.session.descriptor() {
            self.outcome = Some(FinalOutcome {
                label: descriptor.source_label().to_string(),
                error: self.session.error_message(),
            });
        }
        self.session.stop().await;
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::info!("Playback phase {} -> {}", self.phase, phase);
            self.phase = phase;
            self.phase_since = Some(Utc::now());
        }
    }

    fn clear_pause(&mut self) {
        self.paused = false;
        self.message = None;
        self.paused_error = None;
    }
}

/// Human friendly countdown, e.g. `45 seconds remaining`.
pub fn remaining_time_text(seconds: u32) -> String {
    let value = seconds as f32;
    if seconds >= DAY_SECONDS {
        format!("{:.0}+ days remaining", value / DAY_SECONDS as f32)
    } else if seconds >= HOUR_SECONDS {
        format!("{:.1}+ hours remaining", value / HOUR_SECONDS as f32)
    } else if seconds >= MINUTE_SECONDS {
        format!("{:.1}+ minutes remaining", value / MINUTE_SECONDS as f32)
    } else {
        format!("{seconds} seconds remaining")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{SimulatedNetwork, SourceBehavior};

    const CAM_A: &str = "http://cam-a/video";
    const CAM_B: &str = "http://cam-b/video";
    const CAM_C: &str = "http://cam-c/video";

    fn candidates(configs: &[&str]) -> CandidateList {
        configs
            .iter()
            .enumerate()
            .map(|(i, config)| StreamDescriptor::new(format!("SRC{i}"), *config).unwrap())
            .collect()
    }

    fn config(connect_fail_seconds: u32) -> PlaybackConfig {
        PlaybackConfig {
            connect_fail_seconds,
            lost_timeout_seconds: 2,
            reconnect_timeout_seconds: 3,
            ..Default::default()
        }
    }

    fn controller(network: &SimulatedNetwork) -> FailoverController {
        FailoverController::new(Arc::new(network.factory()), PlaybackConfig::default())
    }

    async fn live_tick(network: &SimulatedNetwork, controller: &mut FailoverController) {
        network.pump();
        controller.tick().await;
    }

    #[tokio::test]
    async fn test_failover_visits_each_candidate_then_fails() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A, CAM_B, CAM_C]), config(2))
            .await;
        assert_eq!(controller.phase(), Phase::Scanning);
        assert_eq!(controller.index(), 0);

        controller.tick().await;
        assert_eq!(controller.index(), 0);
        controller.tick().await;
        assert_eq!((controller.phase(), controller.index()), (Phase::Scanning, 1));

        controller.tick().await;
        controller.tick().await;
        assert_eq!((controller.phase(), controller.index()), (Phase::Scanning, 2));

        controller.tick().await;
        controller.tick().await;
        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(controller.index(), 2);
        assert_eq!(controller.status_text(), MSG_ALL_SOURCES_FAILED);

        assert_eq!(network.starts(), vec![CAM_A, CAM_B, CAM_C]);
        assert_eq!(network.active_backends(), 0);

        // Failed is not supervised
        controller.tick().await;
        assert_eq!(network.starts().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_candidate_list_fails_without_session() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);

        controller
            .select_camera("C001", CandidateList::new(), config(2))
            .await;

        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(controller.status_text(), MSG_NO_SOURCES);
        assert!(network.starts().is_empty());
    }

    #[tokio::test]
    async fn test_single_candidate_scan_failure_does_not_retry() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A]), config(2))
            .await;
        controller.tick().await;
        controller.tick().await;

        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(network.starts(), vec![CAM_A]);
    }

    #[tokio::test]
    async fn test_failover_disabled_fails_on_first_timeout() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::FailOnStart("Connection refused".to_string()));
        let mut controller = controller(&network);
        let config = PlaybackConfig {
            failover_enabled: false,
            ..config(1)
        };

        controller
            .select_camera("C001", candidates(&[CAM_A, CAM_B]), config)
            .await;
        controller.tick().await;

        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(controller.index(), 0);
        assert_eq!(controller.status_text(), "SRC0: Connection refused");
        assert_eq!(controller.error_text().as_deref(), Some("Connection refused"));
        assert_eq!(network.active_backends(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_failover_keeps_last_error() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::FailOnStart("Connection refused".to_string()));
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A]), config(2))
            .await;
        assert_eq!(controller.status_text(), "SRC0: Connection refused");
        controller.tick().await;
        controller.tick().await;

        assert_eq!(controller.phase(), Phase::Failed);
        assert_eq!(controller.status_text(), MSG_ALL_SOURCES_FAILED);
        assert_eq!(controller.error_text().as_deref(), Some("Connection refused"));
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.source_label.as_deref(), Some("SRC0"));
        assert_eq!(snapshot.error_text.as_deref(), Some("Connection refused"));

        // A fresh attempt forgets the previous failure
        network.set_behavior(CAM_A, SourceBehavior::Live);
        controller.restart().await;
        assert_eq!(controller.error_text(), None);
        assert_eq!(controller.status_text(), "SRC0: Opening...");
    }

    #[tokio::test]
    async fn test_lost_stream_reconnects_same_descriptor() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::Live);
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A, CAM_B]), config(2))
            .await;
        live_tick(&network, &mut controller).await;
        assert_eq!(controller.phase(), Phase::Viewing);

        network.set_behavior(CAM_A, SourceBehavior::Silent);
        controller.tick().await;
        assert_eq!(controller.phase(), Phase::Viewing);
        controller.tick().await;
        assert_eq!(controller.phase(), Phase::Reconnecting);
        assert_eq!(controller.index(), 0);

        // retries indefinitely at the reconnect interval
        for _ in 0..2 {
            controller.tick().await;
            controller.tick().await;
            controller.tick().await;
            assert_eq!(controller.phase(), Phase::Reconnecting);
        }
        assert_eq!(network.starts(), vec![CAM_A, CAM_A, CAM_A, CAM_A]);

        network.set_behavior(CAM_A, SourceBehavior::Live);
        live_tick(&network, &mut controller).await;
        assert_eq!(controller.phase(), Phase::Viewing);
        assert_eq!(controller.status_text(), "SRC0");
    }

    #[tokio::test]
    async fn test_lost_stream_without_reconnect_fails() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::Live);
        let mut controller = controller(&network);
        let config = PlaybackConfig {
            auto_reconnect: false,
            ..config(2)
        };

        controller
            .select_camera("C001", candidates(&[CAM_A]), config)
            .await;
        live_tick(&network, &mut controller).await;
        network.set_behavior(CAM_A, SourceBehavior::Silent);
        controller.tick().await;
        controller.tick().await;

        assert_eq!(controller.phase(), Phase::Failed);
        assert!(!controller.session().is_active());
    }

    #[tokio::test]
    async fn test_manual_navigation_wraps() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A, CAM_B, CAM_C]), config(5))
            .await;
        controller.select_previous().await;
        assert_eq!(controller.index(), 2);
        controller.select_next().await;
        assert_eq!(controller.index(), 0);
        controller.select_next().await;
        assert_eq!(controller.index(), 1);

        assert_eq!(controller.phase(), Phase::Scanning);
        assert_eq!(network.starts(), vec![CAM_A, CAM_C, CAM_A, CAM_B]);
        assert_eq!(network.max_concurrent_backends(), 1);
    }

    #[tokio::test]
    async fn test_stop_returns_to_idle() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A]), config(2))
            .await;
        controller.stop().await;

        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(network.active_backends(), 0);
        controller.tick().await;
        assert_eq!(network.starts().len(), 1);
    }

    #[tokio::test]
    async fn test_autostart_disabled_waits_for_restart() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);
        let config = PlaybackConfig {
            autostart: false,
            ..config(2)
        };

        controller
            .select_camera("C001", candidates(&[CAM_A]), config)
            .await;
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(network.starts().is_empty());

        controller.restart().await;
        assert_eq!(controller.phase(), Phase::Scanning);
    }

    #[tokio::test]
    async fn test_max_duration_expires_stream() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::Live);
        let mut controller = controller(&network);
        let config = PlaybackConfig {
            max_duration_seconds: 3,
            ..config(2)
        };

        controller
            .select_camera("C001", candidates(&[CAM_A]), config)
            .await;
        live_tick(&network, &mut controller).await;
        assert_eq!(controller.status_text(), "SRC0 (2 seconds remaining)");
        live_tick(&network, &mut controller).await;
        live_tick(&network, &mut controller).await;

        assert_eq!(controller.phase(), Phase::Expired);
        assert_eq!(controller.status_text(), MSG_STREAM_EXPIRED);
        assert_eq!(network.active_backends(), 0);

        controller.restart().await;
        assert_eq!(controller.phase(), Phase::Scanning);
        assert_eq!(controller.remaining_seconds(), Some(3));
    }

    #[tokio::test]
    async fn test_resume_after_errored_scan_advances() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::FailOnStart("refused".to_string()));
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A, CAM_B]), config(5))
            .await;
        assert_eq!(controller.status_text(), "SRC0: refused");

        controller.pause(Some("Paused".to_string())).await;
        assert_eq!(controller.status_text(), "Paused");
        controller.tick().await;
        assert!(controller.is_paused());

        controller.resume().await;
        assert_eq!((controller.phase(), controller.index()), (Phase::Scanning, 1));
        assert_eq!(network.starts(), vec![CAM_A, CAM_B]);
    }

    #[tokio::test]
    async fn test_resume_clean_scan_retries_same_candidate() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A, CAM_B]), config(5))
            .await;
        controller.pause(None).await;
        controller.resume().await;

        assert_eq!((controller.phase(), controller.index()), (Phase::Scanning, 0));
        assert_eq!(network.starts(), vec![CAM_A, CAM_A]);
    }

    #[tokio::test]
    async fn test_resume_while_viewing_reconnects() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::Live);
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A, CAM_B]), config(5))
            .await;
        live_tick(&network, &mut controller).await;
        controller.pause(None).await;
        assert!(!controller.session().is_active());

        controller.resume().await;
        assert_eq!(controller.phase(), Phase::Reconnecting);
        assert_eq!(controller.current().map(|d| d.expanded_config()), Some(CAM_A));
    }

    #[tokio::test]
    async fn test_resume_from_failed_only_clears_pause() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);

        controller
            .select_camera("C001", candidates(&[CAM_A]), config(1))
            .await;
        controller.tick().await;
        assert_eq!(controller.phase(), Phase::Failed);

        controller.pause(None).await;
        controller.resume().await;
        assert_eq!(controller.phase(), Phase::Failed);
        assert!(!controller.is_paused());
        assert_eq!(network.starts().len(), 1);
    }

    #[tokio::test]
    async fn test_status_text_while_opening() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);
        assert_eq!(controller.status_text(), "");

        controller
            .select_camera("C001", candidates(&[CAM_A]), config(2))
            .await;

        assert_eq!(controller.status_text(), "SRC0: Opening...");
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.camera.as_deref(), Some("C001"));
        assert_eq!(snapshot.source_label.as_deref(), Some("SRC0"));
        assert_eq!(snapshot.candidate_count, 1);
        assert!(snapshot.streaming);
    }

    #[tokio::test]
    async fn test_phase_since_moves_only_on_transition() {
        let network = SimulatedNetwork::new();
        let mut controller = controller(&network);
        assert_eq!(controller.snapshot().phase_since, None);

        controller
            .select_camera("C001", candidates(&[CAM_A]), config(5))
            .await;
        let scanning_since = controller.snapshot().phase_since;
        assert!(scanning_since.is_some());

        controller.tick().await;
        assert_eq!(controller.phase(), Phase::Scanning);
        assert_eq!(controller.snapshot().phase_since, scanning_since);
    }

    #[test]
    fn test_remaining_time_text_units() {
        assert_eq!(remaining_time_text(45), "45 seconds remaining");
        assert_eq!(remaining_time_text(90), "1.5+ minutes remaining");
        assert_eq!(remaining_time_text(2 * HOUR_SECONDS), "2.0+ hours remaining");
        assert_eq!(remaining_time_text(3 * DAY_SECONDS), "3+ days remaining");
    }
}
