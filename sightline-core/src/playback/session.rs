//! Ownership of the single active backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{Backend, BackendFactory, Generation, VideoSurface};
use crate::source::StreamDescriptor;

/// Plays at most one stream descriptor at a time.
///
/// Every `start()` begins a new generation; backends from earlier
/// generations stop delivering frames even if their reader is still running.
pub struct PlaybackSession {
    factory: Arc<dyn BackendFactory>,
    backend: Option<Backend>,
    generation: Arc<AtomicU64>,
}

impl PlaybackSession {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            backend: None,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stops any active backend, then starts one for `descriptor`.
    pub async fn start(&mut self, descriptor: &StreamDescriptor) {
        self.stop().await;

        let id = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let generation = Generation::new(id, Arc::clone(&self.generation));
        let mut backend = self.factory.create(descriptor, generation);
        tracing::debug!(
            "Session generation {} starting {} backend for {}",
            id,
            descriptor.backend_kind(),
            descriptor.source_label()
        );
        backend.start();
        self.backend = Some(backend);
    }

    /// Stops and discards the active backend, if any.
    pub async fn stop(&mut self) {
        // Supersede first so a reader racing the teardown drops its frames
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(mut backend) = self.backend.take() {
            backend.stop().await;
            tracing::debug!(
                "Session stopped backend for {}",
                backend.descriptor().source_label()
            );
        }
    }

    /// Frames received by the active backend since the previous poll.
    pub fn poll_frames(&self) -> u32 {
        self.backend
            .as_ref()
            .map_or(0, Backend::received_frame_count_since_last_poll)
    }

    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        self.backend.as_ref().is_some_and(Backend::is_streaming)
    }

    pub fn error_message(&self) -> Option<String> {
        self.backend.as_ref().and_then(Backend::error_message)
    }

    /// Status label of the active backend, empty when idle.
    pub fn status_text(&self) -> String {
        self.backend
            .as_ref()
            .map(Backend::status_label)
            .unwrap_or_default()
    }

    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.backend.as_ref().map(Backend::descriptor)
    }

    /// Renderable surface of the active backend.
    pub fn surface(&self) -> Option<VideoSurface> {
        self.backend.as_ref().map(Backend::surface)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        // Readers still draining after the backend is gone must not deliver
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::backend::STATUS_OPENING;
    use crate::simulation::{SimulatedNetwork, SourceBehavior};

    const CAM_A: &str = "http://cam-a/video";
    const CAM_B: &str = "http://cam-b/video";

    fn descriptor(config: &str) -> StreamDescriptor {
        StreamDescriptor::new("sim", config).unwrap()
    }

    #[tokio::test]
    async fn test_second_start_stops_first_backend() {
        let network = SimulatedNetwork::new();
        let mut session = PlaybackSession::new(Arc::new(network.factory()));

        session.start(&descriptor(CAM_A)).await;
        session.start(&descriptor(CAM_B)).await;

        assert_eq!(network.starts(), vec![CAM_A, CAM_B]);
        assert_eq!(network.max_concurrent_backends(), 1);
        assert_eq!(network.active_backends(), 1);
        assert_eq!(session.descriptor().map(|d| d.expanded_config()), Some(CAM_B));
    }

    #[tokio::test]
    async fn test_poll_frames_drains_counter() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::Live);
        let mut session = PlaybackSession::new(Arc::new(network.factory()));
        assert_eq!(session.poll_frames(), 0);

        session.start(&descriptor(CAM_A)).await;
        assert_eq!(session.status_text(), STATUS_OPENING);
        network.pump();
        network.pump();

        assert_eq!(session.poll_frames(), 2);
        assert_eq!(session.poll_frames(), 0);
        assert_eq!(session.status_text(), "");
    }

    #[tokio::test]
    async fn test_stop_releases_backend() {
        let network = SimulatedNetwork::new();
        let mut session = PlaybackSession::new(Arc::new(network.factory()));

        session.start(&descriptor(CAM_A)).await;
        let surface = session.surface().unwrap();
        session.stop().await;

        assert!(!session.is_active());
        assert!(!session.is_streaming());
        assert_eq!(network.active_backends(), 0);
        assert!(surface.borrow().is_none());
        assert_eq!(session.status_text(), "");
    }

    /// Factory keeping the generation of every backend it creates.
    struct RecordingFactory {
        network: SimulatedNetwork,
        generations: Mutex<Vec<Generation>>,
    }

    impl BackendFactory for RecordingFactory {
        fn create(&self, descriptor: &StreamDescriptor, generation: Generation) -> Backend {
            self.generations.lock().push(generation.clone());
            self.network.factory().create(descriptor, generation)
        }
    }

    #[tokio::test]
    async fn test_dropped_session_supersedes_backend() {
        let factory = Arc::new(RecordingFactory {
            network: SimulatedNetwork::new(),
            generations: Mutex::new(Vec::new()),
        });
        let mut session = PlaybackSession::new(factory.clone());

        session.start(&descriptor(CAM_A)).await;
        assert!(factory.generations.lock()[0].is_current());

        drop(session);
        assert!(!factory.generations.lock()[0].is_current());
    }

    #[tokio::test]
    async fn test_restart_clears_latched_error() {
        let network = SimulatedNetwork::new();
        network.set_behavior(CAM_A, SourceBehavior::FailOnStart("refused".to_string()));
        let mut session = PlaybackSession::new(Arc::new(network.factory()));

        session.start(&descriptor(CAM_A)).await;
        assert_eq!(session.error_message().as_deref(), Some("refused"));

        network.set_behavior(CAM_A, SourceBehavior::Live);
        session.start(&descriptor(CAM_A)).await;
        assert_eq!(session.error_message(), None);
        assert!(session.is_streaming());
    }
}
