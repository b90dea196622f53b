//! Stream backends.
//!
//! A backend wraps exactly one [`StreamDescriptor`] and reads it on its own
//! tokio task. Everything the controller observes (frame arrivals, the first
//! error, the streaming flag, the status label) lives in [`BackendShared`] and
//! is safe to poll from the controller task while the reader runs.

pub mod http;
pub mod multipart;
pub mod pipeline;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;

pub use http::MultipartHttpBackend;
pub use multipart::MultipartDecoder;
pub use pipeline::PipelineBackend;

use crate::config::{HttpConfig, PipelineConfig};
#[cfg(any(test, feature = "simulation"))]
use crate::simulation::ScriptedBackend;
use crate::source::{BackendKind, StreamDescriptor};

/// Status shown while a backend waits for its first frame.
pub const STATUS_OPENING: &str = "Opening...";

/// Errors raised by backend readers. They never cross the engine boundary;
/// their text is latched as the backend's error message.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Malformed URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("{reason}")]
    Connect { reason: String },

    #[error("HTTP {status}")]
    HttpStatus { status: String },

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Missing content-length")]
    MissingContentLength,

    #[error("Invalid content-length: {value}")]
    InvalidContentLength { value: String },

    #[error("Frame too large: {size} bytes")]
    FrameTooLarge { size: usize },

    #[error("Header line too long")]
    HeaderTooLong,

    #[error("End of stream")]
    EndOfStream,

    #[error("Failed to launch pipeline: {reason}")]
    PipelineLaunch { reason: String },

    #[error("{message}")]
    Pipeline { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frames received since the last poll.
#[derive(Debug, Default)]
pub struct FrameCounter(AtomicU32);

impl FrameCounter {
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the count and resets it to zero.
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::AcqRel)
    }
}

/// Holds the first error reported since it was last cleared.
#[derive(Debug, Default)]
pub struct ErrorLatch(Mutex<Option<String>>);

impl ErrorLatch {
    /// Stores `message` unless an error is already latched.
    ///
    /// Returns true if the message was stored. Empty messages are ignored.
    pub fn latch(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        if message.is_empty() {
            return false;
        }
        let mut slot = self.0.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(message);
        true
    }

    pub fn clear(&self) {
        *self.0.lock() = None;
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().clone()
    }
}

/// Identifies one `start()` of a playback session.
///
/// A backend whose generation is no longer the session's current one has
/// been superseded and must stop itself.
#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    current: Arc<AtomicU64>,
}

impl Generation {
    pub fn new(id: u64, current: Arc<AtomicU64>) -> Self {
        Self { id, current }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.id
    }
}

/// How a reader task finished without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source closed the stream between frames
    Finished,
    /// A newer start of the session took over
    Superseded,
}

/// One complete image delivered by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub sequence: u64,
    pub data: Bytes,
}

/// Renderable surface of a backend: the latest complete frame.
pub type VideoSurface = watch::Receiver<Option<VideoFrame>>;

/// State shared between a backend's reader task and its pollers.
#[derive(Debug)]
pub struct BackendShared {
    frames: FrameCounter,
    error: ErrorLatch,
    streaming: AtomicBool,
    status: Mutex<String>,
    sequence: AtomicU64,
    surface: watch::Sender<Option<VideoFrame>>,
    generation: Generation,
}

impl BackendShared {
    pub fn new(generation: Generation) -> Arc<Self> {
        let (surface, _) = watch::channel(None);
        Arc::new(Self {
            frames: FrameCounter::default(),
            error: ErrorLatch::default(),
            streaming: AtomicBool::new(false),
            status: Mutex::new(String::new()),
            sequence: AtomicU64::new(0),
            surface,
            generation,
        })
    }

    /// Resets per-start state: clears the error latch and shows "opening".
    pub fn begin(&self) {
        self.error.clear();
        self.frames.take();
        self.set_status(STATUS_OPENING);
        self.streaming.store(true, Ordering::Release);
    }

    /// Publishes a complete frame.
    ///
    /// Returns false without publishing when this backend has been
    /// superseded; the caller must then stop reading.
    pub fn deliver_frame(&self, data: Bytes) -> bool {
        if !self.generation.is_current() {
            return false;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.frames.record();
        if sequence == 1 {
            self.set_status("");
        }
        self.surface.send_replace(Some(VideoFrame { sequence, data }));
        true
    }

    /// Latches an error (first one wins) and marks the stream stopped.
    pub fn fail(&self, error: &BackendError) {
        if self.error.latch(error.to_string()) {
            tracing::error!(
                "Backend generation {} failed: {}",
                self.generation.id(),
                error
            );
        }
        self.mark_stopped();
    }

    pub fn report_error(&self, message: impl Into<String>) -> bool {
        self.error.latch(message)
    }

    pub fn mark_stopped(&self) {
        self.streaming.store(false, Ordering::Release);
    }

    pub fn set_status(&self, status: &str) {
        let mut current = self.status.lock();
        if *current != status {
            *current = status.to_string();
        }
    }

    pub fn take_frame_count(&self) -> u32 {
        self.frames.take()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.get()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub fn status(&self) -> String {
        self.status.lock().clone()
    }

    pub fn surface(&self) -> VideoSurface {
        self.surface.subscribe()
    }

    /// Drops the published frame so viewers fall back to a placeholder.
    pub fn detach_surface(&self) {
        self.surface.send_replace(None);
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }
}

/// A backend of one of the supported transport kinds.
pub enum Backend {
    Pipeline(PipelineBackend),
    MultipartHttp(MultipartHttpBackend),
    #[cfg(any(test, feature = "simulation"))]
    Scripted(ScriptedBackend),
}

impl Backend {
    /// Starts reading. Never blocks on the network: connection happens on the
    /// backend's own task.
    pub fn start(&mut self) {
        match self {
            Backend::Pipeline(backend) => backend.start(),
            Backend::MultipartHttp(backend) => backend.start(),
            #[cfg(any(test, feature = "simulation"))]
            Backend::Scripted(backend) => backend.start(),
        }
    }

    /// Stops reading and waits until no more frames can be delivered.
    pub async fn stop(&mut self) {
        match self {
            Backend::Pipeline(backend) => backend.stop().await,
            Backend::MultipartHttp(backend) => backend.stop().await,
            #[cfg(any(test, feature = "simulation"))]
            Backend::Scripted(backend) => backend.stop().await,
        }
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        match self {
            Backend::Pipeline(backend) => backend.descriptor(),
            Backend::MultipartHttp(backend) => backend.descriptor(),
            #[cfg(any(test, feature = "simulation"))]
            Backend::Scripted(backend) => backend.descriptor(),
        }
    }

    fn shared(&self) -> &BackendShared {
        match self {
            Backend::Pipeline(backend) => backend.shared(),
            Backend::MultipartHttp(backend) => backend.shared(),
            #[cfg(any(test, feature = "simulation"))]
            Backend::Scripted(backend) => backend.shared(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.shared().is_streaming()
    }

    pub fn error_message(&self) -> Option<String> {
        self.shared().error_message()
    }

    /// Frames received since the previous call; resets the count.
    pub fn received_frame_count_since_last_poll(&self) -> u32 {
        self.shared().take_frame_count()
    }

    pub fn status_label(&self) -> String {
        self.shared().status()
    }

    pub fn surface(&self) -> VideoSurface {
        self.shared().surface()
    }
}

/// Creates backends for descriptors.
pub trait BackendFactory: Send + Sync + 'static {
    fn create(&self, descriptor: &StreamDescriptor, generation: Generation) -> Backend;
}

/// Factory for the real transports, chosen by the descriptor's kind.
#[derive(Debug, Clone, Default)]
pub struct NativeBackendFactory {
    pub http: HttpConfig,
    pub pipeline: PipelineConfig,
}

impl NativeBackendFactory {
    pub fn new(http: HttpConfig, pipeline: PipelineConfig) -> Self {
        Self { http, pipeline }
    }
}

impl BackendFactory for NativeBackendFactory {
    fn create(&self, descriptor: &StreamDescriptor, generation: Generation) -> Backend {
        match descriptor.backend_kind() {
            BackendKind::Pipeline => Backend::Pipeline(PipelineBackend::new(
                descriptor.clone(),
                self.pipeline.clone(),
                self.http.max_frame_bytes,
                generation,
            )),
            BackendKind::MultipartHttp => Backend::MultipartHttp(MultipartHttpBackend::new(
                descriptor.clone(),
                self.http.clone(),
                generation,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation() -> Generation {
        Generation::new(1, Arc::new(AtomicU64::new(1)))
    }

    #[test]
    fn test_frame_counter_resets_on_take() {
        let counter = FrameCounter::default();
        counter.record();
        counter.record();

        assert_eq!(counter.take(), 2);
        assert_eq!(counter.take(), 0);
    }

    #[test]
    fn test_error_latch_keeps_first_error() {
        let latch = ErrorLatch::default();

        assert!(latch.latch("connection refused"));
        assert!(!latch.latch("end of stream"));
        assert_eq!(latch.get().as_deref(), Some("connection refused"));

        latch.clear();
        assert!(!latch.latch(""));
        assert_eq!(latch.get(), None);
        assert!(latch.latch("end of stream"));
        assert_eq!(latch.get().as_deref(), Some("end of stream"));
    }

    #[test]
    fn test_stale_generation_refuses_frames() {
        let current = Arc::new(AtomicU64::new(1));
        let shared = BackendShared::new(Generation::new(1, current.clone()));
        shared.begin();

        assert!(shared.deliver_frame(Bytes::from_static(b"jpeg")));
        current.store(2, Ordering::Release);
        assert!(!shared.deliver_frame(Bytes::from_static(b"jpeg")));
        assert_eq!(shared.take_frame_count(), 1);
    }

    #[test]
    fn test_first_frame_clears_opening_status() {
        let shared = BackendShared::new(generation());
        shared.begin();
        assert_eq!(shared.status(), STATUS_OPENING);

        let surface = shared.surface();
        shared.deliver_frame(Bytes::from_static(b"one"));

        assert_eq!(shared.status(), "");
        let frame = surface.borrow().clone().unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.data, Bytes::from_static(b"one"));
    }

    #[test]
    fn test_begin_clears_previous_error() {
        let shared = BackendShared::new(generation());
        shared.fail(&BackendError::EndOfStream);
        assert!(!shared.is_streaming());
        assert_eq!(shared.error_message().as_deref(), Some("End of stream"));

        shared.begin();
        assert!(shared.is_streaming());
        assert_eq!(shared.error_message(), None);
    }

    #[test]
    fn test_native_factory_picks_backend_by_kind() {
        let factory = NativeBackendFactory::default();

        let pipeline = StreamDescriptor::new("gst", "videotestsrc ! videoconvert").unwrap();
        assert!(matches!(
            factory.create(&pipeline, generation()),
            Backend::Pipeline(_)
        ));

        let http = StreamDescriptor::new("mjpeg", "http://10.0.0.1/video").unwrap();
        assert!(matches!(
            factory.create(&http, generation()),
            Backend::MultipartHttp(_)
        ));
    }
}
