//! Simulated camera network for deterministic playback testing.
//!
//! Sources are keyed by their expanded config string. Each source follows a
//! [`SourceBehavior`] that can be changed at any time, and frames only flow
//! when [`SimulatedNetwork::pump`] is called, so tests decide exactly which
//! liveness ticks see frames.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::backend::{Backend, BackendError, BackendFactory, BackendShared, Generation};
use crate::source::StreamDescriptor;

/// Smallest byte sequence that looks like a JPEG image.
const SIMULATED_FRAME: &[u8] = b"\xff\xd8\xff\xd9";

/// How a simulated source responds once a backend opens it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceBehavior {
    /// Connects but never produces frames
    #[default]
    Silent,
    /// Produces one frame per pump
    Live,
    /// Fails immediately with the given message
    FailOnStart(String),
}

#[derive(Default)]
struct NetworkState {
    behaviors: HashMap<String, SourceBehavior>,
    open: Vec<(String, Weak<BackendShared>)>,
    starts: Vec<String>,
    stops: usize,
    active: usize,
    max_active: usize,
}

/// Shared handle to the simulated network.
#[derive(Clone, Default)]
pub struct SimulatedNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how the source with this config behaves from now on.
    pub fn set_behavior(&self, config: &str, behavior: SourceBehavior) {
        self.state
            .lock()
            .behaviors
            .insert(config.to_string(), behavior);
    }

    /// Delivers one frame to every open backend whose source is live.
    ///
    /// Returns the number of frames delivered.
    pub fn pump(&self) -> usize {
        let mut state = self.state.lock();
        state.open.retain(|(_, shared)| shared.strong_count() > 0);

        let mut delivered = 0;
        for (config, shared) in &state.open {
            let live = matches!(state.behaviors.get(config), Some(SourceBehavior::Live));
            let Some(shared) = shared.upgrade() else {
                continue;
            };
            if live && shared.is_streaming() && shared.deliver_frame(Bytes::from_static(SIMULATED_FRAME)) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Pumps frames periodically until the returned task is aborted.
    pub fn spawn_pump(&self, period: Duration) -> JoinHandle<()> {
        let network = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                network.pump();
            }
        })
    }

    /// Breaks every open stream of a source with the given error.
    pub fn fail_source(&self, config: &str, message: &str) {
        for shared in self.open_backends(config) {
            shared.fail(&BackendError::Connect {
                reason: message.to_string(),
            });
        }
    }

    /// Closes every open stream of a source cleanly.
    pub fn end_source(&self, config: &str) {
        for shared in self.open_backends(config) {
            shared.mark_stopped();
        }
    }

    /// Configs of every backend start, in order.
    pub fn starts(&self) -> Vec<String> {
        self.state.lock().starts.clone()
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stops
    }

    /// Backends started and not yet stopped.
    pub fn active_backends(&self) -> usize {
        self.state.lock().active
    }

    /// Highest number of simultaneously active backends seen.
    pub fn max_concurrent_backends(&self) -> usize {
        self.state.lock().max_active
    }

    pub fn factory(&self) -> ScriptedBackendFactory {
        ScriptedBackendFactory {
            network: self.clone(),
        }
    }

    fn open_backends(&self, config: &str) -> Vec<Arc<BackendShared>> {
        self.state
            .lock()
            .open
            .iter()
            .filter(|(open_config, _)| open_config == config)
            .filter_map(|(_, shared)| shared.upgrade())
            .collect()
    }

    fn open(&self, config: &str, shared: &Arc<BackendShared>) -> SourceBehavior {
        let mut state = self.state.lock();
        state.starts.push(config.to_string());
        state.active += 1;
        state.max_active = state.max_active.max(state.active);
        state
            .open
            .push((config.to_string(), Arc::downgrade(shared)));
        state.behaviors.get(config).cloned().unwrap_or_default()
    }

    fn close(&self, shared: &Arc<BackendShared>) {
        let mut state = self.state.lock();
        state.stops += 1;
        state.active = state.active.saturating_sub(1);
        let target = Arc::downgrade(shared);
        state.open.retain(|(_, open)| !open.ptr_eq(&target));
    }
}

/// Backend attached to a [`SimulatedNetwork`] source.
pub struct ScriptedBackend {
    descriptor: StreamDescriptor,
    shared: Arc<BackendShared>,
    network: SimulatedNetwork,
    running: bool,
}

impl ScriptedBackend {
    pub fn new(
        descriptor: StreamDescriptor,
        network: SimulatedNetwork,
        generation: Generation,
    ) -> Self {
        Self {
            descriptor,
            shared: BackendShared::new(generation),
            network,
            running: false,
        }
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.shared.begin();

        let behavior = self
            .network
            .open(self.descriptor.expanded_config(), &self.shared);
        if let SourceBehavior::FailOnStart(reason) = behavior {
            self.shared.fail(&BackendError::Connect { reason });
        }
    }

    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.network.close(&self.shared);
        self.shared.mark_stopped();
        self.shared.detach_surface();
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub(crate) fn shared(&self) -> &BackendShared {
        &self.shared
    }
}

/// Creates [`ScriptedBackend`]s for any descriptor kind.
#[derive(Clone)]
pub struct ScriptedBackendFactory {
    network: SimulatedNetwork,
}

impl BackendFactory for ScriptedBackendFactory {
    fn create(&self, descriptor: &StreamDescriptor, generation: Generation) -> Backend {
        Backend::Scripted(ScriptedBackend::new(
            descriptor.clone(),
            self.network.clone(),
            generation,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;

    fn backend(network: &SimulatedNetwork, config: &str) -> Backend {
        let descriptor = StreamDescriptor::new("sim", config).unwrap();
        network
            .factory()
            .create(&descriptor, Generation::new(1, Arc::new(AtomicU64::new(1))))
    }

    #[tokio::test]
    async fn test_live_source_delivers_on_pump() {
        let network = SimulatedNetwork::new();
        network.set_behavior("http://cam-a/video", SourceBehavior::Live);

        let mut live = backend(&network, "http://cam-a/video");
        let mut silent = backend(&network, "http://cam-b/video");
        live.start();
        silent.start();

        assert_eq!(network.pump(), 1);
        assert_eq!(network.pump(), 1);
        assert_eq!(live.received_frame_count_since_last_poll(), 2);
        assert_eq!(silent.received_frame_count_since_last_poll(), 0);
        assert_eq!(network.max_concurrent_backends(), 2);

        live.stop().await;
        silent.stop().await;
        assert_eq!(network.active_backends(), 0);
        assert_eq!(network.pump(), 0);
    }

    #[tokio::test]
    async fn test_failing_source_latches_error() {
        let network = SimulatedNetwork::new();
        network.set_behavior(
            "http://cam-a/video",
            SourceBehavior::FailOnStart("Connection refused".to_string()),
        );

        let mut backend = backend(&network, "http://cam-a/video");
        backend.start();

        assert!(!backend.is_streaming());
        assert_eq!(
            backend.error_message().as_deref(),
            Some("Connection refused")
        );
        backend.stop().await;
        assert_eq!(network.stop_count(), 1);
    }
}
