//! Media pipeline sources run by an external launcher process.
//!
//! The configured description is completed with a sink stage that encodes
//! frames as multipart JPEG on stdout, so the same framing decoder serves
//! both transports. The launcher's stderr plays the role of the pipeline's
//! message bus.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::{BackendError, BackendShared, Generation, MultipartDecoder, StreamEnd};
use crate::config::PipelineConfig;
use crate::source::{PIPELINE_STAGE_SEPARATOR, StreamDescriptor};

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Backend running a pipeline description through the launcher.
pub struct PipelineBackend {
    descriptor: StreamDescriptor,
    config: PipelineConfig,
    max_frame_bytes: usize,
    shared: Arc<BackendShared>,
    child: Option<Child>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineBackend {
    pub fn new(
        descriptor: StreamDescriptor,
        config: PipelineConfig,
        max_frame_bytes: usize,
        generation: Generation,
    ) -> Self {
        Self {
            descriptor,
            config,
            max_frame_bytes,
            shared: BackendShared::new(generation),
            child: None,
            tasks: Vec::new(),
        }
    }

    /// Launcher arguments: configured flags followed by the pipeline stages.
    pub fn launch_arguments(&self) -> Vec<String> {
        let description = format!(
            "{}{}{}",
            self.descriptor.expanded_config(),
            PIPELINE_STAGE_SEPARATOR,
            self.config.sink_stage
        );
        self.config
            .launcher_args
            .iter()
            .cloned()
            .chain(description.split_whitespace().map(str::to_string))
            .collect()
    }

    /// Launches the pipeline. Calling start on a running backend is a no-op.
    pub fn start(&mut self) {
        if self.child.is_some() {
            return;
        }
        self.shared.begin();

        let arguments = self.launch_arguments();
        tracing::info!(
            "Launching pipeline {}: {} {}",
            self.descriptor.source_label(),
            self.config.launcher,
            arguments.join(" ")
        );

        let mut command = Command::new(&self.config.launcher);
        command
            .args(&arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.shared.fail(&BackendError::PipelineLaunch {
                    reason: format!("{}: {e}", self.config.launcher),
                });
                return;
            }
        };

        if let Some(stdout) = child.stdout.take() {
            let shared = Arc::clone(&self.shared);
            let decoder = MultipartDecoder::new(self.max_frame_bytes);
            self.tasks.push(tokio::spawn(async move {
                match read_frames(stdout, decoder, &shared).await {
                    Ok(StreamEnd::Finished) => {
                        tracing::info!("Pipeline reached end of stream");
                        shared.mark_stopped();
                    }
                    Ok(StreamEnd::Superseded) => shared.mark_stopped(),
                    Err(e) => shared.fail(&e),
                }
            }));
        }

        if let Some(stderr) = child.stderr.take() {
            let shared = Arc::clone(&self.shared);
            self.tasks
                .push(tokio::spawn(watch_bus(BufReader::new(stderr), shared)));
        }

        self.child = Some(child);
    }

    /// Detaches the readers, then kills and reaps the launcher.
    pub async fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to stop pipeline process: {}", e);
            }
        }
        self.shared.mark_stopped();
        self.shared.detach_surface();
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub(super) fn shared(&self) -> &BackendShared {
        &self.shared
    }
}

impl Drop for PipelineBackend {
    // The child itself is killed by `kill_on_drop`
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Reads multipart frames from a byte stream until it ends.
///
/// # Errors
/// - `BackendError::Io` - Read failed
/// - Any framing error from [`MultipartDecoder`]
pub async fn read_frames<R>(
    mut reader: R,
    mut decoder: MultipartDecoder,
    shared: &BackendShared,
) -> Result<StreamEnd, BackendError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_BUFFER_BYTES];
    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            decoder.finish()?;
            return Ok(StreamEnd::Finished);
        }
        decoder.extend(&buffer[..read]);
        while let Some(frame) = decoder.next_frame()? {
            if !shared.deliver_frame(frame) {
                return Ok(StreamEnd::Superseded);
            }
        }
    }
}

/// A line of launcher diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Error(String),
    Warning(String),
    Info(String),
    Other(String),
}

/// Classifies one diagnostic line from the launcher.
///
/// `ERROR: from element /path/to:element: text` yields `Error("text")`.
pub fn classify_bus_line(line: &str) -> BusMessage {
    let line = line.trim();
    let (kind, rest) = match line.split_once(':') {
        Some((kind, rest)) => (kind.trim(), rest.trim()),
        None => return BusMessage::Other(line.to_string()),
    };
    let text = rest
        .strip_prefix("from element ")
        .and_then(|element| element.split_once(": "))
        .map_or(rest, |(_, text)| text.trim())
        .to_string();

    match kind {
        "ERROR" => BusMessage::Error(text),
        "WARNING" => BusMessage::Warning(text),
        "INFO" => BusMessage::Info(text),
        _ => BusMessage::Other(line.to_string()),
    }
}

async fn watch_bus<R>(reader: BufReader<R>, shared: Arc<BackendShared>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Pipeline diagnostics closed: {}", e);
                break;
            }
        };
        match classify_bus_line(&line) {
            BusMessage::Error(message) => shared.fail(&BackendError::Pipeline { message }),
            BusMessage::Warning(message) => tracing::warn!("Pipeline warning: {}", message),
            BusMessage::Info(message) => tracing::info!("Pipeline: {}", message),
            BusMessage::Other(line) if !line.is_empty() => tracing::debug!("Pipeline: {}", line),
            BusMessage::Other(_) => {}
        }
    }
}
