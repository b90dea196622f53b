//! Multipart JPEG over HTTP(S).

use std::sync::Arc;

use tokio::task::JoinHandle;
use url::Url;

use super::{BackendError, BackendShared, Generation, MultipartDecoder, StreamEnd};
use crate::config::HttpConfig;
use crate::source::StreamDescriptor;

/// Backend reading a `multipart/x-mixed-replace` JPEG stream.
///
/// Credentials embedded in the URL are removed from the request target and
/// sent as basic authentication instead.
pub struct MultipartHttpBackend {
    descriptor: StreamDescriptor,
    config: HttpConfig,
    shared: Arc<BackendShared>,
    reader: Option<JoinHandle<()>>,
}

impl MultipartHttpBackend {
    pub fn new(descriptor: StreamDescriptor, config: HttpConfig, generation: Generation) -> Self {
        Self {
            descriptor,
            config,
            shared: BackendShared::new(generation),
            reader: None,
        }
    }

    /// Spawns the reader task. Calling start on a running backend is a no-op.
    pub fn start(&mut self) {
        if self.reader.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        self.shared.begin();
        tracing::info!(
            "Opening MJPEG stream {} (generation {})",
            self.descriptor.source_label(),
            self.shared.generation().id()
        );

        let url = self.descriptor.expanded_config().to_string();
        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        self.reader = Some(tokio::spawn(async move {
            match read_stream(&url, &config, &shared).await {
                Ok(StreamEnd::Finished) => {
                    tracing::info!("MJPEG stream closed by server");
                    shared.mark_stopped();
                }
                Ok(StreamEnd::Superseded) => {
                    tracing::debug!(
                        "MJPEG reader generation {} superseded",
                        shared.generation().id()
                    );
                    shared.mark_stopped();
                }
                Err(e) => shared.fail(&e),
            }
        }));
    }

    /// Aborts the reader and waits for it to exit.
    pub async fn stop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
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

impl Drop for MultipartHttpBackend {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Basic-auth credentials pulled out of a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Splits embedded user info off a stream URL.
///
/// # Errors
/// - `BackendError::InvalidUrl` - URL does not parse
pub fn split_credentials(config: &str) -> Result<(Url, Option<Credentials>), BackendError> {
    let mut url = Url::parse(config).map_err(|e| BackendError::InvalidUrl {
        reason: e.to_string(),
    })?;

    if url.username().is_empty() {
        return Ok((url, None));
    }

    let credentials = Credentials {
        username: url.username().to_string(),
        password: url.password().map(str::to_string),
    };
    url.set_username("")
        .and_then(|()| url.set_password(None))
        .map_err(|()| BackendError::InvalidUrl {
            reason: "URL cannot carry credentials".to_string(),
        })?;
    Ok((url, Some(credentials)))
}

async fn read_stream(
    config_url: &str,
    config: &HttpConfig,
    shared: &BackendShared,
) -> Result<StreamEnd, BackendError> {
    let (url, credentials) = split_credentials(config_url)?;

    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent)
        .redirect(reqwest::redirect::Policy::limited(3))
        .build()
        .map_err(|e| BackendError::Connect {
            reason: e.to_string(),
        })?;

    let mut request = client.get(url);
    if let Some(credentials) = credentials {
        request = request.basic_auth(credentials.username, credentials.password);
    }

    let mut response = request.send().await.map_err(|e| BackendError::Connect {
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::HttpStatus {
            status: status.to_string(),
        });
    }

    let mut decoder = MultipartDecoder::new(config.max_frame_bytes);
    loop {
        let chunk = tokio::time::timeout(config.read_timeout, response.chunk())
            .await
            .map_err(|_| BackendError::ReadTimeout)?
            .map_err(|e| BackendError::Connect {
                reason: e.to_string(),
            })?;

        let Some(chunk) = chunk else {
            decoder.finish()?;
            return Ok(StreamEnd::Finished);
        };

        decoder.extend(&chunk);
        while let Some(frame) = decoder.next_frame()? {
            if !shared.deliver_frame(frame) {
                return Ok(StreamEnd::Superseded);
            }
        }
    }
}
