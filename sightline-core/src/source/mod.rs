//! Video source resolution.
//!
//! Turns a camera's priority-ordered source templates into concrete stream
//! descriptors that a backend can connect to.

pub mod resolver;
pub mod template;

use serde::Serialize;

pub use resolver::SourceResolver;
pub use template::TemplateExpander;

/// Separator between stages of a pipeline description.
pub const PIPELINE_STAGE_SEPARATOR: &str = " ! ";

/// Transport family able to play a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendKind {
    /// Media pipeline run by the external pipeline runtime
    Pipeline,
    /// Multipart JPEG frames over HTTP(S)
    MultipartHttp,
}

impl BackendKind {
    /// Classifies an expanded config string.
    ///
    /// Any config with a stage separator is a pipeline; otherwise it must be
    /// an absolute `http` or `https` URL. Returns `None` for anything else.
    pub fn classify(config: &str) -> Option<Self> {
        if config.contains(PIPELINE_STAGE_SEPARATOR) {
            return Some(BackendKind::Pipeline);
        }
        match url::Url::parse(config) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                Some(BackendKind::MultipartHttp)
            }
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Pipeline => "pipeline",
            BackendKind::MultipartHttp => "mjpeg",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A source template after runtime substitution, ready for a backend.
///
/// Only constructible from a config that validates for one backend kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    source_label: String,
    expanded_config: String,
    backend_kind: BackendKind,
}

impl StreamDescriptor {
    /// Creates a descriptor, or `None` when the config is not playable.
    pub fn new(source_label: impl Into<String>, expanded_config: impl Into<String>) -> Option<Self> {
        let expanded_config = expanded_config.into();
        let backend_kind = BackendKind::classify(&expanded_config)?;
        Some(Self {
            source_label: source_label.into(),
            expanded_config,
            backend_kind,
        })
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn expanded_config(&self) -> &str {
        &self.expanded_config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }
}

impl std::fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source_label, self.expanded_config)
    }
}

/// Ordered candidate sources for one camera selection.
pub type CandidateList = Vec<StreamDescriptor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_separator_means_pipeline() {
        let kind = BackendKind::classify("rtspsrc location=rtsp://10.0.0.1/s1 ! rtph264depay");
        assert_eq!(kind, Some(BackendKind::Pipeline));
    }

    #[test]
    fn test_http_url_means_multipart() {
        assert_eq!(
            BackendKind::classify("http://10.0.0.1:8080/mjpg/video.cgi"),
            Some(BackendKind::MultipartHttp)
        );
        assert_eq!(
            BackendKind::classify("https://user:pw@cam.example.com/video"),
            Some(BackendKind::MultipartHttp)
        );
    }

    #[test]
    fn test_unplayable_configs_are_rejected() {
        assert_eq!(BackendKind::classify("rtsp://10.0.0.1/stream1"), None);
        assert_eq!(BackendKind::classify("not a url"), None);
        assert_eq!(BackendKind::classify("videotestsrc!fakesink"), None);
        assert!(StreamDescriptor::new("bad", "").is_none());
    }

    #[test]
    fn test_descriptor_display_includes_label() {
        let descriptor = StreamDescriptor::new("MJPEG", "http://cam/video").unwrap();
        assert_eq!(descriptor.to_string(), "MJPEG: http://cam/video");
        assert_eq!(descriptor.backend_kind(), BackendKind::MultipartHttp);
    }
}
