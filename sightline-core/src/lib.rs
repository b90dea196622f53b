//! Sightline Core - Camera video source resolution and playback failover
//!
//! This crate turns a camera's source templates into concrete stream
//! descriptors, plays them through pipeline or multipart-HTTP backends and
//! supervises playback with timeout, failover and reconnect rules.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod playback;
#[cfg(any(test, feature = "simulation"))]
pub mod simulation;
pub mod source;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use backend::{Backend, BackendError, BackendFactory, NativeBackendFactory};
pub use catalog::{CatalogError, CatalogSource, ClientContext, InMemoryCatalog};
pub use config::SightlineConfig;
pub use playback::{
    ControllerError, ControllerHandle, ControllerSnapshot, FailoverController, Phase,
    spawn_controller,
};
pub use source::{BackendKind, CandidateList, SourceResolver, StreamDescriptor, TemplateExpander};

/// Core errors that can bubble up from any Sightline subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SightlineError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output encoding error: {0}")]
    Output(#[from] serde_json::Error),
}

impl SightlineError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SightlineError::Catalog(e) => match e {
                CatalogError::CameraNotFound { name } => format!("Camera {name} not found"),
                CatalogError::Io { path, .. } => format!("Could not read catalog {path}"),
                CatalogError::Json(_) => "Catalog file is not valid".to_string(),
            },
            SightlineError::Backend(e) => format!("Video source error: {e}"),
            SightlineError::Controller(ControllerError::Cancelled) => {
                "Playback request was cancelled".to_string()
            }
            SightlineError::Controller(ControllerError::ControllerShutdown) => {
                "Playback has stopped".to_string()
            }
            SightlineError::Configuration { reason } => format!("Configuration error: {reason}"),
            SightlineError::Io(_) => "File system error occurred".to_string(),
            SightlineError::Output(_) => "Could not encode output".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SightlineError::Configuration { .. }
                | SightlineError::Catalog(CatalogError::CameraNotFound { .. })
                | SightlineError::Catalog(CatalogError::Json(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, SightlineError>;
