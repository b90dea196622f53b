//! Read-only records supplied by the object cache.
//!
//! The engine never mutates these; it only reads them through
//! [`CatalogSource`] while resolving a camera's candidate sources.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::PlaybackOverrides;

/// Errors that can occur while loading or querying a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Camera not found: {name}")]
    CameraNotFound { name: String },

    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog data: {0}")]
    Json(#[from] serde_json::Error),
}

/// A camera as seen by the video client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub name: String,
    pub encoder_address: Option<String>,
    pub encoder_port: Option<u16>,
    /// Multicast `addr[:port]`
    pub encoder_multicast: Option<String>,
    pub encoder_channel: Option<u32>,
    pub camera_template: Option<String>,
    /// Credential string of the camera's controller, `user:pass`
    pub controller_credentials: Option<String>,
}

/// Groups cameras that share the same set of video sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraTemplate {
    pub name: String,
    pub playback: PlaybackOverrides,
}

/// Parameterized description of one way to reach a camera's video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceTemplate {
    pub name: String,
    pub label: String,
    /// Pipeline description or URI containing `{token}` / `{token=default}` fields
    pub config: String,
    pub default_port: Option<u16>,
    /// Comma or semicolon separated network names; empty matches every network
    pub subnets: Option<String>,
}

/// Links a source template to a camera template with a priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOrder {
    pub camera_template: String,
    pub source_template: String,
    /// Lower values are tried first
    pub order: i32,
}

/// Runtime context of the client doing the viewing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Generic client properties (district name, site specific fallbacks)
    pub properties: HashMap<String, String>,
    pub session_id: u64,
    /// Name of the network the client is currently attached to
    pub network_name: String,
    /// Whether a media-pipeline runtime is installed on this client
    pub pipeline_available: bool,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            properties: HashMap::new(),
            session_id: 0,
            network_name: "unknown".to_string(),
            pipeline_available: true,
        }
    }
}

impl ClientContext {
    /// Looks up a client property, treating empty values as unset.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the context with a property set.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Read-only accessors over the object cache.
pub trait CatalogSource: Send + Sync {
    fn camera(&self, name: &str) -> Option<&Camera>;

    fn camera_template(&self, name: &str) -> Option<&CameraTemplate>;

    fn source_template(&self, name: &str) -> Option<&SourceTemplate>;

    /// All source-order links naming the given camera template, in any order.
    fn source_orders(&self, camera_template: &str) -> Vec<&SourceOrder>;
}

/// Catalog held entirely in memory, loadable from a JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryCatalog {
    pub cameras: Vec<Camera>,
    pub camera_templates: Vec<CameraTemplate>,
    pub source_templates: Vec<SourceTemplate>,
    pub source_orders: Vec<SourceOrder>,
}

impl InMemoryCatalog {
    /// Parses a catalog from JSON text.
    ///
    /// # Errors
    /// - `CatalogError::Json` - Malformed document
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    /// - `CatalogError::Io` - File could not be read
    /// - `CatalogError::Json` - Malformed document
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Looks up a camera or reports it as missing.
    ///
    /// # Errors
    /// - `CatalogError::CameraNotFound` - No camera with that name
    pub fn require_camera(&self, name: &str) -> Result<&Camera, CatalogError> {
        self.camera(name).ok_or_else(|| CatalogError::CameraNotFound {
            name: name.to_string(),
        })
    }
}

impl CatalogSource for InMemoryCatalog {
    fn camera(&self, name: &str) -> Option<&Camera> {
        self.cameras.iter().find(|camera| camera.name == name)
    }

    fn camera_template(&self, name: &str) -> Option<&CameraTemplate> {
        self.camera_templates
            .iter()
            .find(|template| template.name == name)
    }

    fn source_template(&self, name: &str) -> Option<&SourceTemplate> {
        self.source_templates
            .iter()
            .find(|template| template.name == name)
    }

    fn source_orders(&self, camera_template: &str) -> Vec<&SourceOrder> {
        self.source_orders
            .iter()
            .filter(|link| link.camera_template == camera_template)
            .collect()
    }
}
