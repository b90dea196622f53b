//! Centralized configuration for Sightline.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Central configuration for all Sightline components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SightlineConfig {
    pub playback: PlaybackConfig,
    pub http: HttpConfig,
    pub pipeline: PipelineConfig,
}

/// System-wide playback supervision defaults.
///
/// Every field can be overridden per camera template through
/// [`PlaybackOverrides`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Start scanning as soon as a camera is selected
    pub autostart: bool,
    /// Advance to the next candidate when a connection attempt times out
    pub failover_enabled: bool,
    /// Seconds without frames before a scan attempt is abandoned
    pub connect_fail_seconds: u32,
    /// Seconds without frames before a viewing stream counts as lost
    pub lost_timeout_seconds: u32,
    /// Retry the same source after a viewing stream is lost
    pub auto_reconnect: bool,
    /// Seconds without frames before a reconnect attempt is retried
    pub reconnect_timeout_seconds: u32,
    /// Expire a viewing stream after this many seconds (0 = unlimited)
    pub max_duration_seconds: u32,
    /// Period of the liveness tick
    pub tick_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            failover_enabled: true,
            connect_fail_seconds: 10,
            lost_timeout_seconds: 10,
            auto_reconnect: true,
            reconnect_timeout_seconds: 10,
            max_duration_seconds: 0,
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Optional per-camera-template playback settings.
///
/// Unset fields fall back to the system-wide [`PlaybackConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOverrides {
    pub autostart: Option<bool>,
    pub failover_enabled: Option<bool>,
    pub connect_fail_seconds: Option<u32>,
    pub lost_timeout_seconds: Option<u32>,
    pub auto_reconnect: Option<bool>,
    pub reconnect_timeout_seconds: Option<u32>,
    pub max_duration_seconds: Option<u32>,
}

impl PlaybackConfig {
    /// Returns a copy with every set override applied.
    pub fn with_overrides(&self, overrides: &PlaybackOverrides) -> Self {
        Self {
            autostart: overrides.autostart.unwrap_or(self.autostart),
            failover_enabled: overrides.failover_enabled.unwrap_or(self.failover_enabled),
            connect_fail_seconds: overrides
                .connect_fail_seconds
                .unwrap_or(self.connect_fail_seconds),
            lost_timeout_seconds: overrides
                .lost_timeout_seconds
                .unwrap_or(self.lost_timeout_seconds),
            auto_reconnect: overrides.auto_reconnect.unwrap_or(self.auto_reconnect),
            reconnect_timeout_seconds: overrides
                .reconnect_timeout_seconds
                .unwrap_or(self.reconnect_timeout_seconds),
            max_duration_seconds: overrides
                .max_duration_seconds
                .unwrap_or(self.max_duration_seconds),
            tick_interval: self.tick_interval,
        }
    }
}

/// Multipart-over-HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for establishing the TCP/TLS connection
    pub connect_timeout: Duration,
    /// Maximum wait for the next body chunk
    pub read_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
    /// Largest accepted frame payload
    pub max_frame_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            user_agent: "sightline/0.1.0",
            max_frame_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

/// External media-pipeline runtime configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whether pipeline sources may be used at all on this client
    pub enabled: bool,
    /// Launcher program that parses and runs a pipeline description
    pub launcher: String,
    /// Arguments placed before the pipeline description
    pub launcher_args: Vec<String>,
    /// Stage appended to every pipeline, producing multipart JPEG on stdout
    pub sink_stage: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            launcher: "gst-launch-1.0".to_string(),
            launcher_args: vec!["-q".to_string()],
            sink_stage: "jpegenc ! multipartmux boundary=sightline ! fdsink fd=1".to_string(),
        }
    }
}

impl SightlineConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(seconds) = env_parse::<u32>("SIGHTLINE_CONNECT_FAIL_SEC") {
            config.playback.connect_fail_seconds = seconds;
        }

        if let Some(seconds) = env_parse::<u32>("SIGHTLINE_LOST_TIMEOUT_SEC") {
            config.playback.lost_timeout_seconds = seconds;
        }

        if let Some(seconds) = env_parse::<u32>("SIGHTLINE_RECONNECT_TIMEOUT_SEC") {
            config.playback.reconnect_timeout_seconds = seconds;
        }

        if let Some(seconds) = env_parse::<u32>("SIGHTLINE_MAX_DURATION_SEC") {
            config.playback.max_duration_seconds = seconds;
        }

        if let Some(enabled) = env_parse::<bool>("SIGHTLINE_AUTOSTART") {
            config.playback.autostart = enabled;
        }

        if let Some(enabled) = env_parse::<bool>("SIGHTLINE_FAILOVER") {
            config.playback.failover_enabled = enabled;
        }

        if let Some(enabled) = env_parse::<bool>("SIGHTLINE_AUTO_RECONNECT") {
            config.playback.auto_reconnect = enabled;
        }

        if let Some(seconds) = env_parse::<u64>("SIGHTLINE_HTTP_TIMEOUT") {
            config.http.read_timeout = Duration::from_secs(seconds);
        }

        if let Ok(launcher) = std::env::var("SIGHTLINE_PIPELINE_LAUNCHER") {
            if !launcher.trim().is_empty() {
                config.pipeline.launcher = launcher;
            }
        }

        if let Some(enabled) = env_parse::<bool>("SIGHTLINE_PIPELINE_ENABLED") {
            config.pipeline.enabled = enabled;
        }

        config
    }

    /// Creates a configuration with short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            playback: PlaybackConfig {
                connect_fail_seconds: 2,
                lost_timeout_seconds: 2,
                reconnect_timeout_seconds: 2,
                ..Default::default()
            },
            http: HttpConfig {
                connect_timeout: Duration::from_millis(500),
                read_timeout: Duration::from_secs(2),
                ..Default::default()
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
