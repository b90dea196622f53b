//! Tracing setup for Sightline
//!
//! Operators watching a camera want phase changes on the console, not one
//! line per reconnecting socket. The console therefore keeps backend readers
//! and the HTTP stack at `warn` unless debugging, while the complete trace
//! of the last run always goes to disk.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File the full trace of the last run is written to.
pub const LOG_FILE_NAME: &str = "sightline-last-run.log";

/// Targets that log per connection or per frame.
const NOISY_TARGETS: &[&str] = &["sightline_core::backend", "reqwest", "hyper_util"];

/// Console filter directives for an operator-chosen level.
///
/// Below `debug` the noisy targets are capped at `warn`; at `debug` and
/// `trace` everything follows the chosen level.
pub fn console_directives(console_level: Level) -> String {
    let mut directives = console_level.to_string().to_lowercase();
    if console_level >= Level::DEBUG {
        return directives;
    }
    // Levels order by verbosity, so min() is the quieter one
    let capped = console_level.min(Level::WARN);
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{target}={}", capped.to_string().to_lowercase()));
    }
    directives
}

/// Installs the console and file layers.
///
/// `RUST_LOG` replaces the console directives when set. The file at
/// `<logs_dir>/sightline-last-run.log` (default `./logs`) is truncated and
/// receives every event at trace level.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - Logs directory or file cannot be created, or a subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;
    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(console_directives(console_level)))?;

    let console_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    // Reader tasks hop between worker threads; keep thread ids in the file
    let file_layer = fmt::layer()
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        "Tracing initialized: console={}, trace file={}",
        console_level,
        log_file_path.display()
    );

    Ok(())
}

/// Console verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only errors
    Error,
    /// Failures that playback recovers from
    Warn,
    /// Phase changes and camera selection
    Info,
    /// Backend lifecycle and stream readers
    Debug,
    /// Everything
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use sightline_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_console_caps_backend_noise() {
        let directives = console_directives(Level::INFO);

        assert!(directives.starts_with("info,"));
        assert!(directives.contains("sightline_core::backend=warn"));
        assert!(directives.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_error_console_keeps_its_level_for_noisy_targets() {
        let directives = console_directives(Level::ERROR);

        assert!(directives.contains("sightline_core::backend=error"));
        assert!(!directives.contains("=warn"));
    }

    #[test]
    fn test_debug_console_is_not_capped() {
        assert_eq!(console_directives(Level::DEBUG), "debug");
        assert_eq!(console_directives(Level::TRACE), "trace");
    }

    #[test]
    fn test_init_tracing_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();

        init_tracing(Level::WARN, Some(dir.path())).unwrap();
        tracing::info!("written to the trace file only");

        assert!(dir.path().join(LOG_FILE_NAME).exists());
    }
}
