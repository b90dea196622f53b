//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use serde::Serialize;
use sightline_core::catalog::{ClientContext, InMemoryCatalog};
use sightline_core::config::SightlineConfig;
use sightline_core::playback::{ControllerSnapshot, spawn_controller};
use sightline_core::{NativeBackendFactory, Result, SourceResolver};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the candidate sources of a camera in priority order
    Resolve {
        #[command(flatten)]
        selection: Selection,
        /// Print the candidates as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Play a camera and print status changes until Ctrl-C
    Watch {
        #[command(flatten)]
        selection: Selection,
        /// Print each snapshot as one JSON line
        #[arg(long)]
        json: bool,
    },
}

/// Camera and client context shared by every command.
#[derive(clap::Args)]
pub struct Selection {
    /// Catalog JSON file
    #[arg(long)]
    catalog: PathBuf,
    /// Camera name
    #[arg(long)]
    camera: String,
    /// Network the client is attached to
    #[arg(long)]
    network: Option<String>,
    /// Client session identifier
    #[arg(long, default_value_t = 0)]
    session_id: u64,
    /// Client property as KEY=VALUE (repeatable)
    #[arg(long = "property", value_parser = parse_property)]
    properties: Vec<(String, String)>,
}

impl Selection {
    fn context(&self, config: &SightlineConfig) -> ClientContext {
        let mut context = ClientContext {
            session_id: self.session_id,
            pipeline_available: config.pipeline.enabled,
            ..Default::default()
        };
        if let Some(network) = &self.network {
            context.network_name = network.clone();
        }
        for (key, value) in &self.properties {
            context = context.with_property(key, value);
        }
        context
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<()> {
    let config = SightlineConfig::from_env();
    match command {
        Commands::Resolve { selection, json } => resolve_sources(&selection, &config, json),
        Commands::Watch { selection, json } => watch_camera(&selection, config, json).await,
    }
}

fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let catalog = InMemoryCatalog::load(path)?;
    tracing::debug!(
        "Loaded catalog {} ({} cameras, {} source templates)",
        path.display(),
        catalog.cameras.len(),
        catalog.source_templates.len()
    );
    Ok(catalog)
}

/// Print the candidate list of a camera
fn resolve_sources(selection: &Selection, config: &SightlineConfig, json: bool) -> Result<()> {
    let catalog = load_catalog(&selection.catalog)?;
    let camera = catalog.require_camera(&selection.camera)?;
    let context = selection.context(config);

    let candidates = SourceResolver::new(&catalog, &context).resolve(camera);
    if json {
        println!("{}", to_json(&candidates)?);
        return Ok(());
    }
    if candidates.is_empty() {
        println!("No playable sources for camera {}", camera.name);
        return Ok(());
    }

    for (index, candidate) in candidates.iter().enumerate() {
        println!(
            "{:>3}  {:<8} {:<20} {}",
            index,
            candidate.backend_kind(),
            candidate.source_label(),
            candidate.expanded_config()
        );
    }
    Ok(())
}

/// Run playback supervision for a camera until interrupted
async fn watch_camera(selection: &Selection, config: SightlineConfig, json: bool) -> Result<()> {
    let catalog = load_catalog(&selection.catalog)?;
    let camera = catalog.require_camera(&selection.camera)?;
    let context = selection.context(&config);

    let resolver = SourceResolver::new(&catalog, &context);
    let candidates = resolver.resolve(camera);
    let playback = resolver.playback_config(camera, &config.playback);

    let factory = NativeBackendFactory::new(config.http.clone(), config.pipeline.clone());
    let handle = spawn_controller(Arc::new(factory), config.playback.clone());
    let mut snapshots = handle.subscribe();

    let snapshot = handle
        .select_camera(camera.name.clone(), candidates, playback)
        .await?;
    print_snapshot(&snapshot, json)?;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(&snapshot, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping...");
                break;
            }
        }
    }

    handle.stop().await?;
    handle.shutdown().await?;
    Ok(())
}

fn print_snapshot(snapshot: &ControllerSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(snapshot)?);
        return Ok(());
    }
    let position = if snapshot.candidate_count == 0 {
        "-/-".to_string()
    } else {
        format!("{}/{}", snapshot.index + 1, snapshot.candidate_count)
    };
    let since = snapshot
        .phase_since
        .map(|since| since.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    println!(
        "{} [{:<12}] {} {} {}",
        since,
        snapshot.phase,
        snapshot.camera.as_deref().unwrap_or("-"),
        position,
        snapshot.status_text
    );
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn parse_property(value: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{value}'"))?;
    if key.trim().is_empty() {
        return Err("property key is empty".to_string());
    }
    Ok((key.trim().to_string(), value.to_string()))
}
