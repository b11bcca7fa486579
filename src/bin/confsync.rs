//! Confsync CLI binary.
//!
//! Pushes configuration snapshots to a NETCONF server.
//!
//! # Commands
//!
//! - `push` - Push snapshot files in order with conflict retry
//! - `probe` - Check server reachability and print its capabilities

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use confsync::{CapabilityPoller, CapabilitySet, ConfigPusher, ConfigSnapshot, PusherConfig, VERSION};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "confsync")]
#[command(version = VERSION)]
#[command(about = "Push configuration snapshots to a NETCONF server", long_about = None)]
struct Cli {
    /// Config file path (default: <config dir>/confsync/config.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// NETCONF server address, overrides config
    #[arg(short, long, global = true)]
    address: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push snapshot XML files, in argument order
    Push {
        /// Snapshot XML files; a sibling <file>.caps lists required
        /// capabilities, one URI per line
        files: Vec<PathBuf>,
    },

    /// Connect once and print the server's capability set
    Probe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Push { files } => {
            if files.is_empty() {
                bail!("no snapshot files given");
            }
            let snapshots = load_snapshots(&files)?;
            let pusher = ConfigPusher::new(config);
            let results = pusher.push_all(&snapshots).await?;
            for (name, result) in &results {
                println!("{name}: pushed in {} attempt(s)", result.attempts);
            }
        }
        Commands::Probe => {
            let poller = CapabilityPoller::new(&config);
            let session = poller.wait_for_capabilities(&CapabilitySet::new()).await?;
            println!("session {} established", session.session_id());
            for capability in session.capabilities().iter() {
                println!("  {capability}");
            }
            session.close().await;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<PusherConfig> {
    let mut config = match &cli.config {
        Some(path) => PusherConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => match default_config_path() {
            Some(path) if path.exists() => PusherConfig::from_file(&path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            _ => PusherConfig::default(),
        },
    };
    config = config.merge(PusherConfig::from_env());

    if let Some(address) = &cli.address {
        config.address = address
            .parse()
            .with_context(|| format!("invalid address {address}"))?;
    }
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("confsync").join("config.toml"))
}

fn load_snapshots(files: &[PathBuf]) -> anyhow::Result<Vec<ConfigSnapshot>> {
    let mut snapshots = Vec::with_capacity(files.len());
    for file in files {
        let xml = std::fs::read_to_string(file)
            .with_context(|| format!("reading snapshot {}", file.display()))?;
        let caps_path = file.with_extension("caps");
        let capabilities = if caps_path.exists() {
            let raw = std::fs::read_to_string(&caps_path)
                .with_context(|| format!("reading capabilities {}", caps_path.display()))?;
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .collect()
        } else {
            CapabilitySet::new()
        };
        let name = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        snapshots.push(ConfigSnapshot::new(name, xml, capabilities));
    }
    Ok(snapshots)
}
