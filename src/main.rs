//! aw-watcher-editor CLI
//!
//! Runs the editor bridge and the heartbeat controller.

use anyhow::Context;
use aw_watcher_editor::{
    bridge::{self, BridgeConfig},
    AwClient, BucketIdentity, Config, ConfigSource, Controller, EditorState, HostMessage,
    WatcherStatus, VERSION,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aw-watcher-editor")]
#[command(author = "ActivityWatch")]
#[command(version = VERSION)]
#[command(about = "Editor activity watcher for ActivityWatch", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watcher until Ctrl+C
    Start {
        /// Port for the editor bridge
        #[arg(long)]
        port: Option<u16>,

        /// aw-server host
        #[arg(long)]
        server_host: Option<String>,

        /// aw-server port
        #[arg(long)]
        server_port: Option<u16>,

        /// Talk to an aw-server running in testing mode
        #[arg(long)]
        testing: bool,

        /// Rate limit for same-file heartbeats; pins it across reloads
        #[arg(long)]
        max_heartbeats_per_sec: Option<f64>,
    },

    /// Ask a running watcher to re-create its bucket and reload config
    Reload {
        /// Port of the running bridge
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show the status of a running watcher
    Status {
        /// Port of the running bridge
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::config_path);

    match cli.command {
        Commands::Start {
            port,
            server_host,
            server_port,
            testing,
            max_heartbeats_per_sec,
        } => {
            let mut config = ConfigSource::File(config_path.clone()).load();
            if let Some(port) = port {
                config.bridge_port = port;
            }
            if let Some(host) = server_host {
                config.store.host = host;
            }
            if server_port.is_some() {
                config.store.port = server_port;
            }
            config.store.testing |= testing;

            let source = match max_heartbeats_per_sec {
                Some(rate) => {
                    config.max_heartbeats_per_sec = rate;
                    ConfigSource::Fixed(config.clone())
                }
                None => ConfigSource::File(config_path),
            };
            cmd_start(config, source).await
        }
        Commands::Reload { port } => {
            let port = bridge_port(&config_path, port);
            cmd_reload(port).await
        }
        Commands::Status { port } => {
            let port = bridge_port(&config_path, port);
            cmd_status(port).await
        }
        Commands::Config => {
            cmd_config(&config_path);
            Ok(())
        }
    }
}

async fn cmd_start(config: Config, source: ConfigSource) -> anyhow::Result<()> {
    tracing::info!("aw-watcher-editor v{VERSION}");

    let client = AwClient::new(config.store.clone()).context("creating aw-server client")?;
    match client.server_info().await {
        Ok(info) => tracing::info!(
            "Connected to aw-server {} on {} (testing: {})",
            info.version,
            info.hostname,
            info.testing
        ),
        Err(e) => tracing::warn!(
            "Could not reach aw-server at {}: {e}",
            client.config().api_url()
        ),
    }

    let identity = BucketIdentity::detect();
    tracing::info!("Bucket: {}", identity.id());

    let mut controller = Controller::new(identity, Arc::new(client), EditorState::new(), source);
    let status_rx = controller.subscribe();
    let (tx, rx) = mpsc::channel(256);

    let (addr, shutdown_tx) =
        bridge::run(BridgeConfig::new(config.bridge_port), tx.clone(), status_rx)
            .await
            .context("starting editor bridge")?;
    tracing::info!("Point the editor plugin at http://{addr}");

    let watcher = tokio::spawn(async move {
        controller.run(rx).await;
    });

    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    tracing::info!("Stopping watcher...");

    let _ = tx.send(HostMessage::Stop).await;
    watcher.await.context("watcher task failed")?;
    let _ = shutdown_tx.send(());

    Ok(())
}

async fn cmd_reload(port: u16) -> anyhow::Result<()> {
    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/reload"))
        .send()
        .await
        .context("could not reach the watcher; is it running?")?;

    if response.status().is_success() {
        println!("Reload requested.");
        Ok(())
    } else {
        anyhow::bail!("watcher refused reload: {}", response.status())
    }
}

async fn cmd_status(port: u16) -> anyhow::Result<()> {
    let status: WatcherStatus = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}/status"))
        .send()
        .await
        .context("could not reach the watcher; is it running?")?
        .json()
        .await
        .context("unexpected status response")?;

    println!("aw-watcher-editor Status");
    println!("========================");
    println!();
    println!("State: {:?}", status.state);
    println!("Bucket: {}", status.bucket_id);
    println!("Max heartbeats/sec: {}", status.max_heartbeats_per_sec);
    if let Some(error) = &status.critical_error {
        println!("Error: {error}");
    }
    println!();
    println!("Statistics:");
    println!("  Editor events: {}", status.stats.events_received);
    println!("  Heartbeats dispatched: {}", status.stats.heartbeats_dispatched);
    println!("  Suppressed: {}", status.stats.suppressed);
    println!("  Dropped (not ready): {}", status.stats.dropped_not_ready);
    println!("  Resolution failures: {}", status.stats.resolution_failures);
    println!(
        "  Submissions ok / failed: {} / {}",
        status.stats.submissions_ok, status.stats.submission_failures
    );

    Ok(())
}

fn cmd_config(config_path: &Path) {
    let config = ConfigSource::File(config_path.to_path_buf()).load();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
    println!();
    println!(
        "Effective max heartbeats/sec: {}",
        config.effective_max_heartbeats_per_sec()
    );
    println!("aw-server: {}", config.store.api_url());
}

fn bridge_port(config_path: &Path, port: Option<u16>) -> u16 {
    port.unwrap_or_else(|| ConfigSource::File(config_path.to_path_buf()).load().bridge_port)
}
