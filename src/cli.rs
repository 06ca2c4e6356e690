//! Debug/driver command line, standing in for a real UI adapter.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::{ControlError, Result};
use crate::session::SpawnConfig;
use crate::settings::{MemorySettings, Settings, keys};
use crate::transport::mpris::MprisTransport;
use crate::transport::socket::SocketTransport;
use crate::transport::{Command, Reply, Transport};
use crate::types::Target;

/// Control-and-sync driver for external media players.
#[derive(Debug, Parser)]
#[command(name = "lofictl", version, about)]
pub struct Cli {
    /// Write logs to daily-rotated files in this directory as well.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Driver subcommands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Start playing a URI and print state transitions until interrupted.
    Play {
        /// Playable URI (stream URL, file).
        uri: String,

        /// Display name for the target.
        #[arg(long)]
        name: Option<String>,
    },

    /// Ask the running player to shut down.
    Stop,

    /// Toggle pause on the running player.
    Toggle,

    /// Skip to the next playlist entry.
    Next,

    /// Skip to the previous playlist entry.
    Previous,

    /// Set the player volume.
    Volume {
        /// Level, 0..=100.
        level: u8,
    },

    /// Print the player's current status and metadata.
    Status,

    /// Follow an MPRIS player's notifications on the session bus.
    Watch {
        /// Well-known bus name of the player.
        #[arg(default_value = "org.mpris.MediaPlayer2.spotify")]
        bus_name: String,
    },

    /// List configured targets.
    Targets,
}

/// Run one CLI invocation.
///
/// # Errors
/// Propagates config and transport failures; each is printable and
/// non-fatal to the player itself.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        CliCommand::Play { uri, name } => play(&config, uri, name).await,
        CliCommand::Stop => stop(&config).await,
        CliCommand::Toggle => toggle(&config).await,
        CliCommand::Next => skip(&config, Command::Next).await,
        CliCommand::Previous => skip(&config, Command::Previous).await,
        CliCommand::Volume { level } => volume(&config, level).await,
        CliCommand::Status => status(&config).await,
        CliCommand::Watch { bus_name } => watch(&bus_name).await,
        CliCommand::Targets => {
            for target in &config.targets {
                println!("{}\t{}\t{}", target.id, target.name, target.uri);
            }
            Ok(())
        }
    }
}

async fn play(config: &Config, uri: String, name: Option<String>) -> Result<()> {
    let target = Target::new(name.unwrap_or_else(|| uri.clone()), uri);

    let transport: Arc<dyn Transport> = Arc::new(SocketTransport::new(&config.socket_path));
    let settings = Arc::new(MemorySettings::new());
    settings.set(keys::VOLUME, json!(config.volume));

    let controller = Controller::new(transport, config.spawn_config(), settings);
    controller.play(target).await?;

    let mut states = controller.watch_state();
    loop {
        tokio::select! {
            state = states.next() => {
                let Some(state) = state else { break };
                println!(
                    "{} {} - {}",
                    state.status,
                    state.artist_display(),
                    state.title_display()
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping player");
                controller.stop().await;
                break;
            }
        }
    }
    Ok(())
}

async fn stop(config: &Config) -> Result<()> {
    let transport = SocketTransport::new(&config.socket_path);
    match transport.quit().await {
        Ok(()) => println!("stopped"),
        Err(ControlError::Connection(_)) => info!("no player listening, nothing to stop"),
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn toggle(config: &Config) -> Result<()> {
    let transport = SocketTransport::new(&config.socket_path);
    transport.send(Command::TogglePause).await?;
    if let Reply::Paused(paused) = transport.send(Command::PauseState).await? {
        println!("{}", if paused { "paused" } else { "playing" });
    }
    Ok(())
}

async fn skip(config: &Config, command: Command) -> Result<()> {
    let transport = SocketTransport::new(&config.socket_path);
    transport.send(command).await?;
    Ok(())
}

async fn volume(config: &Config, level: u8) -> Result<()> {
    let transport = SocketTransport::new(&config.socket_path);
    transport.send(Command::SetVolume(level.min(100))).await?;
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let transport = SocketTransport::new(&config.socket_path);

    let status = match transport.send(Command::Status).await? {
        Reply::Status(status) => status,
        reply => {
            return Err(ControlError::Protocol(format!(
                "unexpected status reply: {reply:?}"
            )));
        }
    };
    println!("status: {status}");

    if let Reply::Metadata(metadata) = transport.send(Command::Metadata).await? {
        println!(
            "track: {} - {}",
            metadata.artist.as_deref().unwrap_or("Unknown Artist"),
            metadata.title.as_deref().unwrap_or("Unknown Title"),
        );
    }
    Ok(())
}

async fn watch(bus_name: &str) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(MprisTransport::connect(bus_name).await?);
    let settings = Arc::new(MemorySettings::new());
    let controller = Controller::new(transport, SpawnConfig::default(), settings);

    let target = Target::new(bus_name, format!("mpris:{bus_name}"));
    controller.play_remote(target, bus_name).await?;

    println!("watching {bus_name} (ctrl-c to quit)");
    let mut states = controller.watch_state();
    loop {
        tokio::select! {
            state = states.next() => {
                let Some(state) = state else { break };
                println!(
                    "{} {} - {}",
                    state.status,
                    state.artist_display(),
                    state.title_display()
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
