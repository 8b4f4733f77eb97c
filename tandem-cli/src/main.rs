mod join;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::net::SocketAddr;
use tandem_core::RoomId;
use tandem_relay::RelayConfig;
use tandem_session::SessionConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Two-party calls over a room-keyed signaling relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the signaling relay.
    Relay {
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Join a room as a headless participant. Lines typed on stdin are sent
    /// as chat; /call, /camera, /mic, /screen and /leave control the call.
    Join {
        room: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        relay: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_relay=info,tandem_session=info,webrtc=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Relay { bind } => {
            let mut config = RelayConfig::from_env().context("Invalid relay configuration")?;
            if let Some(bind) = bind {
                config.bind_address = bind;
            }

            println!(
                "{} {}",
                "Relay listening on".green().bold(),
                format!("ws://{}/ws", config.bind_address).cyan()
            );
            tandem_relay::serve(config).await?;
        }

        Commands::Join {
            room,
            name,
            email,
            relay,
        } => {
            let room_id = RoomId::new(room).context("Room id must not be blank")?;

            let mut config = SessionConfig::from_env().context("Invalid session configuration")?;
            if let Some(relay) = relay {
                config.relay_url = relay;
            }
            if let Some(name) = name {
                config.identity.name = name;
            }
            if let Some(email) = email {
                config.identity.email = Some(email);
            }

            join::run(config, room_id).await?;
        }
    }

    Ok(())
}
