//! Terminal presence watcher
//!
//! Run with:
//! ```bash
//! cargo run -p presence-client --bin presence-watch -- <conversation> <self> <peer>
//! ```
//!
//! Every non-empty stdin line counts as a keystroke, an empty line as
//! "stopped typing". Peer typing changes are printed as they happen.
//! Requires `REDIS_URL`.

use anyhow::Context;
use presence_client::PresenceClient;
use presence_common::{try_init_tracing_with_config, PresenceSettings, TracingConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let settings = match PresenceSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_settings(&settings)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(settings).await {
        error!(error = %e, "presence-watch failed");
        std::process::exit(1);
    }
}

async fn run(settings: PresenceSettings) -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(conversation), Some(self_id), Some(peer_id)) = (args.next(), args.next(), args.next())
    else {
        anyhow::bail!("usage: presence-watch <conversation> <self> <peer>");
    };

    info!(env = ?settings.env, "Starting presence watcher");

    let client = PresenceClient::connect(&settings)
        .await
        .context("connecting presence transport")?;
    let channel = client
        .open(&conversation, &self_id, &peer_id)
        .await
        .context("opening presence channel")?;

    let peer = peer_id.clone();
    channel.on_remote_typing_change(move |typing| {
        if typing {
            println!("{peer} is typing...");
        } else {
            println!("{peer} stopped typing");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("reading stdin")? {
                    Some(line) if line.trim().is_empty() => {
                        channel.stop_typing().await;
                    }
                    Some(_) => {
                        channel.report_typing(true).await;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    channel.stop_typing().await;
    channel.close().await;
    info!("Presence watcher stopped");

    Ok(())
}
