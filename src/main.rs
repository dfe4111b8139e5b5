//! Volume Dial simulator
//!
//! Drives a single dial from stdin and writes every frame it pushes to
//! `<output_dir>/volume-dial.png` (and `.title`). One command per line:
//!
//! ```text
//! +3 / -2              rotate by that many detents
//! press                toggle mute
//! volume 35 [muted]    report a backend volume change on the bus
//! settings {"step":5}  deliver new action settings (JSON)
//! hide / show          disappear / re-appear
//! quit
//! ```

use volume_dial::{bus, config, dial};

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dial::{DialSettings, DialSurface, DirectorySurface, FrameRenderer};

const ACTION_ID: &str = "volume-dial";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Rotate(i32),
    Press,
    Volume { volume: f64, muted: bool },
    Settings(DialSettings),
    Hide,
    Show,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match word {
        "press" => Ok(Command::Press),
        "hide" => Ok(Command::Hide),
        "show" => Ok(Command::Show),
        "quit" | "exit" => Ok(Command::Quit),
        "volume" => {
            let mut args = rest.split_whitespace();
            let volume = args
                .next()
                .ok_or_else(|| anyhow!("usage: volume <0-100> [muted]"))?
                .parse::<f64>()?;
            let muted = match args.next() {
                None => false,
                Some("muted") => true,
                Some(other) => bail!("unexpected argument: {}", other),
            };
            Ok(Command::Volume { volume, muted })
        }
        "settings" => {
            let value: serde_json::Value = serde_json::from_str(rest)?;
            Ok(Command::Settings(DialSettings::from_json(&value)))
        }
        w if w.starts_with('+') || w.starts_with('-') => Ok(Command::Rotate(w.parse()?)),
        "" => bail!("empty command"),
        other => bail!("unknown command: {}", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volume_dial=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Volume Dial v{} ({})",
        env!("VOLDIAL_VERSION"),
        env!("VOLDIAL_GIT_SHA")
    );

    let config = config::load_config()?;
    tracing::info!(
        "Configuration loaded, writing frames to {}",
        config.output_dir.display()
    );

    let shutdown = CancellationToken::new();
    let bus = bus::create_bus();
    let renderer = Arc::new(FrameRenderer::new());
    let (handle, task) = dial::spawn(&config.dial, renderer, Some(&*bus), shutdown.clone());

    let surface: Arc<dyn DialSurface> =
        Arc::new(DirectorySurface::new(ACTION_ID, config.output_dir.clone()));
    let mut settings = DialSettings::default();
    handle.will_appear(surface.clone(), settings.clone()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        let line = tokio::select! {
            _ = &mut signal => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("{}", e);
                continue;
            }
        };

        match command {
            Command::Rotate(ticks) => handle.rotate(surface.clone(), ticks).await?,
            Command::Press => handle.press(surface.clone()).await?,
            Command::Volume { volume, muted } => {
                if bus.publish(volume, muted) == 0 {
                    tracing::warn!("No dial is listening for volume changes");
                }
            }
            Command::Settings(new_settings) => {
                settings = new_settings;
                handle.settings_changed(settings.clone()).await?;
            }
            Command::Hide => handle.will_disappear().await?,
            Command::Show => handle.will_appear(surface.clone(), settings.clone()).await?,
            Command::Quit => break,
        }
    }

    tracing::info!("Shutting down...");
    shutdown.cancel();
    task.await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
