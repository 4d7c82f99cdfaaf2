//! Stemdeck Player - headless stem player for the analysis service
//!
//! This is the entry point for the command line player. It:
//! 1. Loads the YAML config and connects the analysis client
//! 2. Spawns the player task on the headless media backend
//! 3. Runs the requested workflow (file, separation, history)
//! 4. Reads interactive commands from stdin until `quit`
//!
//! Set RUST_LOG=debug for verbose output.

mod cli;
mod config;
mod display;
mod workflow;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

use stemdeck_client::AnalysisClient;
use stemdeck_core::config::load_config;
use stemdeck_core::engine::PlayerCommand;
use stemdeck_core::services::{spawn_headless, PlayerHandle};
use stemdeck_core::{format_time, ProgressNotice};

use cli::{Args, Input, Mode};
use config::{default_config_file, PlayerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, cli::USAGE);
            std::process::exit(2);
        }
    };
    if args.mode == Mode::Help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(default_config_file);
    let mut config: PlayerConfig = load_config(&config_path);
    config.validate();

    let client = AnalysisClient::new(config.service.clone()).context("Failed to create HTTP client")?;
    log::info!("stemdeck-player starting up (service {})", client.config().base_url);

    // One-shot service commands never start the player
    match &args.mode {
        Mode::ListHistory => return list_history(&client).await,
        Mode::Delete(filename) => {
            let resp = client
                .delete_analysis(filename)
                .await
                .with_context(|| format!("Failed to delete {}", filename))?;
            println!("{}", resp.message.unwrap_or_else(|| format!("Deleted {}", filename)));
            for item in resp.deleted_items {
                println!("  {}", item);
            }
            return Ok(());
        }
        _ => {}
    }

    match client.health().await {
        Ok(health) => log::info!("Analysis service: {}", health.status),
        Err(e) => log::warn!("Analysis service unreachable: {}", e),
    }

    let handle = spawn_headless(
        config.engine.clone(),
        Arc::new(client.clone()),
        Some(Arc::new(client.clone())),
    );
    spawn_event_printer(&handle);

    let stems = args.stems.unwrap_or(config.separation.stems_mode);
    let quality = args.quality.unwrap_or(config.separation.quality_mode);
    let commands = handle.commands();

    match args.mode.clone() {
        Mode::File { path, separate, chords } => {
            workflow::load_file(&commands, &path);
            if separate {
                let (client, commands, path) = (client.clone(), commands.clone(), path.clone());
                tokio::spawn(async move {
                    let _ = workflow::separate(&client, &commands, &path, stems, quality).await;
                });
            }
            if chords {
                let (client, commands) = (client.clone(), commands.clone());
                tokio::spawn(async move {
                    let _ = workflow::detect_chords(&client, &commands, &path).await;
                });
            }
        }
        Mode::History(filename) => {
            let (client, commands) = (client.clone(), commands.clone());
            tokio::spawn(async move {
                let _ = workflow::load_history(&client, &commands, &filename).await;
            });
        }
        _ => {}
    }

    println!("{}", cli::COMMANDS_HELP);
    command_loop(&handle).await?;
    handle.shutdown().await;
    log::info!("stemdeck-player stopped");
    Ok(())
}

async fn list_history(client: &AnalysisClient) -> Result<()> {
    let history = client.history().await.context("Failed to fetch history")?;
    if history.is_empty() {
        println!("No analyses yet");
    }
    for item in history {
        println!(
            "{:<40} {:>6}  {} stems  {} chords  {}",
            item.filename,
            format_time(item.duration),
            item.stems_count,
            item.chords_count,
            item.timestamp
        );
    }
    Ok(())
}

/// Print player events from a plain thread
fn spawn_event_printer(handle: &PlayerHandle) {
    let events = handle.events();
    let spawned = std::thread::Builder::new()
        .name("event-printer".to_string())
        .spawn(move || {
            for event in events.iter() {
                if let Some(line) = display::format_event(&event) {
                    println!("{}", line);
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("Failed to start event printer: {}", e);
    }
}

async fn command_loop(handle: &PlayerHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match cli::parse_command(&line) {
            Ok(Input::Command(cmd)) => {
                if handle.send(cmd).is_err() {
                    break;
                }
            }
            Ok(Input::Status) => {
                let (reply, rx) = oneshot::channel();
                if handle.send(PlayerCommand::Snapshot { reply }).is_err() {
                    break;
                }
                match rx.await {
                    Ok(snapshot) => println!("{}", display::format_snapshot(&snapshot)),
                    Err(_) => break,
                }
            }
            Ok(Input::Help) => println!("{}", cli::COMMANDS_HELP),
            Ok(Input::Quit) => break,
            Ok(Input::Empty) => {}
            Err(e) => {
                let _ = handle.send(PlayerCommand::Notify(ProgressNotice::failure(e.to_string())));
            }
        }
    }
    Ok(())
}
