//! copilot-bridge: command-line host for the Copilot conversation bridge.
//!
//! Loads the TOML config, initializes logging, builds the bridge and runs
//! one subcommand. All conversation state lives in this process and is
//! gone when it exits.

mod cli;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use copilot_common::{BridgeEvent, ConfigError, ConversationId};
use copilot_config::{config_to_json, toml_loader, BridgeConfig};
use copilot_core::{BridgeError, CopilotBridge};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Command;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let strict = !matches!(args.command, Command::Config);
    let config = match load(args.config.as_deref(), strict) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let directive = args
        .log_level
        .as_deref()
        .map(cli::log_directive)
        .unwrap_or_else(|| config.logging.directive());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Command::Config = args.command {
        println!("{}", config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    let bridge = match CopilotBridge::from_config(&config) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(error = %e, "failed to start bridge");
            eprintln!("error: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };
    spawn_event_logger(bridge.subscribe());

    let result = match args.command {
        Command::Ask { conversation, text } => {
            ask(&bridge, conversation_id(conversation), &text.join(" ")).await
        }
        Command::Chat { conversation } => chat(&bridge, conversation_id(conversation)).await,
        Command::Test => test(&bridge).await,
        Command::Config => Ok(()),
    };

    bridge.shutdown().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(category = ?e.category(), error = %e, "request failed");
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Strict loading requires a usable personal token; `config` only needs
/// something to print.
fn load(path: Option<&str>, strict: bool) -> Result<BridgeConfig, ConfigError> {
    match (path, strict) {
        (Some(path), true) => copilot_config::load_config_from(Path::new(path)),
        (None, true) => copilot_config::load_config(),
        (path, false) => {
            let mut config = match path {
                Some(path) => toml_loader::load_from_path(Path::new(path))?,
                None => toml_loader::load_default()?,
            };
            toml_loader::apply_env_overrides(&mut config);
            Ok(config)
        }
    }
}

fn conversation_id(requested: Option<String>) -> ConversationId {
    requested.map(ConversationId::from).unwrap_or_default()
}

fn spawn_event_logger(mut events: broadcast::Receiver<BridgeEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BridgeEvent::SupervisorFailed(reason)) => {
                    error!(%reason, "local server is down for good; fix the cause and restart");
                }
                Ok(event) => debug!(?event, "bridge event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn ask(bridge: &CopilotBridge, id: ConversationId, text: &str) -> Result<(), BridgeError> {
    let reply = bridge.process(&id, text).await?;
    println!("{reply}");
    info!(conversation_id = %id, "conversation id");
    Ok(())
}

async fn test(bridge: &CopilotBridge) -> Result<(), BridgeError> {
    bridge.test_connection().await?;
    println!("connection ok (model {})", bridge.settings().model);
    Ok(())
}

async fn chat(bridge: &CopilotBridge, mut id: ConversationId) -> Result<(), BridgeError> {
    println!("conversation {id}. /reset starts over, /usage shows tokens, /quit exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                bridge.reset(&id);
                id = ConversationId::new();
                println!("new conversation {id}");
            }
            "/usage" => {
                let usage = bridge.usage();
                println!(
                    "{} calls, {} prompt + {} completion tokens",
                    usage.call_count(),
                    usage.total().input_tokens,
                    usage.total().output_tokens
                );
            }
            text => match bridge.process(&id, text).await {
                Ok(reply) => println!("{reply}"),
                // One failed turn does not end the session.
                Err(e) => {
                    warn!(category = ?e.category(), error = %e, "turn failed");
                    println!("[{}]", e.user_message());
                    if matches!(e, BridgeError::ProcessSupervision(_)) {
                        return Err(e);
                    }
                }
            },
        }
    }

    Ok(())
}
