//! Chatwire CLI - line-oriented client for a streaming chat backend.
//!
//! This is the main binary entry point. See the `chatwire` library for the
//! session controller.

use anyhow::Result;
use chatwire::{
    Config, ConnectionState, SessionController, SessionUpdate, SubmitOutcome, WsTransportFactory,
};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "chatwire")]
#[command(version)]
#[command(about = "Real-time chat client with automatic reconnection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and chat. Each stdin line is submitted; `/clear`, `/log` and `/quit` are local.
    Chat {
        /// Session endpoint (overrides config)
        #[arg(long)]
        endpoint: Option<String>,
        /// Reconnect delay in milliseconds (overrides config)
        #[arg(long)]
        reconnect_delay_ms: Option<u64>,
        /// Stop after this many consecutive failed attempts (overrides config)
        #[arg(long)]
        max_reconnects: Option<u32>,
        /// Print log entries as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show or change configuration
    Config {
        /// Setting to read or write
        key: Option<String>,
        /// New value
        value: Option<String>,
    },
}

/// Local commands typed at the prompt.
enum LocalCommand<'a> {
    Clear,
    Log,
    Quit,
    Submit(&'a str),
}

fn parse_line(line: &str) -> LocalCommand<'_> {
    match line.trim() {
        "/clear" => LocalCommand::Clear,
        "/log" => LocalCommand::Log,
        "/quit" | "/exit" => LocalCommand::Quit,
        _ => LocalCommand::Submit(line),
    }
}

fn print_update(update: &SessionUpdate, json: bool) -> Result<()> {
    match update {
        SessionUpdate::Appended(entry) if json => println!("{}", serde_json::to_string(entry)?),
        SessionUpdate::Appended(entry) => println!("{}", entry.event),
        SessionUpdate::Cleared => println!("-- log cleared --"),
        SessionUpdate::StateChanged(state) => {
            log::info!("Connection {}", state);
            if let ConnectionState::Open { .. } = state {
                eprintln!("-- connected --");
            }
        }
    }
    Ok(())
}

/// Run one chat session until EOF, `/quit` or Ctrl-C.
async fn run_chat(config: Config, json: bool) -> Result<()> {
    let endpoint = config.ws_endpoint();
    let mut controller =
        SessionController::new(endpoint.clone(), WsTransportFactory::new(), config.reconnect_policy());
    let mut updates = controller.subscribe();

    log::info!("Session {} starting against {}", controller.id(), endpoint);
    eprintln!("Connecting to {endpoint}... (/clear, /log, /quit)");
    controller.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            alive = controller.pump() => {
                if !alive {
                    break;
                }
            }
            Some(update) = updates.recv() => {
                print_update(&update, json)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    LocalCommand::Clear => controller.clear(),
                    LocalCommand::Log => {
                        for entry in controller.log() {
                            println!("{}", entry.event);
                        }
                    }
                    LocalCommand::Quit => break,
                    LocalCommand::Submit(text) => {
                        if let SubmitOutcome::SendFailed(e) = controller.submit(text) {
                            log::warn!("Submit failed: {}", e);
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    controller.dispose();
    // Flush whatever the last handled input produced.
    for update in updates.drain() {
        print_update(&update, json)?;
    }
    eprintln!("Bye.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the conversation; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            endpoint,
            reconnect_delay_ms,
            max_reconnects,
            json,
        } => {
            let mut config = Config::load()?;
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(ms) = reconnect_delay_ms {
                config.reconnect_delay_ms = ms;
            }
            if max_reconnects.is_some() {
                config.max_reconnect_attempts = max_reconnects;
            }
            run_chat(config, json).await?;
        }
        Commands::Config { key, value } => {
            let mut config = Config::load()?;
            match (key, value) {
                (None, _) => println!("{}", serde_json::to_string_pretty(&config)?),
                (Some(k), None) => match config.get(&k) {
                    Some(v) => println!("{v}"),
                    None => anyhow::bail!("Unknown config key: {k}"),
                },
                (Some(k), Some(v)) => {
                    config.set(&k, &v)?;
                    config.save()?;
                    println!("{k} = {}", config.get(&k).unwrap_or_default());
                }
            }
        }
    }

    Ok(())
}
