//! Claude Relay - Chat messages in, Claude CLI replies out.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_relay::config::{ConfigLoader, RelayConfig};
use claude_relay::display;
use claude_relay::messenger::{Messenger, SendOptions};
use claude_relay::server::RelayServer;

#[derive(Parser)]
#[command(
    name = "claude-relay",
    about = "Relay chat messages to the Claude CLI",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the chat HTTP API.
    Serve {
        /// Path to a config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send one message and print the reply.
    Send {
        /// The message to send.
        message: String,
        /// Continue an existing conversation.
        #[arg(short, long)]
        session_id: Option<String>,
        /// Deadline in milliseconds.
        #[arg(short, long)]
        timeout_ms: Option<u64>,
        /// Print the raw JSON reply.
        #[arg(long)]
        json: bool,
        /// Show the full message and reply without truncation.
        #[arg(long)]
        raw: bool,
        /// Path to a config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Option<RelayConfig> {
    match ConfigLoader::from_option(path).load_with_env() {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error: {e}");
            None
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn serve(config: RelayConfig) -> ExitCode {
    let messenger = Messenger::new(&config.messenger_config());
    let server = RelayServer::new(messenger, config.server);
    display::print_listening(&server.address());

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        trigger.cancel();
    });

    match server.run(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn send(
    config: &RelayConfig,
    message: String,
    options: SendOptions,
    json: bool,
    raw: bool,
) -> ExitCode {
    let messenger = Messenger::new(&config.messenger_config());

    if !json {
        display::print_request(&message, options.session_id.as_deref(), raw);
    }

    match messenger.send(message, options).await {
        Ok(reply) if json => match serde_json::to_string_pretty(&reply) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
        Ok(reply) => {
            display::print_reply(&reply, raw);
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_error(&e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve { config, host, port } => {
            let Some(mut config) = load_config(config) else {
                return ExitCode::FAILURE;
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Commands::Send {
            message,
            session_id,
            timeout_ms,
            json,
            raw,
            config,
        } => {
            let Some(config) = load_config(config) else {
                return ExitCode::FAILURE;
            };
            let mut options = SendOptions::default();
            if let Some(id) = session_id {
                options = options.session_id(id);
            }
            if let Some(ms) = timeout_ms {
                options = options.timeout(Duration::from_millis(ms));
            }
            send(&config, message, options, json, raw).await
        }
    }
}
