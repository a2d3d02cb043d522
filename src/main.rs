//! flintkv server entry point.
//!
//! Parses the configuration, sets up logging, creates the database set and
//! accepts connections until Ctrl+C.

use clap::Parser;
use flintkv::commands::CommandHandler;
use flintkv::config::Config;
use flintkv::connection::{handle_connection, ConnectionStats};
use flintkv::storage::{Databases, ExpiryConfig, ExpirySweeper};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
flintkv v{} - Redis-compatible key-value server
──────────────────────────────────────────────
Listening on {} ({} databases)

Use Ctrl+C to shut down.
"#,
        flintkv::VERSION,
        config.bind_address(),
        config.max_db_index + 1
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let databases = Arc::new(Databases::new(config.max_db_index));
    info!(databases = databases.len(), "Databases initialized");

    let _sweeper = config.sweep_interval().map(|interval| {
        ExpirySweeper::start(Arc::clone(&databases), ExpiryConfig { interval })
    });

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Listening");
    print_banner(&config);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&databases), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        protocol_errors = stats.protocol_errors.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Accepts connections and spawns one task per client.
async fn accept_loop(
    listener: TcpListener,
    databases: Arc<Databases>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&databases));
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
