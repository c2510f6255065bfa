//! Tandem Node - headless session participant and relay.
//!
//! Hosts a new party session or joins an existing one and plays it on a
//! simulated output. With `--serve` it also runs the party API relay so
//! other participants on the LAN can use this node as their session store.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tandem_core::{
    bootstrap_services, bootstrap_services_with_store, start_server, LoggingEventEmitter,
    MemorySessionStore, NoticeEvent, RelayState, SessionEvent, SessionHandle, TrackCandidate,
};
use tokio::signal;

use crate::config::NodeConfig;

/// Tandem Node - shared party playback without a UI.
#[derive(Parser, Debug)]
#[command(name = "tandem-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "TANDEM_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Party API base URL (overrides config file).
    #[arg(long, env = "TANDEM_STORE_URL")]
    store_url: Option<String>,

    /// Streaming API base URL (overrides config file).
    #[arg(long, env = "TANDEM_CONTENT_URL")]
    content_url: Option<String>,

    /// Join this session as a guest instead of hosting.
    #[arg(short, long, value_name = "SESSION_ID")]
    join: Option<String>,

    /// Host code to elevate with after joining.
    #[arg(long, requires = "join")]
    elevate: Option<String>,

    /// Content ids to queue after hosting.
    #[arg(long = "add", value_name = "ID", conflicts_with = "join")]
    add: Vec<String>,

    /// Serve the party API relay from this process.
    #[arg(short, long)]
    serve: bool,

    /// Relay port (overrides config file).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Only run the relay; start no session.
    #[arg(long, requires = "serve")]
    relay_only: bool,

    /// Disable endless mode for hosted sessions.
    #[arg(long)]
    no_auto_continue: bool,

    /// Data directory for the replay snapshot.
    #[arg(short = 'd', long, env = "TANDEM_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Tandem Node v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        NodeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(url) = args.store_url {
        config.store_url = url;
    }
    if let Some(url) = args.content_url {
        config.content_url = url;
    }
    if args.serve {
        config.serve = true;
    }
    if let Some(port) = args.port {
        config.relay_port = port;
    }
    if args.no_auto_continue {
        config.auto_continue = false;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    match config.data_dir {
        Some(ref dir) => log::info!("Using data directory: {}", dir.display()),
        None => log::info!("No data directory configured - replay is disabled"),
    }

    // Bootstrap services; a serving node keeps its sessions in-process
    let core_config = config.to_core_config();
    let relay_store = config.serve.then(|| Arc::new(MemorySessionStore::new()));
    let services = match &relay_store {
        Some(store) => bootstrap_services_with_store(&core_config, Arc::clone(store) as _),
        None => bootstrap_services(&core_config),
    }
    .context("Failed to bootstrap services")?;

    services
        .event_bridge
        .set_external_emitter(Arc::new(LoggingEventEmitter));

    log::info!("Services bootstrapped successfully");

    if let Some(store) = relay_store {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.relay_port));
        start_server(RelayState::new(store), addr, services.cancel_token.clone())
            .await
            .context("Failed to start relay")?;
    }

    // Start the session
    let mut hosting = false;
    let session: Option<SessionHandle> = if args.relay_only {
        None
    } else if let Some(session_id) = args.join.as_deref() {
        let handle = services
            .join(session_id)
            .await
            .with_context(|| format!("Failed to join session {}", session_id))?;
        log::info!("Joined session {}", handle.session_id());

        if let Some(code) = args.elevate.as_deref() {
            handle.elevate(code).await.context("Elevation refused")?;
            hosting = true;
            log::info!("Elevated to host");
        }
        Some(handle)
    } else {
        let hosted = services.host().await.context("Failed to create session")?;
        hosting = true;
        log::info!(
            "Hosting session {} (host code {})",
            hosted.handle.session_id(),
            hosted.credential
        );

        for id in &args.add {
            hosted
                .handle
                .add(TrackCandidate::new(id.as_str(), id.as_str(), "Unknown Artist"))
                .await
                .with_context(|| format!("Failed to queue {}", id))?;
        }
        Some(hosted.handle)
    };

    // Surface notices at info level; everything else stays at debug
    if let Some(handle) = &session {
        let mut events = Box::pin(handle.event_stream());
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let SessionEvent::Notice(notice) = event {
                    report_notice(&notice);
                }
            }
        });
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    if let Some(handle) = session {
        if hosting {
            if let Err(e) = handle.end().await {
                log::warn!("Failed to end session: {}", e);
            }
        }
        handle.shutdown().await;
    }

    // Graceful shutdown (also stops the relay)
    services.shutdown();

    log::info!("Shutdown complete");
    Ok(())
}

fn report_notice(notice: &NoticeEvent) {
    match notice {
        NoticeEvent::SessionEnded { session_id, .. } => {
            log::info!("Session {} was ended by the host", session_id)
        }
        NoticeEvent::PlaybackFailed {
            external_id,
            message,
            ..
        } => log::warn!("Cannot play {}: {} (skipping)", external_id, message),
        NoticeEvent::QueueExhausted { .. } => log::info!("Queue finished"),
        NoticeEvent::SessionLocked { .. } => log::info!("Session is locked by the host"),
        other => log::info!("{:?}", other),
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
