//! VTmpeg playback daemon (vtmpegd) - Main entry point
//!
//! Binds the rendezvous socket, starts the playback driver and serves
//! client requests until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use vtm_common::config::{ConfigSource, ConsumptionMode, PlayerBackend};

use vtm_daemon::bridge::{ActionBridge, PlaybackAction};
use vtm_daemon::config::{Config, ConfigOverrides};
use vtm_daemon::dispatcher::Dispatcher;
use vtm_daemon::playback::{
    event_channel, EngineEventReceiver, PlaybackDriver, PlaybackEngine, ProcessEngine,
    SimulatedEngine,
};
use vtm_daemon::playlist::PlaylistStore;
use vtm_daemon::server::{ConnectionServer, SocketRendezvous};
use vtm_daemon::SharedState;

/// Log targets that follow the configured level
const LOG_TARGETS: &[&str] = &["vtmpegd", "vtm_daemon", "vtm_common"];

/// Command-line arguments for vtmpegd
#[derive(Parser, Debug)]
#[command(name = "vtmpegd")]
#[command(about = "Local video playback control daemon")]
#[command(version)]
struct Args {
    /// Configuration file (default: searched in the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rendezvous socket path
    #[arg(short, long, env = "VTMPEG_SOCKET")]
    socket: Option<PathBuf>,

    /// Keep played items queued and cycle through them
    #[arg(short = 'l', long = "loop")]
    loop_mode: bool,

    /// Use the simulated engine instead of an external player
    #[arg(long)]
    simulate: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            socket_path: self.socket.clone(),
            mode: self.loop_mode.then_some(ConsumptionMode::Loop),
            backend: self.simulate.then_some(PlayerBackend::Simulated),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;

    vtm_common::logging::init(&config.logging, LOG_TARGETS)
        .context("Failed to initialize logging")?;

    info!(
        "Starting VTmpeg daemon (vtmpegd) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config.source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Defaults => warn!("No configuration file found, using built-in defaults"),
    }
    info!(
        mode = config.mode.as_str(),
        max_queue_len = config.max_queue_len,
        backend = ?config.player.backend,
        "Configuration"
    );

    let store = Arc::new(PlaylistStore::new(config.mode, config.max_queue_len));
    let state = Arc::new(SharedState::new());
    let (bridge, actions) = ActionBridge::new(config.action_queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (listener, rendezvous) =
        SocketRendezvous::bind(&config.socket_path).context("Failed to bind control socket")?;

    let (event_tx, event_rx) = event_channel();
    let driver = match config.player.backend {
        PlayerBackend::Process => {
            let engine = ProcessEngine::new(config.player.command.clone(), event_tx)
                .context("Failed to create player engine")?;
            info!("Player command: {}", config.player.command.join(" "));
            spawn_driver(engine, &config, &store, &state, actions, event_rx, &shutdown_rx)
        }
        PlayerBackend::Simulated => {
            let engine = SimulatedEngine::new(
                config.simulated_item_duration(),
                config.about_to_finish(),
                event_tx,
            );
            info!("Using simulated playback engine");
            spawn_driver(engine, &config, &store, &state, actions, event_rx, &shutdown_rx)
        }
    };

    let dispatcher = Dispatcher::new(Arc::clone(&store), bridge, Arc::clone(&state));
    let server = ConnectionServer::new(listener, dispatcher, config.read_timeout);
    let server = tokio::spawn(server.serve(shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = server.await {
        error!("Connection server task failed: {}", e);
    }
    if let Err(e) = driver.await {
        error!("Playback driver task failed: {}", e);
    }

    let dropped = store.clear();
    if dropped > 0 {
        info!("Discarded {} queued items", dropped);
    }
    drop(rendezvous);

    info!("Goodbye.");
    Ok(())
}

fn spawn_driver<E: PlaybackEngine>(
    engine: E,
    config: &Config,
    store: &Arc<PlaylistStore>,
    state: &Arc<SharedState>,
    actions: mpsc::Receiver<PlaybackAction>,
    events: EngineEventReceiver,
    shutdown: &watch::Receiver<bool>,
) -> JoinHandle<()> {
    let driver = PlaybackDriver::new(
        engine,
        Arc::clone(store),
        Arc::clone(state),
        actions,
        events,
        config.status_interval,
    );
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        driver.run(shutdown).await;
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
