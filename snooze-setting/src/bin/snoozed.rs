// snoozed: background daemon owning the snooze registry
//
// Responsibilities:
// - Own the snooze registry and persist it to state.json
// - Re-assert unexpired snoozes on startup
// - Sweep for expired snoozes on a fixed interval and restore original values
// - Expose Unix socket protocol for the CLI
// - Put original values back on shutdown

use anyhow::{Context, Result};
use chrono::Utc;
use env_logger::{Builder, Env};
use snooze_setting_lib::snooze::{
    config::Config,
    notify::{applied_message, desktop_notify, restored_message},
    persistence::JsonStateFile,
    protocol::{
        deserialize_message, serialize_message, DaemonErrorCode, DaemonRequest, DaemonResponse,
        MAX_REQUEST_FRAME_SIZE, PROTOCOL_VERSION,
    },
    settings::JsonSettingsFile,
    LoadReport, SnoozeError, SnoozeRegistry, SnoozeResult,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

type LiveRegistry = SnoozeRegistry<JsonSettingsFile, JsonStateFile>;

/// Daemon state shared by the sweep task and all client connections
struct DaemonState {
    config: Config,
    /// One lock serializes sweeps and requests; each runs to completion
    registry: Mutex<LiveRegistry>,
}

impl DaemonState {
    fn new(config: Config) -> Self {
        let registry = SnoozeRegistry::new(
            JsonSettingsFile::new(&config.settings_file),
            JsonStateFile::new(config.state_file()),
        );

        Self {
            config,
            registry: Mutex::new(registry),
        }
    }

    /// Pick up persisted snoozes from a previous run
    async fn load(&self) -> SnoozeResult<LoadReport> {
        let report = self.registry.lock().await.load(Utc::now())?;

        for record in &report.reapplied {
            desktop_notify(&applied_message(record));
        }
        if !report.dropped.is_empty() {
            log::warn!(
                "Dropped {} snooze(s) that expired while the daemon was down: {}",
                report.dropped.len(),
                report.dropped.join(", ")
            );
        }

        Ok(report)
    }

    async fn sweep(&self) -> SnoozeResult<Vec<String>> {
        let removed = self.registry.lock().await.sweep(Utc::now())?;

        if !removed.is_empty() {
            let message = restored_message(&removed);
            log::info!("{}", message);
            desktop_notify(&message);
        }

        Ok(removed)
    }

    /// Best-effort restore of every live override before exit
    async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        let total = registry.len();
        let failed = registry.shutdown();

        if failed.is_empty() {
            log::info!("Restored {} snoozed setting(s) on shutdown", total);
        } else {
            log::error!(
                "Could not restore {} of {} snoozed setting(s): {}",
                failed.len(),
                total,
                failed.join(", ")
            );
        }
    }
}

/// Run the expiry sweep on the configured interval until aborted
fn spawn_sweeper(state: Arc<DaemonState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = state.sweep().await {
                log::error!("Sweep failed: {}", e);
            }
        }
    })
}

fn error_response(err: SnoozeError) -> DaemonResponse {
    let code = match &err {
        SnoozeError::UnknownKey(_) => DaemonErrorCode::UnknownKey,
        SnoozeError::InvalidValue(_) => DaemonErrorCode::InvalidValue,
        SnoozeError::InvalidDuration(_) => DaemonErrorCode::InvalidDuration,
        SnoozeError::Store(_) => DaemonErrorCode::Internal,
    };

    DaemonResponse::Error {
        code,
        message: format!("{:#}", anyhow::Error::from(err)),
    }
}

/// Handle a single client connection
async fn handle_client(
    state: Arc<DaemonState>,
    mut stream: UnixStream,
    shutdown_tx: mpsc::Sender<()>,
) -> Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            // Client disconnected
            break;
        }

        let response = if line.len() > MAX_REQUEST_FRAME_SIZE {
            DaemonResponse::Error {
                code: DaemonErrorCode::InvalidRequest,
                message: format!(
                    "Request frame too large: {} bytes (max {})",
                    line.len(),
                    MAX_REQUEST_FRAME_SIZE
                ),
            }
        } else {
            match deserialize_message::<DaemonRequest>(line.as_bytes()) {
                Ok(request) => handle_request(&state, request, &shutdown_tx).await,
                Err(e) => DaemonResponse::Error {
                    code: DaemonErrorCode::InvalidRequest,
                    message: format!("Failed to parse request: {}", e),
                },
            }
        };

        let bytes = serialize_message(&response)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Handle a single request from a client
async fn handle_request(
    state: &Arc<DaemonState>,
    request: DaemonRequest,
    shutdown_tx: &mpsc::Sender<()>,
) -> DaemonResponse {
    match request {
        DaemonRequest::Handshake { client_version } => {
            if client_version != PROTOCOL_VERSION {
                let message = if client_version < PROTOCOL_VERSION {
                    "Daemon is newer than the CLI, please update the CLI.".to_string()
                } else {
                    "Daemon is outdated, please restart it.".to_string()
                };
                return DaemonResponse::Error {
                    code: DaemonErrorCode::VersionMismatch,
                    message,
                };
            }
            DaemonResponse::Handshake {
                protocol_version: PROTOCOL_VERSION,
            }
        }

        DaemonRequest::Ping => DaemonResponse::Pong,

        DaemonRequest::Shutdown => {
            let _ = shutdown_tx.send(()).await;
            DaemonResponse::ShuttingDown
        }

        DaemonRequest::Snooze {
            key,
            value,
            minutes,
        } => {
            let mut registry = state.registry.lock().await;
            match registry.snooze_text(&key, &value, minutes, Utc::now()) {
                Ok(record) => DaemonResponse::Snoozed { record },
                Err(e) => error_response(e),
            }
        }

        DaemonRequest::List => {
            let registry = state.registry.lock().await;
            DaemonResponse::SnoozeList {
                entries: registry.list(Utc::now()).collect(),
            }
        }

        DaemonRequest::Clear => {
            let mut registry = state.registry.lock().await;
            match registry.clear() {
                Ok(restored) => DaemonResponse::Cleared { restored },
                Err(e) => error_response(e),
            }
        }
    }
}

fn init_logger() {
    // Level from RUST_LOG, default info
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logger();

    let config = Config::from_env();

    config
        .ensure_dirs()
        .context("Failed to create data directory")?;

    // Clean up stale socket if exists
    if config.socket_exists() {
        if config.is_daemon_running() {
            log::error!("Daemon already running (PID: {:?})", config.read_pid());
            std::process::exit(1);
        }
        config
            .remove_socket()
            .context("Failed to remove stale socket")?;
    }

    let state = Arc::new(DaemonState::new(config.clone()));
    let report = state.load().await.with_context(|| {
        format!(
            "Failed to load snoozes against {}",
            config.settings_file.display()
        )
    })?;

    // Written after load so a failed start leaves no PID file
    config.write_pid().context("Failed to write PID file")?;
    log::info!(
        "Loaded {} active snooze(s) from {}",
        report.reapplied.len(),
        config.state_file().display()
    );

    let listener = UnixListener::bind(&config.socket_path)
        .with_context(|| format!("Failed to bind socket: {}", config.socket_path.display()))?;

    // Owner-only access to the socket
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&config.socket_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| {
                format!(
                    "Failed to set socket permissions: {}",
                    config.socket_path.display()
                )
            })?;
    }

    log::info!(
        "Daemon listening on {} (settings: {}, sweep every {:?})",
        config.socket_path.display(),
        config.settings_file.display(),
        config.sweep_interval
    );

    let sweeper = spawn_sweeper(Arc::clone(&state));

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    // SIGINT and SIGTERM both shut down gracefully
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let terminate = signal(SignalKind::terminate());
        match terminate {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        let _ = shutdown_tx_clone.send(()).await;
    });

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let state = Arc::clone(&state);
                        let shutdown_tx = shutdown_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(state, stream, shutdown_tx).await {
                                log::warn!("Client error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        log::error!("Accept error: {}", e);
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                log::info!("Shutting down daemon...");
                break;
            }
        }
    }

    sweeper.abort();
    // Let the client that asked for shutdown flush its reply
    tokio::task::yield_now().await;
    state.shutdown().await;

    config.remove_pid().ok();
    config.remove_socket().ok();

    log::info!("Daemon stopped");
    Ok(())
}
