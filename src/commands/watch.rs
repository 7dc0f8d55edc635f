//! Watch command implementation.
//!
//! Streams connection snapshots into the store, renders the table on an
//! interval and optionally serves the HTTP endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use lightsocks_monitor::{ConnectionStore, EventKind, SettingsStore, Snapshot, StreamReader};
use prometheus::{Gauge, Registry};
use std::io::Write as IoWrite;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::commands::shutdown_signal;
use crate::config::{Config, DEFAULT_BIND_ADDR, DEFAULT_LISTEN_PORT};
use crate::handlers::{
    clear_closed_handler, connection_handler, connections_handler, health_handler,
    metrics_handler, root_handler, toggle_keep_closed_handler,
};
use crate::metrics::MonitorMetrics;
use crate::render::{render_view, RowFilter};
use crate::state::{AppState, SharedState};

/// Presentation options for the watch command.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub filter: RowFilter,
    /// Print each new view as one JSON line.
    pub json: bool,
    /// Render nothing.
    pub quiet: bool,
}

#[cfg(unix)]
type ToggleSignal = Option<tokio::signal::unix::Signal>;
#[cfg(not(unix))]
type ToggleSignal = Option<()>;

/// SIGUSR1 flips the keep-closed preference while watching.
#[cfg(unix)]
fn toggle_signal() -> ToggleSignal {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::user_defined1()) {
        Ok(sig) => Some(sig),
        Err(e) => {
            warn!("Failed to install SIGUSR1 handler: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn toggle_signal() -> ToggleSignal {
    None
}

async fn toggle_requested(sig: &mut ToggleSignal) {
    match sig {
        #[cfg(unix)]
        Some(sig) => {
            if sig.recv().await.is_some() {
                return;
            }
            std::future::pending::<()>().await
        }
        _ => std::future::pending::<()>().await,
    }
}

/// Builds the HTTP router served next to the terminal view.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/connections", get(connections_handler))
        .route("/connections/closed", delete(clear_closed_handler))
        .route("/connections/{id}", get(connection_handler))
        .route("/keep-closed", post(toggle_keep_closed_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Runs the live connection view until SIGINT/SIGTERM.
#[instrument(skip(config, options))]
pub async fn command_watch(
    config: Config,
    options: WatchOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    let endpoint = config.endpoint();
    let address = endpoint.connections_url(config.snapshot_interval_ms)?;

    let settings_path = config.settings_path();
    debug!("Using settings file {}", settings_path.display());
    let settings = Arc::new(SettingsStore::load_or_default(settings_path));
    let store = Arc::new(ConnectionStore::new(settings));

    let reader: Arc<StreamReader<Snapshot>> =
        Arc::new(StreamReader::new("connections", config.stream.clone()));

    let sink = Arc::clone(&store);
    reader.on_data(move |snapshot| {
        sink.feed(snapshot);
    });
    let restarts = Arc::clone(&store);
    reader.subscribe(EventKind::Reconnect, move |_| restarts.note_stream_restart());
    reader.subscribe(EventKind::Close, |_| {
        debug!("Connection stream closed, waiting to reconnect");
    });

    // The address carries the secret; log host and port only
    info!(
        "Streaming connections from {}:{}",
        endpoint.host, endpoint.port
    );
    reader.connect(&address);

    let registry = Registry::new();
    let metrics = MonitorMetrics::new(&registry)?;
    let scrape_duration = Gauge::new(
        "lightsocks_monitor_scrape_duration_seconds",
        "Time spent serving /metrics request",
    )?;
    registry.register(Box::new(scrape_duration.clone()))?;

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        store: Arc::clone(&store),
        reader: Arc::clone(&reader),
        registry,
        metrics,
        scrape_duration,
        http_requests: AtomicU64::new(0),
        start_time: Instant::now(),
    });

    let server = if config.enable_http.unwrap_or(false) {
        let ip: IpAddr = config
            .bind
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()?;
        let addr = SocketAddr::new(ip, config.listen_port.unwrap_or(DEFAULT_LISTEN_PORT));
        let listener = TcpListener::bind(addr).await?;
        info!("lightsocks-monitor listening on http://{}", addr);

        let app = build_router(Arc::clone(&state));
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Server error: {}", e);
            }
        }))
    } else {
        None
    };

    let mut ticker = tokio::time::interval(config.render_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut toggle = toggle_signal();
    let mut last_revision = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = toggle_requested(&mut toggle) => {
                let keep = store.toggle_save();
                info!("Keep closed connections: {}", if keep { "on" } else { "off" });
            }
            _ = ticker.tick() => {
                if options.quiet {
                    continue;
                }
                let view = store.view();
                if options.json {
                    if last_revision != Some(view.revision) {
                        println!("{}", serde_json::to_string(&*view)?);
                        last_revision = Some(view.revision);
                    }
                } else {
                    let mut stdout = std::io::stdout().lock();
                    write!(
                        stdout,
                        "\x1B[2J\x1B[H{}\nCtrl+C to quit",
                        render_view(&view, &options.filter, Utc::now())
                    )?;
                    #[cfg(unix)]
                    write!(stdout, " | kill -USR1 {} to toggle keep-closed", std::process::id())?;
                    writeln!(stdout)?;
                    stdout.flush()?;
                }
            }
        }
    }

    reader.destroy();
    if let Some(server) = server {
        server.abort();
    }
    info!("lightsocks-monitor stopped gracefully");
    Ok(())
}
