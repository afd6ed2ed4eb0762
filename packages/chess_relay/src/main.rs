use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod game;
mod handlers;
mod metrics;
#[cfg(test)]
mod test_helpers;
mod ws;

use crate::config::{FileConfig, ServerConfig};
use crate::game::SessionRegistry;
use crate::metrics::ServerMetrics;
use crate::ws::ConnectionRouter;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "chess-relay")]
#[command(about = "Pairs WebSocket clients into two-player chess games and relays their moves")]
struct Cli {
    /// Config file (defaults to ~/.chess-relay/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the web server (overrides config, 0 = auto-select)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub router: Arc<ConnectionRouter>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
    /// Server runtime configuration
    pub server_config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(server_config: ServerConfig) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        let registry = Arc::new(SessionRegistry::new());
        Self {
            router: Arc::new(ConnectionRouter::new(registry, metrics.clone())),
            metrics,
            server_config: Arc::new(server_config),
        }
    }
}

/// All HTTP and WebSocket routes.
pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handlers::game_websocket_handler))
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "chess_relay=debug,position_engine=debug,tower_http=debug,info"
    } else {
        "chess_relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config_path = cli.config.clone().or_else(config::default_config_path);
    if let Some(path) = cli.config.as_ref().filter(|p| !p.exists()) {
        warn!("Config file {} not found, using defaults", path.display());
    }
    let mut file_config: FileConfig = config::load_config(config_path.as_deref())
        .extract()
        .context("Failed to load configuration")?;

    // CLI flags win over file and env
    if let Some(host) = cli.host {
        file_config.server.host = host;
    }
    if let Some(port) = cli.port {
        file_config.server.port = port;
    }
    let server_config = ServerConfig::from_file(&file_config);

    run_server(server_config).await
}

async fn run_server(server_config: ServerConfig) -> Result<()> {
    info!("Starting chess relay");

    let addr = server_config.bind_addr()?;
    let sweep_interval = server_config.sessions.sweep_interval;
    let state = AppState::new(server_config);

    // Spawn periodic sweep of games nobody is seated in
    if let Some(interval) = sweep_interval {
        let router = state.router.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                router.sweep().await;
            }
        });
    } else {
        info!("Empty-game sweep disabled");
    }

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Chess relay listening on http://{}", actual_addr);
    info!("  GET /ws           - Game WebSocket");
    info!("  GET /health       - Server health");
    info!("  GET /metrics      - Server metrics");

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Chess relay stopped");
    Ok(())
}
