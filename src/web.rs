use std::{
    fmt,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use anyhow::Context as _;
use axum::{extract::State, routing::get, Json, Router};
use parking_lot::RwLock;
use serde::Serialize;
use serenity::{gateway::ConnectionStage, prelude::TypeMapKey};
use tracing::info;

/// Gateway connection state as reported by `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Handshake,
    Identifying,
    Resuming,
    Connected,
    Disconnected,
}

impl From<ConnectionStage> for ConnectionStatus {
    fn from(stage: ConnectionStage) -> Self {
        match stage {
            ConnectionStage::Connected => Self::Connected,
            ConnectionStage::Handshake => Self::Handshake,
            ConnectionStage::Identifying => Self::Identifying,
            ConnectionStage::Resuming => Self::Resuming,
            ConnectionStage::Disconnected => Self::Disconnected,
            _ => Self::Connecting,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Handshake => "handshake",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// What the event handler knows about the connection, shared read-only with
/// the health server.
#[derive(Debug)]
pub struct BotStatus {
    started_at: Instant,
    guilds: AtomicUsize,
    connection: RwLock<ConnectionStatus>,
}

impl BotStatus {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            guilds: AtomicUsize::new(0),
            connection: RwLock::new(ConnectionStatus::default()),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn guilds(&self) -> usize {
        self.guilds.load(Ordering::Relaxed)
    }

    pub fn set_guilds(&self, count: usize) {
        self.guilds.store(count, Ordering::Relaxed);
    }

    pub fn connection(&self) -> ConnectionStatus {
        *self.connection.read()
    }

    pub fn set_connection(&self, status: ConnectionStatus) {
        *self.connection.write() = status;
    }
}

impl Default for BotStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMapKey for BotStatus {
    type Value = Arc<Self>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime: f64,
    pub guilds: usize,
    pub ws_status: ConnectionStatus,
}

async fn index() -> &'static str {
    "Discord Voice Bot is running! 🤖"
}

async fn health(State(status): State<Arc<BotStatus>>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        uptime: status.uptime_secs(),
        guilds: status.guilds(),
        ws_status: status.connection(),
    })
}

pub fn router(status: Arc<BotStatus>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(status)
}

pub async fn serve_health(port: u16, status: Arc<BotStatus>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health check server to {addr}"))?;
    info!("Health check server running on port {port}");
    axum::serve(listener, router(status))
        .await
        .context("Health check server stopped")
}
