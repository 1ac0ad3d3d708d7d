pub mod error;
pub mod orchestrator;
pub mod renderer;
pub mod routes;
pub mod templates;

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr as _;
use std::sync::Arc;
use std::time::Duration;

use quire_cache::{Cache, CacheTtls};
use quire_core::address::{default_article_relays, default_publication_relays};
use quire_relay::{RelayPool, RelayTransport, WsTransport};
use snafu::Snafu;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::predicate::SizeAbove;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::CompressionLevel;
use tracing::info;

pub const LOG_TARGET: &str = "quire::web";

/// Process-wide, overridable configuration (§6 "Configuration").
pub struct Opts {
    pub listen: String,
    pub renderer_base_url: String,
    pub ttls: CacheTtls,
    pub publication_relays: Vec<String>,
    pub article_relays: Vec<String>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8092".to_string(),
            renderer_base_url: "http://localhost:8091".to_string(),
            ttls: CacheTtls::default(),
            publication_relays: default_publication_relays(),
            article_relays: default_article_relays(),
        }
    }
}

/// Shared, process-wide state (§5 "Shared resources"): one cache, one
/// relay pool (closed exactly once on shutdown), one HTTP client for the
/// renderer and media fetches.
pub struct AppState {
    pub cache: Cache,
    pub pool: Arc<RelayPool>,
    pub transport: Arc<dyn RelayTransport>,
    pub http: reqwest::Client,
    pub renderer_base_url: String,
    pub publication_relays: Vec<String>,
    pub article_relays: Vec<String>,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Snafu)]
pub enum WebServerError {
    #[snafu(transparent)]
    Io { source: io::Error },
    ListenAddr { source: AddrParseError },
}

pub type ServerResult<T> = std::result::Result<T, WebServerError>;

pub struct Server {
    listener: TcpListener,
    state: SharedState,
}

impl Server {
    pub async fn init(opts: Opts) -> ServerResult<Self> {
        let addr = SocketAddr::from_str(&opts.listen).map_err(|source| WebServerError::ListenAddr { source })?;
        let listener = TcpListener::bind(addr).await?;
        info!(target: LOG_TARGET, addr = %listener.local_addr()?, "listening");

        let pool = Arc::new(RelayPool::new(Arc::new(WsTransport::new())));
        let state = Arc::new(AppState {
            cache: Cache::new(opts.ttls),
            pool: pool.clone(),
            transport: pool,
            http: reqwest::Client::new(),
            renderer_base_url: opts.renderer_base_url,
            publication_relays: opts.publication_relays,
            article_relays: opts.article_relays,
        });

        Ok(Self { listener, state })
    }

    pub fn addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> ServerResult<()> {
        let router = routes::router(self.state.clone())
            .layer(cors_layer())
            .layer(compression_layer());

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        self.state.pool.close_pool().await;
        Ok(())
    }
}

fn compression_layer() -> CompressionLayer<SizeAbove> {
    CompressionLayer::new()
        .quality(CompressionLevel::Precise(4))
        .compress_when(SizeAbove::new(512))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .max_age(Duration::from_secs(86400))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target: LOG_TARGET, "shutting down");
}
