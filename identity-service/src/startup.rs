//! Application startup and lifecycle management.

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ContactStoreBackend, IdentityConfig};
use crate::handlers;
use crate::services::{
    ContactStore, IdentityResolver, InMemoryContactStore, MongoDb, PgContactStore,
    RecordsRepository,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub resolver: IdentityResolver,
    pub records: RecordsRepository,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn ContactStore>, records: RecordsRepository) -> Self {
        Self {
            resolver: IdentityResolver::new(store),
            records,
            started_at: Instant::now(),
        }
    }
}

/// Every route with the service-wide middleware stack applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/identify", post(handlers::identify))
        .route("/transactions", get(handlers::list_transactions))
        .route("/invoices", get(handlers::list_invoices))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    contact_pool: Option<PgContactStore>,
}

impl Application {
    /// Connect the stores and bind the listener. Port 0 picks a free port.
    pub async fn build(config: IdentityConfig) -> Result<Self, AppError> {
        let mut contact_pool = None;
        let store: Arc<dyn ContactStore> = match config.contact_store {
            ContactStoreBackend::Postgres => {
                let pg = PgContactStore::connect(
                    config.database.url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;
                pg.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;
                contact_pool = Some(pg.clone());
                Arc::new(pg)
            }
            ContactStoreBackend::Memory => {
                tracing::warn!("Using in-memory contact store; contacts are lost on restart");
                Arc::new(InMemoryContactStore::new())
            }
        };

        let mongo = MongoDb::connect(config.mongo.uri.expose_secret(), &config.mongo.database)
            .await?;
        let state = AppState::new(store, RecordsRepository::new(mongo));

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Identity service listener bound");

        Ok(Self {
            port,
            listener,
            state,
            contact_pool,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until `shutdown` resolves, drain in-flight requests, then close
    /// the Postgres pool.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);

        tracing::info!(
            service = "identity-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        let result = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(pool) = self.contact_pool {
            pool.close().await;
        }

        result.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
