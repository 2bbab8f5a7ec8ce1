//! # HTTP Server
//!
//! Combines the health and `/v1` lookup routers behind CORS and request
//! tracing, and serves them.

use std::io;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::config::HttpServerConfig;
use super::lookup_routes::{lookup_routes, LookupState};
use super::observability_routes::health_routes;
use crate::service::KvLookupService;

/// HTTP server for the lookup API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, service: KvLookupService) -> Self {
        let router = build_router(&config, service);
        Self { config, router }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the process is stopped
    pub async fn start(self) -> Result<(), io::Error> {
        let addr = self
            .config
            .bind_addr()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "kvlookup HTTP server listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// Build the combined router with all endpoints
pub fn build_router(config: &HttpServerConfig, service: KvLookupService) -> Router {
    let state = Arc::new(LookupState::new(service));

    let cors = match config.allowed_origins() {
        Ok(origins) if origins.is_empty() => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        Ok(origins) => CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
        // config validation normally stops this earlier; no cross-origin access
        Err(e) => {
            tracing::warn!(error = %e, "ignoring CORS configuration");
            CorsLayer::new()
        }
    };

    Router::new()
        .merge(health_routes())
        .nest("/v1", lookup_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
