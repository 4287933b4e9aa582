//! Relay HTTP server with axum router and graceful shutdown.

use std::collections::HashSet;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use super::handlers::{get_health, not_found, post_chat, AppState};
use crate::config::ServerSettings;
use crate::messenger::Messenger;

/// Origins of the local development front ends, always allowed.
pub const LOCAL_FRONTEND_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:5080"];

/// HTTP server relaying chat messages to the Claude CLI.
pub struct RelayServer {
    /// Server settings.
    settings: ServerSettings,
    /// Application state shared across handlers.
    state: AppState,
}

impl RelayServer {
    /// Create a server around `messenger`.
    #[must_use]
    pub fn new(messenger: Messenger, settings: ServerSettings) -> Self {
        Self {
            settings,
            state: AppState::new(messenger),
        }
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    /// Origins allowed by CORS: the local front ends, this server, and any
    /// configured extras.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        let port = self.settings.port;
        let mut origins: Vec<String> = LOCAL_FRONTEND_ORIGINS
            .iter()
            .map(ToString::to_string)
            .collect();
        origins.push(format!("http://localhost:{port}"));
        origins.push(format!("http://127.0.0.1:{port}"));
        origins.extend(self.settings.allowed_origins.iter().cloned());

        let mut seen = HashSet::new();
        origins.retain(|origin| seen.insert(origin.clone()));
        origins
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins()
            .into_iter()
            .filter_map(|origin| match HeaderValue::from_str(&origin) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/api/chat", post(post_chat))
            .route("/api/health", get(get_health))
            .fallback(not_found)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(self.cors_layer())
    }

    /// Run the server, binding to the configured address.
    ///
    /// The server runs until `shutdown` is cancelled, then cancels in-flight
    /// CLI calls and drains open connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let address = self.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::BindError {
                address: address.clone(),
                source,
            })?;

        tracing::info!(address = %address, "Starting relay server");
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop fails.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let messenger = self.state.messenger.clone();
        let app = self.build_router();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                let cancelled = messenger.shutdown();
                tracing::info!(cancelled, "Relay server shutting down gracefully");
            })
            .await
            .map_err(ServerError::Serve)
    }
}
