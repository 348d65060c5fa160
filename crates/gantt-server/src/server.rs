use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use gantt_engine::Orchestrator;
use gantt_settings::ServerSettings;

use crate::client::{self, ClientRegistry};
use crate::error::ServerError;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub client_registry: Arc<ClientRegistry>,
    pub started_at: Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, settings: &ServerSettings) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(&settings.static_dir))
        .with_state(state)
        .layer(cors_layer(&settings.frontend_origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(origin, "invalid frontend origin, cross-origin requests disabled");
            layer
        }
    }
}

/// Bind and start serving. Returns once the listener is up.
pub async fn start(
    settings: &ServerSettings,
    orchestrator: Arc<Orchestrator>,
) -> Result<ServerHandle, ServerError> {
    let client_registry = Arc::new(ClientRegistry::new(settings.max_send_queue));
    let state = AppState {
        orchestrator,
        client_registry: Arc::clone(&client_registry),
        started_at: Instant::now(),
    };
    let router = build_router(state, settings);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    info!(addr = %local_addr, static_dir = %settings.static_dir, "server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server stopped");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        client_registry,
        server,
    })
}

/// Handle returned by `start()`; the server runs until it is shut down or
/// the runtime exits.
pub struct ServerHandle {
    pub port: u16,
    client_registry: Arc<ClientRegistry>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn connection_count(&self) -> usize {
        self.client_registry.count()
    }

    pub fn shutdown(self) {
        self.server.abort();
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client, rx) = state.client_registry.register();
    state.orchestrator.open_connection(&client.id);
    info!(connection_id = %client.id, "client connected");

    client::handle_ws_connection(
        socket,
        client,
        rx,
        state.client_registry,
        state.orchestrator,
    )
    .await;
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let orchestrator = &state.orchestrator;
    Json(json!({
        "status": "ok",
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "connections": state.client_registry.count(),
        "histories": orchestrator.store().len(),
        "catalogVersion": orchestrator.catalog().version(),
        "usage": orchestrator.usage().snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use gantt_core::Catalog;
    use gantt_engine::ConversationStore;
    use gantt_llm::MockGateway;
    use gantt_settings::OrchestratorSettings;
    use gantt_telemetry::UsageLedger;

    fn orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Arc::new(MockGateway::new(vec![])),
            Arc::new(Catalog::builtin().unwrap()),
            Arc::new(ConversationStore::new()),
            Arc::new(UsageLedger::new()),
            OrchestratorSettings::default(),
            Duration::from_secs(5),
        ))
    }

    fn local_settings(static_dir: &str) -> ServerSettings {
        ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: static_dir.into(),
            ..ServerSettings::default()
        }
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let handle = start(&local_settings("/nonexistent"), orchestrator())
            .await
            .unwrap();
        assert_ne!(handle.port, 0);

        let body: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/health", handle.port))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["histories"], 0);
        assert_eq!(body["catalogVersion"], "1.0.0");
        assert_eq!(body["usage"]["requests"], 0);

        handle.shutdown();
    }

    #[tokio::test]
    async fn serves_static_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>gantt</h1>").unwrap();

        let handle = start(&local_settings(dir.path().to_str().unwrap()), orchestrator())
            .await
            .unwrap();
        let base = format!("http://127.0.0.1:{}", handle.port);

        let page = reqwest::get(format!("{base}/index.html")).await.unwrap();
        assert_eq!(page.status(), 200);
        assert_eq!(page.text().await.unwrap(), "<h1>gantt</h1>");

        let missing = reqwest::get(format!("{base}/nope.js")).await.unwrap();
        assert_eq!(missing.status(), 404);

        handle.shutdown();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = start(&local_settings("/nonexistent"), orchestrator())
            .await
            .unwrap();
        let taken = ServerSettings {
            port: first.port,
            ..local_settings("/nonexistent")
        };
        let err = start(&taken, orchestrator()).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
        first.shutdown();
    }

    #[test]
    fn cors_accepts_configured_origin() {
        // Construction must not panic for either a valid or an invalid origin.
        let _ = cors_layer("http://localhost:3000");
        let _ = cors_layer("not a header\n");
    }
}
