//! HTTP transport for MCP server.
//!
//! `POST /mcp` carries one JSON-RPC message per request; `GET /health` is a
//! liveness probe. Requests are forwarded to the server's dispatcher over a
//! channel.

use crate::error::McpError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, error_codes};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Reply slot for one forwarded request. `None` means the request was a
/// notification.
pub type ResponseSender = oneshot::Sender<Option<JsonRpcResponse>>;

/// Channel into the server's dispatcher.
pub type RequestSender = mpsc::Sender<(JsonRpcRequest, ResponseSender)>;

/// HTTP transport handler state.
pub struct HttpTransportState {
    request_tx: RequestSender,
}

impl HttpTransportState {
    pub fn new(request_tx: RequestSender) -> Self {
        Self { request_tx }
    }
}

/// Create the HTTP router for MCP.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let id = request.id.clone();
    let (response_tx, response_rx) = oneshot::channel();

    if state.request_tx.send((request, response_tx)).await.is_err() {
        return unavailable(id, "MCP server unavailable");
    }

    match response_rx.await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(_) => unavailable(id, "No response from MCP server"),
    }
}

fn unavailable(id: Option<serde_json::Value>, message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, message)),
    )
        .into_response()
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sqlgate",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    bind_address: String,
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    pub fn new(bind_address: impl Into<String>, request_tx: RequestSender) -> Self {
        Self {
            bind_address: bind_address.into(),
            state: Arc::new(HttpTransportState::new(request_tx)),
        }
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .map_err(|e| {
                McpError::StartupFailed(format!("Failed to bind to {}: {}", self.bind_address, e))
            })?;

        tracing::info!(address = %self.bind_address, "MCP HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| McpError::Internal(e.into()))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
