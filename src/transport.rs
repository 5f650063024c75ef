//! HTTP transport: one axum endpoint carrying MCP's streamable HTTP protocol,
//! plus health and tool catalog routes that work without a GitHub token.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use futures::StreamExt;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::server::McpGithubServer;

/// Request bodies above this size are treated as absent.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

type McpService = StreamableHttpService<McpGithubServer, LocalSessionManager>;

#[derive(Clone)]
struct AppState {
    mcp: McpService,
}

// -- Connection lifecycle --

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    SessionOpen,
    Dispatching,
    ResponseSent,
    Closed,
}

impl ConnectionState {
    /// `Closed` is terminal and reachable from every other state.
    pub fn can_advance_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, SessionOpen) | (SessionOpen, Dispatching) | (Dispatching, ResponseSent) => true,
            _ => false,
        }
    }
}

/// Tracks one inbound request through its states. It is moved into the
/// response body stream, next to the per-request protocol session's output,
/// so it is dropped when that stream is: after the last frame, on a stream
/// error, or when the client goes away mid-flight. Dropping it records the
/// `Closed` transition.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    id: u64,
    state: ConnectionState,
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            state: ConnectionState::Idle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`. Returns false and keeps the current state when the
    /// transition is not allowed.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::debug!(
                connection = self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring invalid connection transition"
            );
            return false;
        }
        tracing::trace!(
            connection = self.id,
            from = ?self.state,
            to = ?next,
            "Connection transition"
        );
        self.state = next;
        true
    }
}

impl Drop for ConnectionLifecycle {
    fn drop(&mut self) {
        let last = self.state;
        if self.advance(ConnectionState::Closed) {
            tracing::debug!(connection = self.id, last_state = ?last, "Connection closed");
        }
    }
}

// -- Router --

/// Build the HTTP router. Every MCP request runs its own protocol session,
/// which ends together with the response stream.
pub fn router(server: McpGithubServer) -> Router {
    let mcp = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );

    Router::new()
        .route("/mcp", any(mcp_endpoint))
        .route("/health", get(health_check))
        .route("/tools", get(list_tools))
        .with_state(AppState { mcp })
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(server: McpGithubServer, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Pass a different --bind address.",
                bind
            )
        }
        Err(e) => return Err(e.into()),
    };
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "MCP endpoint listening on http://{}/mcp", addr);

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutting down");
}

// -- Handlers --

/// Parse a request body as JSON. Absent, blank, or malformed bodies are `None`.
pub fn parse_payload(bytes: &[u8]) -> Option<serde_json::Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

async fn read_payload(connection: u64, body: Body) -> Option<Bytes> {
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(connection, error = %e, "Could not read request body");
            return None;
        }
    };
    match parse_payload(&bytes) {
        Some(payload) => {
            tracing::debug!(
                connection,
                method = payload.get("method").and_then(|m| m.as_str()).unwrap_or("-"),
                "MCP message received"
            );
            Some(bytes)
        }
        None => {
            tracing::debug!(
                connection,
                len = bytes.len(),
                "Request body is not JSON, continuing without payload"
            );
            None
        }
    }
}

async fn mcp_endpoint(State(state): State<AppState>, request: Request) -> Response {
    let mut lifecycle = ConnectionLifecycle::new();
    lifecycle.advance(ConnectionState::SessionOpen);

    let (parts, body) = request.into_parts();
    let body = if parts.method == Method::POST {
        match read_payload(lifecycle.id(), body).await {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        }
    } else {
        body
    };

    lifecycle.advance(ConnectionState::Dispatching);
    let response = match state.mcp.oneshot(Request::from_parts(parts, body)).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    lifecycle.advance(ConnectionState::ResponseSent);

    // The lifecycle rides along with the body so the connection is closed
    // once the stream ends or the client disconnects.
    let (parts, body) = response.into_parts();
    let stream = Body::new(body).into_data_stream().map(move |chunk| {
        if let Err(ref e) = chunk {
            tracing::warn!(
                connection = lifecycle.id(),
                error = %e,
                "Response stream failed after headers were sent"
            );
        }
        chunk
    });
    Response::from_parts(parts, Body::from_stream(stream))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "github-mcp",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Serialize)]
struct ToolsResponse {
    tools: Vec<rmcp::model::Tool>,
}

async fn list_tools() -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: McpGithubServer::tool_catalog(),
    })
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "Request handler panicked");
    internal_error_response("Internal server error")
}

fn internal_error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
