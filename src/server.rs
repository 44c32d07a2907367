//! HTTP status and control API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/status` | Integration stats and whether the watcher runs |
//! | `GET`  | `/api/files` | Integrated files |
//! | `POST` | `/api/scan` | Run one pass now |
//! | `POST` | `/api/command` | Dispatch a shell command: `{"command": "emails"}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "unknown command: 'x'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `scan_failed` (503), `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::commands::{Command, CommandOutput};
use crate::integrator::Integrator;
use crate::models::{FileEntry, ScanResult, Stats};
use crate::watcher::Watcher;

/// Shared application state, built once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub integrator: Arc<Integrator>,
    pub watcher: Arc<Watcher>,
}

impl AppState {
    pub fn new(watcher: Arc<Watcher>) -> Self {
        Self {
            integrator: watcher.integrator().clone(),
            watcher,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/status", get(handle_status))
        .route("/api/files", get(handle_files))
        .route("/api/scan", post(handle_scan))
        .route("/api/command", post(handle_command))
        .layer(cors)
        .with_state(state)
}

/// Binds `bind` and serves until `shutdown` resolves.
pub async fn run_server(
    bind: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "status API listening");
    println!("Status API listening on http://{}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn scan_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "scan_failed",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    stats: Stats,
    running: bool,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        stats: state.integrator.stats(),
        running: state.watcher.is_running(),
    })
}

#[derive(Serialize)]
struct FileItem {
    relative_path: String,
    #[serde(flatten)]
    entry: FileEntry,
}

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<FileItem>,
}

async fn handle_files(State(state): State<AppState>) -> Json<FilesResponse> {
    let files = state
        .integrator
        .entries()
        .into_iter()
        .map(|(relative_path, entry)| FileItem {
            relative_path,
            entry,
        })
        .collect();
    Json(FilesResponse { files })
}

async fn handle_scan(State(state): State<AppState>) -> Result<Json<ScanResult>, AppError> {
    let integrator = state.integrator.clone();
    let result = tokio::task::spawn_blocking(move || integrator.scan_once())
        .await
        .map_err(|e| internal(e.to_string()))?
        .map_err(|e| scan_failed(e.to_string()))?;
    Ok(Json(result))
}

#[derive(Deserialize)]
struct CommandRequest {
    command: String,
}

#[derive(Serialize)]
struct CommandResponse {
    command: String,
    result: CommandOutput,
}

async fn handle_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    let command: Command = request
        .command
        .parse()
        .map_err(|e: crate::commands::UnknownCommand| bad_request(e.to_string()))?;

    let integrator = state.integrator.clone();
    let output = tokio::task::spawn_blocking(move || command.execute(&integrator))
        .await
        .map_err(|e| internal(e.to_string()))?
        .map_err(|e| scan_failed(e.to_string()))?
        .ok_or_else(|| bad_request(format!("'{}' is not available over HTTP", command.name())))?;

    Ok(Json(CommandResponse {
        command: command.name().to_string(),
        result: output,
    }))
}
