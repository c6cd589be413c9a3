//! HTTP server for the query pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Structured answer: `{ "summary", "results" }` |
//! | `POST` | `/ask` | Legacy plain-text answer: `{ "text" }` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Pipeline failures never surface as HTTP errors — every absorbed
//! failure mode is reflected inside a 200 payload (§ the pipeline
//! module). The only error responses are validation errors, using the
//! shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser
//! frontend can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::generation::{create_summarizer, Summarizer};
use crate::models::{AskRequest, AskResponse, QueryRequest, QueryResponse};
use crate::pipeline;
use crate::{db, migrate};

/// Shared application state. Built once at startup; every handle is
/// read-only for the lifetime of the process.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    summarizer: Arc<dyn Summarizer>,
}

/// Start the HTTP server on the configured bind address.
///
/// Runs migrations first so a fresh deployment can serve immediately,
/// then serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    migrate::run_migrations(config).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool: db::connect(config).await?,
        summarizer: create_summarizer(&config.generation)?,
    };

    if !state.summarizer.is_configured() {
        tracing::warn!("no generation backend configured; serving placeholder answers");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/query", post(handle_query))
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = &config.server.bind;
    tracing::info!(bind = %bind_addr, "query server listening");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

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

// ============ POST /query ============

/// Structured query endpoint. Always returns HTTP 200 for a non-empty
/// query; degraded and failure modes are carried in the payload.
async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let response = pipeline::answer_query(
        &state.config,
        &state.pool,
        state.summarizer.as_ref(),
        query,
    )
    .await;

    Ok(Json(response))
}

// ============ POST /ask ============

/// Legacy plain-text endpoint: same pipeline, summary-only payload.
async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let response = pipeline::answer_query(
        &state.config,
        &state.pool,
        state.summarizer.as_ref(),
        question,
    )
    .await;

    Ok(Json(AskResponse {
        text: response.summary,
    }))
}
