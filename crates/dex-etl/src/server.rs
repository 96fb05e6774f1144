//! HTTP trigger API
//!
//! `POST /trigger-etl` runs the pipeline synchronously and returns its report.
//! Only one run executes at a time; concurrent triggers get `409 Conflict`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

use crate::config::MAX_TRIGGER_RANGE;
use crate::db;
use crate::models::IdRange;
use crate::pipeline::{EtlPipeline, PipelineReport};

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pipeline: EtlPipeline,
    default_range: IdRange,
    /// Cancelled on shutdown so an in-flight run stops between pokemon
    shutdown: CancellationToken,
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: EtlPipeline, default_range: IdRange, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            default_range,
            shutdown,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Body of `POST /trigger-etl`; both bounds fall back to the configured range
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub start_id: Option<i64>,
    pub end_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub report: PipelineReport,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trigger-etl", post(trigger_etl))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
}

/// Store connectivity check
async fn health(State(state): State<AppState>) -> Response {
    match db::health_check(state.pipeline.loader().pool()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "unreachable"
                })),
            )
                .into_response()
        },
    }
}

async fn trigger_etl(
    State(state): State<AppState>,
    body: Option<Json<TriggerRequest>>,
) -> Response {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let range = IdRange {
        start: request.start_id.unwrap_or(state.default_range.start),
        end: request.end_id.unwrap_or(state.default_range.end),
    };

    if let Err(e) = range.validate() {
        warn!(range = %range, error = %e, "Rejected trigger with invalid range");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response();
    }

    if range.len() > MAX_TRIGGER_RANGE {
        warn!(range = %range, max = MAX_TRIGGER_RANGE, "Rejected trigger with oversized range");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": format!("range {} exceeds {} ids", range, MAX_TRIGGER_RANGE)
            })),
        )
            .into_response();
    }

    let Ok(_guard) = state.run_lock.try_lock() else {
        warn!(range = %range, "Rejected trigger, a run is already in progress");
        return (
            StatusCode::CONFLICT,
            Json(json!({ "success": false, "error": "an ETL run is already in progress" })),
        )
            .into_response();
    };

    info!(range = %range, "ETL run triggered over HTTP");
    let report = state.pipeline.run(range, &state.shutdown).await;
    let success = report.is_success();

    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(TriggerResponse { success, report })).into_response()
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
