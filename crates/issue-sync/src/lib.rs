//! HTTP front-end exposing the issue label synchronizer.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use linear_core::graphql::Issue;
use linear_core::services::sync::{IssueSyncService, SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    sync: Arc<IssueSyncService>,
}

impl AppState {
    pub fn new(sync: IssueSyncService) -> Self {
        Self {
            sync: Arc::new(sync),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/sync-issues", post(sync_issues))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C is received.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "issue sync server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn hello() -> &'static str {
    "Hello, World!"
}

#[derive(Debug, Default, Deserialize)]
struct SyncQuery {
    #[serde(default)]
    detail: SyncDetail,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SyncDetail {
    #[default]
    Issues,
    Outcomes,
}

#[derive(Serialize)]
struct DetailedSyncResponse {
    issues: Vec<Issue>,
    outcomes: SyncResult,
    succeeded: usize,
    failed: usize,
}

async fn sync_issues(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> Result<Response, ApiError> {
    let report = state.sync.run().await?;
    let response = match query.detail {
        SyncDetail::Issues => Json(report.issues).into_response(),
        SyncDetail::Outcomes => Json(DetailedSyncResponse {
            succeeded: report.result.succeeded(),
            failed: report.result.failed(),
            issues: report.issues,
            outcomes: report.result,
        })
        .into_response(),
    };
    Ok(response)
}

/// Failures surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Sync(SyncError::Fetch(_)) => StatusCode::BAD_GATEWAY,
        };
        error!(error = %self, "issue sync failed");
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
