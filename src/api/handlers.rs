use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{MediaKind, RunReport, RunRequest},
    services::{
        approval::{self, ApprovalRequest, ApprovalSummary},
        bootstrap::ResetSummary,
        orchestrator, ProgressSummary,
    },
};

use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalsRequest {
    pub user_id: String,
    pub media_kind: MediaKind,
    pub actions: Vec<ApprovalRequest>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub library_id: String,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Targeted run when `userId` is set, sweep otherwise
pub async fn start_run(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RunRequest>,
) -> AppResult<Json<RunReport>> {
    let ctx = state.run_context(request.dry_run);
    tracing::info!(request_id = %request_id, run_id = %ctx.run_id, "Run requested");
    *state.current_run.write().await = Some(ctx.clone());

    let report = orchestrator::execute(&state.engine, &ctx, &request).await?;
    Ok(Json(report))
}

pub async fn run_progress(State(state): State<AppState>) -> AppResult<Json<ProgressSummary>> {
    state
        .progress()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No run has started yet".to_string()))
}

pub async fn apply_approvals(
    State(state): State<AppState>,
    Json(request): Json<ApprovalsRequest>,
) -> AppResult<Json<ApprovalSummary>> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("userId must not be blank".to_string()));
    }
    let dry_run = request.dry_run.unwrap_or(state.default_dry_run);
    let summary = approval::apply_actions(
        state.engine.store(),
        &request.user_id,
        request.media_kind,
        &request.actions,
        dry_run,
    )
    .await?;
    Ok(Json(summary))
}

pub async fn reset_library(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> AppResult<Json<ResetSummary>> {
    if request.library_id.trim().is_empty() {
        return Err(AppError::InvalidInput("libraryId must not be blank".to_string()));
    }
    let ctx = state.run_context(request.dry_run);
    let summary = state.engine.reset(&ctx, &request.library_id).await?;
    Ok(Json(summary))
}
