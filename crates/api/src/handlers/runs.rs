use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{ApiError, AppState};
use db::BatchAttemptRow;
use engine::{Trigger, WorkflowRun};

const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunDetail {
    #[serde(flatten)]
    pub run: WorkflowRun,
    pub batches: Vec<BatchAttemptRow>,
}

/// Start a manual run; the run proceeds in the background.
pub async fn start(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let run_id = state.launcher.start_run(Trigger::Manual).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "run_id": run_id }))))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<WorkflowRun>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be positive".into()));
    }
    let runs = state
        .store
        .list_runs(limit)
        .await?
        .into_iter()
        .map(WorkflowRun::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(runs))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<RunDetail>, ApiError> {
    let run = WorkflowRun::try_from(state.store.get_run(id).await?)?;
    let batches = state.store.list_batches(id).await?;
    Ok(Json(RunDetail { run, batches }))
}
