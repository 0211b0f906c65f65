use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::AppState;
use status::{DeployStatusChange, Notification};

/// Envelope of a hosting deploy status event.
#[derive(Debug, Deserialize)]
pub struct DeployEvent {
    pub region: String,
    pub detail: DeployDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployDetail {
    pub app_id: String,
    pub branch_name: String,
    pub job_status: String,
    pub job_id: String,
}

/// Put a deploy status change on the status topic. Filtering happens in the
/// publisher, so every well-formed event is accepted.
pub async fn deploy(
    State(state): State<AppState>,
    Json(event): Json<DeployEvent>,
) -> (StatusCode, Json<Value>) {
    let change = DeployStatusChange {
        app_id: event.detail.app_id,
        branch_name: event.detail.branch_name,
        job_status: event.detail.job_status,
        job_id: event.detail.job_id,
        region: event.region,
    };
    info!("deploy {} of {} is {}", change.job_id, change.branch_name, change.job_status);
    let receivers = state.topic.publish(Notification::Deploy(change));
    (StatusCode::ACCEPTED, Json(json!({ "receivers": receivers })))
}
