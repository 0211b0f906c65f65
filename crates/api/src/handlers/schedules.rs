use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ScheduleView {
    pub name: String,
    pub description: String,
    pub expression: String,
    pub next_fire: Option<DateTime<Utc>>,
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<ScheduleView>> {
    let views = state
        .scheduler
        .upcoming(Utc::now())
        .into_iter()
        .map(|(rule, next_fire)| ScheduleView {
            name: rule.name.clone(),
            description: rule.description.clone(),
            expression: rule.expression(),
            next_fire,
        })
        .collect();
    Json(views)
}
