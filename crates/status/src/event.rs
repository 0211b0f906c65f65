//! Event models carried on the status topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template;

// ---------------------------------------------------------------------------
// Lifecycle events
// ---------------------------------------------------------------------------

/// Which lifecycle point of a run an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusEventKind {
    Start,
    Error,
    End,
}

/// Emitted at run start, at a batch failure, and at run end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub kind: StatusEventKind,
    pub message: String,
    pub run_id: Uuid,
    pub emitted_at: DateTime<Utc>,
}

/// Texts of the three lifecycle messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleMessages {
    /// Where operators find the worker logs; embedded in the END message.
    pub logs_url: String,
}

impl Default for LifecycleMessages {
    fn default() -> Self {
        Self {
            logs_url: "https://ap-northeast-1.console.aws.amazon.com/cloudwatch/home?region=ap-northeast-1\
                       #logStream:group=%252Faws%252Flambda%252Fscrape-syllabus"
                .into(),
        }
    }
}

impl LifecycleMessages {
    pub fn start(&self) -> String {
        "[INFO] Syllabus pipeline: Started scraping the syllabus.".to_string()
    }

    /// `cause` is embedded verbatim.
    pub fn error(&self, cause: &str) -> String {
        format!("[ERROR] Syllabus pipeline: An Error occurred when scraping the syllabus caused by: {cause}")
    }

    pub fn end(&self) -> String {
        format!(
            "[INFO] Syllabus pipeline: Finished scraping the syllabus. See {} for logs.",
            self.logs_url
        )
    }
}

impl StatusEvent {
    pub fn new(kind: StatusEventKind, message: impl Into<String>, run_id: Uuid) -> Self {
        Self { kind, message: message.into(), run_id, emitted_at: Utc::now() }
    }
}

// ---------------------------------------------------------------------------
// Build-deploy status changes
// ---------------------------------------------------------------------------

/// A hosting build/deploy job changed status.
///
/// Field names follow the `detail` object of the deployment status event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStatusChange {
    pub app_id: String,
    pub branch_name: String,
    pub job_status: String,
    pub job_id: String,
    pub region: String,
}

/// Job statuses that produce a notification.
pub const NOTIFIABLE_JOB_STATUSES: [&str; 3] = ["SUCCEED", "FAILED", "STARTED"];

/// Event pattern deciding which deploy events are forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployFilter {
    /// Only this app is watched; `None` watches every app.
    pub app_id: Option<String>,
}

impl DeployFilter {
    pub fn accepts(&self, change: &DeployStatusChange) -> bool {
        let app_matches = self.app_id.as_deref().map_or(true, |id| id == change.app_id);
        app_matches && NOTIFIABLE_JOB_STATUSES.contains(&change.job_status.as_str())
    }
}

// ---------------------------------------------------------------------------
// Workflow execution status changes
// ---------------------------------------------------------------------------

/// Status of a workflow execution as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Aborted,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running   => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed    => write!(f, "FAILED"),
            Self::TimedOut  => write!(f, "TIMED_OUT"),
            Self::Aborted   => write!(f, "ABORTED"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING"   => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED"    => Ok(Self::Failed),
            "TIMED_OUT" => Ok(Self::TimedOut),
            "ABORTED"   => Ok(Self::Aborted),
            other       => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// A workflow run changed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatusChange {
    /// Execution name (the run id).
    pub name: String,
    pub status: ExecutionStatus,
    pub execution_arn: String,
    pub region: String,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Everything that travels on the status topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Lifecycle(StatusEvent),
    Deploy(DeployStatusChange),
    Execution(ExecutionStatusChange),
}

impl Notification {
    /// The text message published for this notification.
    pub fn render(&self) -> String {
        match self {
            Self::Lifecycle(event) => event.message.clone(),
            Self::Deploy(change) => template::deploy_message(change),
            Self::Execution(change) => template::execution_message(change),
        }
    }

    pub fn as_lifecycle(&self) -> Option<&StatusEvent> {
        match self {
            Self::Lifecycle(event) => Some(event),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy(app_id: &str, job_status: &str) -> DeployStatusChange {
        DeployStatusChange {
            app_id: app_id.into(),
            branch_name: "develop".into(),
            job_status: job_status.into(),
            job_id: "0000000042".into(),
            region: "ap-northeast-1".into(),
        }
    }

    #[test]
    fn error_message_embeds_cause_verbatim() {
        let msgs = LifecycleMessages::default();
        assert_eq!(
            msgs.error("worker failed: {\"errorType\":\"Timeout\"}"),
            "[ERROR] Syllabus pipeline: An Error occurred when scraping the syllabus caused by: \
             worker failed: {\"errorType\":\"Timeout\"}"
        );
    }

    #[test]
    fn end_message_points_at_logs() {
        let msgs = LifecycleMessages { logs_url: "https://logs.example/scraper".into() };
        assert_eq!(
            msgs.end(),
            "[INFO] Syllabus pipeline: Finished scraping the syllabus. See https://logs.example/scraper for logs."
        );
    }

    #[test]
    fn deploy_filter_matches_status_and_app() {
        let filter = DeployFilter { app_id: Some("d1234".into()) };
        assert!(filter.accepts(&deploy("d1234", "FAILED")));
        assert!(filter.accepts(&deploy("d1234", "STARTED")));
        assert!(!filter.accepts(&deploy("d1234", "PENDING")));
        assert!(!filter.accepts(&deploy("d9999", "SUCCEED")));
        assert!(DeployFilter::default().accepts(&deploy("d9999", "SUCCEED")));
    }

    #[test]
    fn execution_status_round_trips_through_text() {
        for status in ["RUNNING", "SUCCEEDED", "FAILED", "TIMED_OUT", "ABORTED"] {
            let parsed: ExecutionStatus = status.parse().unwrap();
            assert_eq!(parsed.to_string(), status);
        }
        assert!("PAUSED".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn notification_is_tagged_on_the_wire() {
        let n = Notification::Deploy(deploy("d1234", "SUCCEED"));
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "deploy");
        assert_eq!(json["appId"], "d1234");
    }
}
