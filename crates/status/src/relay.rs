//! Slack chat relay.
//!
//! Receives rendered status messages, recognises deploy and execution
//! notifications through their wire patterns, and posts a Slack incoming
//! webhook payload. Anything unrecognised is posted as plain text.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{DeployStatusChange, ExecutionStatus, ExecutionStatusChange};
use crate::publisher::ChatChannel;
use crate::template::{parse_deploy_message, parse_execution_message};
use crate::PublishError;

const DEPLOY_ICON: &str = "https://i.ibb.co/8r3mDbY/AWS-Amplify-3.png";
const EXECUTION_ICON: &str = "https://i.ibb.co/zZrG2fN/AWS-Lambda-light-bg-2.png";

/// Upper bound on one webhook delivery.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    pub fields: Vec<SlackField>,
}

/// Body of a Slack incoming-webhook request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<SlackAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'static str>,
}

/// Public site of the two long-lived branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUrls {
    pub develop: String,
    pub master: String,
}

impl Default for SiteUrls {
    fn default() -> Self {
        Self {
            develop: "https://dev.wasedatime.com/".into(),
            master: "https://wasedatime.com/".into(),
        }
    }
}

impl SiteUrls {
    /// Where a deployed branch can be browsed.
    pub fn for_branch(&self, app_id: &str, branch: &str) -> String {
        match branch {
            "develop" => self.develop.clone(),
            "master" => self.master.clone(),
            other => format!("https://{}.{app_id}.amplifyapp.com/", other.replace(['/', '_'], "-")),
        }
    }
}

fn deploy_color(job_status: &str) -> Option<&'static str> {
    match job_status {
        "SUCCEED" | "STARTED" => Some("good"),
        "FAILED" => Some("danger"),
        _ => None,
    }
}

fn execution_color(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Running | ExecutionStatus::Succeeded => "good",
        ExecutionStatus::TimedOut => "warning",
        ExecutionStatus::Aborted | ExecutionStatus::Failed => "danger",
    }
}

/// Rich payload for a deploy status change.
pub fn deploy_payload(change: &DeployStatusChange, sites: &SiteUrls, now: DateTime<Utc>) -> SlackPayload {
    let DeployStatusChange { app_id, branch_name, job_status, job_id, region } = change;
    let link = format!(
        "https://{region}.console.aws.amazon.com/amplify/home?region={region}#{app_id}/{branch_name}/{job_id}"
    );
    let text = format!("Branch: {branch_name} has entered status: {job_status} <{link}|(view in web console)>");
    let site = sites.for_branch(app_id, branch_name);

    SlackPayload {
        attachments: vec![SlackAttachment {
            fallback: Some(format!("{text} at {}", now.to_rfc3339_opts(SecondsFormat::Millis, true))),
            title: format!("Branch {branch_name} is now status {job_status}"),
            color: deploy_color(job_status),
            fields: vec![
                SlackField { title: "Website".into(), value: format!("<{site}|Click to view the branch>"), short: true },
                SlackField { title: "Branch".into(), value: branch_name.clone(), short: true },
            ],
        }],
        text,
        icon_url: Some(DEPLOY_ICON),
        username: Some("aws-amplify"),
    }
}

/// Rich payload for a workflow execution status change.
pub fn execution_payload(change: &ExecutionStatusChange, now: DateTime<Utc>) -> SlackPayload {
    let ExecutionStatusChange { name, status, execution_arn, region } = change;
    let link = format!(
        "https://{region}.console.aws.amazon.com/states/home?region={region}#/executions/details/{execution_arn}"
    );

    SlackPayload {
        text: format!("Execution: {name} has entered status: {status} <{link}|(view in web console)>"),
        attachments: vec![SlackAttachment {
            fallback: None,
            title: format!("Execution {name} is now status {status}"),
            color: Some(execution_color(*status)),
            fields: vec![
                SlackField {
                    title: "Timestamp".into(),
                    value: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                    short: true,
                },
                SlackField { title: "Execution".into(), value: name.clone(), short: true },
            ],
        }],
        icon_url: Some(EXECUTION_ICON),
        username: Some("aws-stepfunctions"),
    }
}

// ---------------------------------------------------------------------------
// SlackRelay
// ---------------------------------------------------------------------------

/// Forwards status messages to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackRelay {
    client: reqwest::Client,
    webhook_url: String,
    sites: SiteUrls,
}

impl SlackRelay {
    /// `timeout` bounds each delivery so a hung webhook cannot stall the
    /// publisher loop.
    pub fn new(
        webhook_url: impl Into<String>,
        sites: SiteUrls,
        timeout: Duration,
    ) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, webhook_url: webhook_url.into(), sites })
    }

    /// Choose the payload for a rendered message.
    pub fn payload_for(&self, message: &str, now: DateTime<Utc>) -> SlackPayload {
        if let Some(change) = parse_deploy_message(message) {
            return deploy_payload(&change, &self.sites, now);
        }
        if let Some(change) = parse_execution_message(message) {
            return execution_payload(&change, now);
        }
        SlackPayload { text: message.to_string(), attachments: Vec::new(), icon_url: None, username: None }
    }
}

#[async_trait]
impl ChatChannel for SlackRelay {
    async fn deliver(&self, message: &str) -> Result<(), PublishError> {
        let payload = self.payload_for(message, Utc::now());
        let response = self.client.post(&self.webhook_url).json(&payload).send().await?;

        let status = response.status();
        debug!("slack webhook answered {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}
