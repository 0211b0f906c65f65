//! Pipeline configuration.
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! syllabus pipeline's built-in tables, so `{}` is a complete configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use status::{DeployFilter, LifecycleMessages, SiteUrls};

use crate::executor::OrchestratorConfig;
use crate::machine::StateMachineDefinition;
use crate::models::PartitionPlan;
use crate::partition::partition;
use crate::schedule::{syllabus_schedule, ScheduleRule};
use crate::scheduler::Scheduler;
use crate::EngineError;

/// How the scraper worker is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub name: String,
    /// HTTP endpoint of the deployed scraper; usually supplied through the
    /// environment instead.
    pub endpoint: Option<String>,
    /// Published version every invocation of a run is pinned to.
    pub version: String,
    pub timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "scrape-syllabus".into(),
            endpoint: None,
            version: "$LATEST".into(),
            timeout_secs: 900,
        }
    }
}

/// Chat relay settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub slack_webhook_url: Option<String>,
    /// Only deploy events of this hosting app are relayed.
    pub watched_app_id: Option<String>,
    pub sites: SiteUrls,
}

impl NotificationConfig {
    pub fn deploy_filter(&self) -> DeployFilter {
        DeployFilter { app_id: self.watched_app_id.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub state_machine: String,
    pub topic: String,
    pub region: String,
    pub partition: PartitionPlan,
    pub schedules: Vec<ScheduleRule>,
    pub messages: LifecycleMessages,
    pub worker: WorkerConfig,
    pub notifications: NotificationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            state_machine: "syllabus-scraper".into(),
            topic: "syllabus-scraper-status".into(),
            region: "ap-northeast-1".into(),
            partition: PartitionPlan::syllabus(),
            schedules: syllabus_schedule(),
            messages: LifecycleMessages::default(),
            worker: WorkerConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the partition plan and every schedule rule.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.definition()?;
        self.scheduler()?;
        Ok(())
    }

    /// The state machine over the full plan.
    pub fn definition(&self) -> Result<StateMachineDefinition, EngineError> {
        let batches = partition(&self.partition.domain(), &self.partition)?;
        Ok(StateMachineDefinition::sequential(self.state_machine.clone(), batches))
    }

    pub fn scheduler(&self) -> Result<Scheduler, EngineError> {
        Scheduler::new(&self.schedules)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig { region: self.region.clone(), messages: self.messages.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_built_in_pipeline() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        config.validate().unwrap();

        let def = config.definition().unwrap();
        assert_eq!(def.name(), "syllabus-scraper");
        assert_eq!(def.batches().len(), 9);
        assert_eq!(config.scheduler().unwrap().rules().count(), 11);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "partition": [["GEC"], ["CMS", "HSS"]],
                "worker": { "version": "12" },
                "notifications": { "watched_app_id": "d1234" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.definition().unwrap().batches().len(), 2);
        assert_eq!(config.worker.version, "12");
        assert_eq!(config.worker.timeout_secs, 900);
        assert_eq!(config.notifications.deploy_filter().app_id.as_deref(), Some("d1234"));
        assert_eq!(config.schedules, syllabus_schedule());
    }

    #[test]
    fn invalid_plan_or_rule_fails_validation() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "partition": [["GEC"], ["GEC"]] }"#).unwrap();
        assert!(matches!(config.validate(), Err(EngineError::DuplicateSchool(_))));

        let config: PipelineConfig = serde_json::from_str(
            r#"{ "schedules": [{ "name": "x", "minute": "0", "hour": "99", "day": "1", "month": "*" }] }"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(EngineError::InvalidCron { field: "hour", .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            PipelineConfig::from_json_file("/nonexistent/pipeline.json"),
            Err(EngineError::Io(_))
        ));
    }
}
