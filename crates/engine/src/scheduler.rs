//! Scheduler — fires the orchestrator's start action from calendar rules.
//!
//! Every rule triggers independently: two rules due at the same instant start
//! two runs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::executor::StartRun;
use crate::models::Trigger;
use crate::schedule::{CronSpec, ScheduleRule};
use crate::EngineError;

/// The next instant at which one or more rules fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub at: DateTime<Utc>,
    /// Names of every rule due at `at`, in table order.
    pub rules: Vec<String>,
}

/// A validated set of schedule rules.
#[derive(Debug, Clone)]
pub struct Scheduler {
    rules: Vec<(ScheduleRule, CronSpec)>,
}

impl Scheduler {
    /// Parse every rule.
    ///
    /// # Errors
    /// [`EngineError::InvalidCron`] or [`EngineError::DuplicateRule`].
    pub fn new(rules: &[ScheduleRule]) -> Result<Self, EngineError> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut parsed = Vec::with_capacity(rules.len());
        for rule in rules {
            if !names.insert(rule.name.as_str()) {
                return Err(EngineError::DuplicateRule(rule.name.clone()));
            }
            parsed.push((rule.clone(), rule.spec()?));
        }
        Ok(Self { rules: parsed })
    }

    pub fn rules(&self) -> impl Iterator<Item = &ScheduleRule> {
        self.rules.iter().map(|(rule, _)| rule)
    }

    /// Each rule with its next firing instant after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>) -> Vec<(&ScheduleRule, Option<DateTime<Utc>>)> {
        self.rules
            .iter()
            .map(|(rule, spec)| (rule, spec.next_after(after)))
            .collect()
    }

    /// Earliest firing strictly after `after`, with every rule due then.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<Firing> {
        let upcoming = self.upcoming(after);
        let at = upcoming.iter().filter_map(|(_, next)| *next).min()?;
        let rules = upcoming
            .into_iter()
            .filter(|(_, next)| *next == Some(at))
            .map(|(rule, _)| rule.name.clone())
            .collect();
        Some(Firing { at, rules })
    }

    /// Run the schedule until `shutdown` flips to `true`.
    pub fn spawn(self, launcher: Arc<dyn StartRun>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("scheduler started with {} rules", self.rules.len());
            let mut cursor = Utc::now();

            loop {
                let Some(firing) = self.next_fire(cursor) else {
                    warn!("no schedule rule will ever fire again, scheduler stopping");
                    break;
                };
                let wait = (firing.at - Utc::now()).to_std().unwrap_or_default();
                info!("next firing at {} for {:?}", firing.at, firing.rules);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                for rule in &firing.rules {
                    match launcher.start_run(Trigger::Schedule { rule: rule.clone() }).await {
                        Ok(run_id) => info!("rule '{}' started run {}", rule, run_id),
                        Err(e) => error!("rule '{}' failed to start a run: {}", rule, e),
                    }
                }
                cursor = firing.at;
            }
            info!("scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::syllabus_schedule;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn next_fire_picks_the_earliest_rule() {
        let scheduler = Scheduler::new(&syllabus_schedule()).unwrap();
        // 1 Sep: only the monthly run. 4 Sep: fall-reg1.
        assert_eq!(
            scheduler.next_fire(at(2024, 8, 31, 17)),
            Some(Firing { at: at(2024, 9, 1, 16), rules: vec!["regular".into()] })
        );
        assert_eq!(
            scheduler.next_fire(at(2024, 9, 1, 16)),
            Some(Firing { at: at(2024, 9, 4, 16), rules: vec!["fall-reg1".into()] })
        );
    }

    #[test]
    fn overlapping_rules_on_same_day_each_fire() {
        let rules = vec![
            ScheduleRule::new("a", "", "0", "16", "1", "*"),
            ScheduleRule::new("b", "", "0", "16", "1,15", "*"),
        ];
        let scheduler = Scheduler::new(&rules).unwrap();
        let firing = scheduler.next_fire(at(2024, 1, 10, 0)).unwrap();
        assert_eq!(firing.rules, vec!["b"]);
        let firing = scheduler.next_fire(firing.at).unwrap();
        assert_eq!(firing.at, at(2024, 2, 1, 16));
        assert_eq!(firing.rules, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_rule_names_are_rejected() {
        let rules = vec![
            ScheduleRule::new("regular", "", "0", "16", "1", "*"),
            ScheduleRule::new("regular", "", "0", "16", "2", "*"),
        ];
        assert!(matches!(Scheduler::new(&rules), Err(EngineError::DuplicateRule(n)) if n == "regular"));
    }

    #[test]
    fn upcoming_lists_every_rule() {
        let scheduler = Scheduler::new(&syllabus_schedule()).unwrap();
        let upcoming = scheduler.upcoming(at(2024, 1, 1, 0));
        assert_eq!(upcoming.len(), 11);
        assert!(upcoming.iter().all(|(_, next)| next.is_some()));
        assert_eq!(upcoming[6].1, Some(at(2024, 2, 14, 16))); // spring-pre
    }

    #[derive(Default)]
    struct RecordingLauncher {
        triggers: Mutex<Vec<Trigger>>,
    }

    #[async_trait]
    impl StartRun for RecordingLauncher {
        async fn start_run(&self, trigger: Trigger) -> Result<Uuid, EngineError> {
            self.triggers.lock().unwrap().push(trigger);
            Ok(Uuid::new_v4())
        }
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop_without_firing() {
        let scheduler = Scheduler::new(&syllabus_schedule()).unwrap();
        let launcher = Arc::new(RecordingLauncher::default());
        let (tx, rx) = watch::channel(false);

        let handle = scheduler.spawn(launcher.clone(), rx);
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(launcher.triggers.lock().unwrap().is_empty());
    }
}
