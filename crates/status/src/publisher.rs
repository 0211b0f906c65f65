//! The Status Publisher: topic subscriber that forwards to a chat channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{DeployFilter, Notification, PublishError};

/// Destination of rendered status messages.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<(), PublishError>;
}

/// Renders notifications and forwards them, fire-and-forget.
#[derive(Clone)]
pub struct StatusPublisher {
    channel: Arc<dyn ChatChannel>,
    deploy_filter: DeployFilter,
}

impl StatusPublisher {
    pub fn new(channel: Arc<dyn ChatChannel>, deploy_filter: DeployFilter) -> Self {
        Self { channel, deploy_filter }
    }

    /// Forward one notification.
    ///
    /// Returns whether a message was handed to the channel. Delivery failures
    /// are logged and swallowed.
    pub async fn handle(&self, notification: &Notification) -> bool {
        if let Notification::Deploy(change) = notification {
            if !self.deploy_filter.accepts(change) {
                debug!("deploy event for {}/{} ({}) filtered out", change.app_id, change.branch_name, change.job_status);
                return false;
            }
        }

        let message = notification.render();
        if let Err(e) = self.channel.deliver(&message).await {
            warn!("status notification was not delivered: {}", e);
        }
        true
    }

    /// Consume the subscription until the topic is dropped.
    pub fn spawn(self, mut rx: broadcast::Receiver<Notification>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("status publisher started");
            loop {
                match rx.recv().await {
                    Ok(notification) => {
                        self.handle(&notification).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("status publisher lagged, {} notifications skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("status topic closed, publisher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeployStatusChange, StatusEvent, StatusEventKind, StatusTopic};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records every delivered message; optionally fails every delivery.
    #[derive(Default)]
    struct RecordingChannel {
        delivered: Mutex<Vec<String>>,
        reject: bool,
    }

    #[async_trait]
    impl ChatChannel for RecordingChannel {
        async fn deliver(&self, message: &str) -> Result<(), PublishError> {
            self.delivered.lock().unwrap().push(message.to_string());
            if self.reject {
                return Err(PublishError::Rejected { status: 500, body: "down".into() });
            }
            Ok(())
        }
    }

    fn deploy(app_id: &str, job_status: &str) -> Notification {
        Notification::Deploy(DeployStatusChange {
            app_id: app_id.into(),
            branch_name: "main".into(),
            job_status: job_status.into(),
            job_id: "1".into(),
            region: "ap-northeast-1".into(),
        })
    }

    #[tokio::test]
    async fn filtered_deploy_events_are_not_forwarded() {
        let channel = Arc::new(RecordingChannel::default());
        let publisher = StatusPublisher::new(channel.clone(), DeployFilter { app_id: Some("d1234".into()) });

        assert!(publisher.handle(&deploy("d1234", "SUCCEED")).await);
        assert!(!publisher.handle(&deploy("d1234", "CANCELLED")).await);
        assert!(!publisher.handle(&deploy("other", "FAILED")).await);

        assert_eq!(channel.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let channel = Arc::new(RecordingChannel { reject: true, ..Default::default() });
        let publisher = StatusPublisher::new(channel.clone(), DeployFilter::default());
        let event = StatusEvent::new(StatusEventKind::Error, "[ERROR] boom", Uuid::new_v4());

        assert!(publisher.handle(&Notification::Lifecycle(event)).await);
        assert_eq!(*channel.delivered.lock().unwrap(), vec!["[ERROR] boom".to_string()]);
    }

    #[tokio::test]
    async fn spawned_publisher_drains_topic_until_closed() {
        let channel = Arc::new(RecordingChannel::default());
        let topic = StatusTopic::new("syllabus-scraper-status", 8);
        let handle = StatusPublisher::new(channel.clone(), DeployFilter::default()).spawn(topic.subscribe());

        let run_id = Uuid::new_v4();
        topic.publish(Notification::Lifecycle(StatusEvent::new(StatusEventKind::Start, "start", run_id)));
        topic.publish(Notification::Lifecycle(StatusEvent::new(StatusEventKind::End, "end", run_id)));
        drop(topic);

        handle.await.unwrap();
        assert_eq!(*channel.delivered.lock().unwrap(), vec!["start".to_string(), "end".to_string()]);
    }
}
