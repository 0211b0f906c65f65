//! In-process pub/sub topic the orchestrator publishes notifications to.

use tokio::sync::broadcast;
use tracing::debug;

use crate::Notification;

/// Default number of notifications buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// A named broadcast topic.
///
/// Publishing never blocks and never fails: with no subscriber attached the
/// notification is dropped, matching a topic without subscriptions.
#[derive(Debug, Clone)]
pub struct StatusTopic {
    name: String,
    sender: broadcast::Sender<Notification>,
}

impl StatusTopic {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { name: name.into(), sender }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish to every current subscriber; returns how many received it.
    pub fn publish(&self, notification: Notification) -> usize {
        match self.sender.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("topic '{}' has no subscribers, notification dropped", self.name);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StatusEvent, StatusEventKind};
    use uuid::Uuid;

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let topic = StatusTopic::new("syllabus-scraper-status", 8);
        let event = StatusEvent::new(StatusEventKind::Start, "hello", Uuid::new_v4());
        assert_eq!(topic.publish(Notification::Lifecycle(event)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_in_order() {
        let topic = StatusTopic::new("syllabus-scraper-status", 8);
        let mut a = topic.subscribe();
        let mut b = topic.subscribe();
        let run_id = Uuid::new_v4();

        topic.publish(Notification::Lifecycle(StatusEvent::new(StatusEventKind::Start, "s", run_id)));
        topic.publish(Notification::Lifecycle(StatusEvent::new(StatusEventKind::End, "e", run_id)));

        for rx in [&mut a, &mut b] {
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            assert_eq!(first.as_lifecycle().unwrap().kind, StatusEventKind::Start);
            assert_eq!(second.as_lifecycle().unwrap().kind, StatusEventKind::End);
        }
    }
}
