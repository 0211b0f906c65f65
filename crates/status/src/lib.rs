//! `status` crate — lifecycle events, the status topic and the chat relay.
//!
//! The orchestrator publishes [`Notification`]s onto a [`StatusTopic`]; the
//! [`StatusPublisher`] subscribes, renders each notification into its wire
//! message and forwards it to a [`ChatChannel`].

pub mod error;
pub mod event;
pub mod template;
pub mod topic;
pub mod relay;
pub mod publisher;

pub use error::PublishError;
pub use event::{
    DeployFilter, DeployStatusChange, ExecutionStatus, ExecutionStatusChange, LifecycleMessages,
    Notification, StatusEvent, StatusEventKind,
};
pub use publisher::{ChatChannel, StatusPublisher};
pub use relay::{SiteUrls, SlackRelay};
pub use topic::StatusTopic;
