//! Terminal-outcome notifications
//!
//! Delivery is best-effort: a failed publish is logged and otherwise
//! ignored, it never changes the outcome of an upload.

pub mod sns;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::upload::Outcome;

pub use sns::{SnsClient, SnsConfig};

/// A backend that can publish a subject and message
#[async_trait]
pub trait NotificationClient: Send + Sync {
    /// Publish one notification
    async fn publish(&self, subject: &str, message: &str) -> Result<()>;
}

/// Writes notifications to the log only
///
/// Used when no notification topic is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationClient;

#[async_trait]
impl NotificationClient for LogNotificationClient {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        info!("[{}] {}", subject, message);
        Ok(())
    }
}

/// Reports upload outcomes through a [`NotificationClient`]
#[derive(Clone)]
pub struct Notifier {
    client: Arc<dyn NotificationClient>,
}

impl Notifier {
    /// Create a notifier
    pub fn new(client: Arc<dyn NotificationClient>) -> Self {
        Self { client }
    }

    /// Publish once, logging a failure instead of returning it
    pub async fn notify(&self, subject: &str, message: &str) {
        if let Err(e) = self.client.publish(subject, message).await {
            warn!("Error sending notification '{}': {}", subject, e);
        }
    }

    /// Publish the subject and message describing `outcome`
    pub async fn notify_outcome(&self, outcome: &Outcome) {
        self.notify(outcome.subject(), &outcome.message()).await;
    }
}
