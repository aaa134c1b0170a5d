//! Notification dispatch to reviewer channels.

mod telegram;
pub mod templates;

pub use telegram::TelegramNotifier;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{FaturaError, NotifyError, Stage};
use crate::models::config::{Credentials, NotifyConfig};

/// Delivers a text message to a destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel_id: &str, message: &str) -> Result<(), NotifyError>;
}

/// Reviewer group a message is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Compliance,
    Payment,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Compliance => f.write_str("compliance"),
            Channel::Payment => f.write_str("payment"),
        }
    }
}

/// Result of a send attempt. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed(String),
}

/// Routes messages to the configured channels.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    compliance_channel: String,
    payment_channel: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        compliance_channel: impl Into<String>,
        payment_channel: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            notifier,
            compliance_channel: compliance_channel.into(),
            payment_channel: payment_channel.into(),
            timeout,
        }
    }

    pub fn from_credentials(
        notifier: Arc<dyn Notifier>,
        credentials: &Credentials,
        config: &NotifyConfig,
    ) -> Self {
        Self::new(
            notifier,
            credentials.compliance_channel.clone(),
            credentials.payment_channel.clone(),
            config.timeout(),
        )
    }

    pub fn channel_id(&self, channel: Channel) -> &str {
        match channel {
            Channel::Compliance => &self.compliance_channel,
            Channel::Payment => &self.payment_channel,
        }
    }

    /// Send one message, bounded by the configured timeout.
    pub async fn send(&self, channel: Channel, message: &str) -> Delivery {
        let channel_id = self.channel_id(channel);

        let outcome = tokio::time::timeout(self.timeout, self.notifier.notify(channel_id, message))
            .await
            .map_err(|_| FaturaError::Timeout { stage: Stage::Notification, after: self.timeout })
            .and_then(|result| result.map_err(FaturaError::from));

        match outcome {
            Ok(()) => {
                info!(%channel, "Notification delivered");
                Delivery::Delivered
            }
            Err(e) => {
                warn!(%channel, "Notification failed: {}", e);
                Delivery::Failed(e.to_string())
            }
        }
    }
}
