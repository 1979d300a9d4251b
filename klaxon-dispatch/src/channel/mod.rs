//! Delivery channels.
//!
//! A channel hands one [`AlertPayload`] to a push gateway and reports either
//! the gateway's message id or a classified [`ChannelError`]. Channels make
//! exactly one attempt per call; retrying is the dispatcher's job.

mod dry_run;
mod fcm;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
pub use dry_run::DryRunChannel;
pub use fcm::{FcmChannel, FcmConfig, classify_error, parse_retry_after};
use serde::{Deserialize, Serialize};

use crate::{ChannelError, message::AlertPayload};

/// A push gateway that can deliver alarm payloads.
#[async_trait]
pub trait DeliveryChannel: Send + Sync + Debug {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Submit `payload` once.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] describing why the gateway did not accept
    /// the payload.
    async fn send(&self, payload: &AlertPayload) -> Result<String, ChannelError>;

    /// Whether the channel is configured well enough to accept sends.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Which channel to deliver through.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelConfig {
    /// Firebase Cloud Messaging, HTTP v1 API.
    Fcm(FcmConfig),
    /// Log the alarm and report success without contacting any gateway.
    #[default]
    DryRun,
}

impl ChannelConfig {
    /// Construct the configured channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be constructed, e.g. the FCM
    /// access token is missing.
    pub fn build(&self) -> Result<Arc<dyn DeliveryChannel>, ChannelError> {
        Ok(match self {
            Self::Fcm(config) => Arc::new(FcmChannel::new(config.clone())?),
            Self::DryRun => Arc::new(DryRunChannel::new()),
        })
    }
}
