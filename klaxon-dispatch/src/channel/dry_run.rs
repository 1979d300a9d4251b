use async_trait::async_trait;
use tracing::info;

use super::DeliveryChannel;
use crate::{ChannelError, message::AlertPayload};

/// Accepts every payload without contacting a gateway.
///
/// Message ids have the form `dry-run-<ulid>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunChannel;

impl DryRunChannel {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliveryChannel for DryRunChannel {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn send(&self, payload: &AlertPayload) -> Result<String, ChannelError> {
        let message_id = format!("dry-run-{}", ulid::Ulid::new());

        info!(
            target_user = %payload.target(),
            title = payload.title(),
            message_id = %message_id,
            "Dry run: alarm not sent"
        );

        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use klaxon_common::{DeliveryToken, RecipientId};

    use super::*;
    use crate::message::MessageBuilder;

    #[tokio::test]
    async fn test_dry_run_ids_are_unique() {
        let payload = MessageBuilder::default().build_at(
            &RecipientId::from("u1"),
            DeliveryToken::new("tok"),
            Utc::now(),
        );

        let first = DryRunChannel.send(&payload).await.expect("dry run succeeds");
        let second = DryRunChannel.send(&payload).await.expect("dry run succeeds");

        assert!(first.starts_with("dry-run-"));
        assert_ne!(first, second);
    }
}
