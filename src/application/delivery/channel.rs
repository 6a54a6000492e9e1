use crate::application::delivery::payload::SignalPayload;
use async_trait::async_trait;
use std::time::Duration;

/// Raw HTTP outcome of one delivery attempt. Status-code interpretation
/// (retry vs terminal) lives in the dispatcher, not the channel.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
#[error("delivery transport error: {0}")]
pub struct TransportError(pub String);

/// One configured notification endpoint (a webhook, in the production
/// implementation). Channels never retry internally; the dispatcher
/// owns attempt counting and backoff.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn id(&self) -> &str;
    async fn post(&self, payload: &SignalPayload) -> Result<DeliveryResponse, TransportError>;
}
