//! HTTP `DeliveryChannel` posting signal payloads to a configured
//! webhook URL. Status codes and `Retry-After` pass straight through to
//! the dispatcher, which owns all retry/backoff decisions.

use crate::application::delivery::{DeliveryChannel, DeliveryResponse, SignalPayload, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct WebhookChannel {
    id: String,
    url: String,
    client: Client,
}

impl WebhookChannel {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { id: id.into(), url: url.into(), client }
    }

    /// Build one channel per comma-separated URL in `WEBHOOK_URLS`, named
    /// by their position (`webhook-0`, `webhook-1`, ...). Entries that
    /// don't parse as an absolute URL are dropped with a warning rather
    /// than deferred to the first failed delivery attempt.
    pub fn from_urls(urls: &str) -> Vec<Self> {
        urls.split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .filter_map(|raw| match url::Url::parse(raw) {
                Ok(_) => Some(raw),
                Err(err) => {
                    tracing::warn!(url = raw, error = %err, "skipping malformed webhook url");
                    None
                }
            })
            .enumerate()
            .map(|(i, url)| Self::new(format!("webhook-{i}"), url))
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn post(&self, payload: &SignalPayload) -> Result<DeliveryResponse, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        Ok(DeliveryResponse { status, retry_after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_urls_skips_blank_entries_and_names_by_position() {
        let channels = WebhookChannel::from_urls("https://a.test/hook, ,https://b.test/hook");
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id(), "webhook-0");
        assert_eq!(channels[1].id(), "webhook-1");
    }

    #[test]
    fn from_urls_drops_malformed_entries() {
        let channels = WebhookChannel::from_urls("not-a-url,https://a.test/hook");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id(), "webhook-0");
    }
}
