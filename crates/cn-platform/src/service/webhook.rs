//! Webhook Dispatcher
//!
//! Posts one event envelope to every destination and reports a
//! [`DeliveryOutcome`] per destination, in input order. Destinations are
//! independent: an error from one never stops the others. There is no retry.

use std::time::Duration;

use futures::future::join_all;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use sha2::Sha256;
use tracing::{debug, info, warn};

use cn_common::{DeliveryOutcome, WebhookEnvelope};

use crate::error::{PlatformError, Result};

pub const SIGNATURE_HEADER: &str = "X-Cribnosh-Signature";
pub const WEBHOOK_DELIVERIES_METRIC: &str = "cribnosh_webhook_deliveries_total";

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub signing_secret: Option<String>,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: "CribNosh-Webhooks/1.0".to_string(),
            signing_secret: None,
        }
    }
}

impl From<&cn_config::WebhookConfig> for WebhookSettings {
    fn from(config: &cn_config::WebhookConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
            signing_secret: config.signing_secret.clone(),
        }
    }
}

pub struct WebhookDispatcher {
    client: reqwest::Client,
    signing_secret: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(settings: WebhookSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent)
            .build()
            .map_err(|e| PlatformError::configuration(format!("webhook client: {}", e)))?;

        Ok(Self {
            client,
            signing_secret: settings.signing_secret,
        })
    }

    /// Deliver `envelope` to each URL concurrently
    pub async fn dispatch(&self, envelope: &WebhookEnvelope, urls: &[String]) -> Result<Vec<DeliveryOutcome>> {
        let body = serde_json::to_vec(envelope)?;
        let signature = match &self.signing_secret {
            Some(secret) => Some(sign_payload(secret, &body)?),
            None => None,
        };

        let results = join_all(
            urls.iter()
                .map(|url| self.deliver(url, body.clone(), signature.as_deref())),
        )
        .await;

        let delivered = results.iter().filter(|r| r.ok).count();
        info!(
            event = %envelope.event,
            destinations = results.len(),
            delivered,
            failed = results.len() - delivered,
            "Webhook dispatch completed"
        );

        Ok(results)
    }

    async fn deliver(&self, url: &str, body: Vec<u8>, signature: Option<&str>) -> DeliveryOutcome {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let outcome = match request.send().await {
            Ok(response) => {
                let outcome = DeliveryOutcome::responded(url, response.status().as_u16());
                if outcome.ok {
                    debug!(url, status = outcome.status, "Webhook delivered");
                } else {
                    warn!(url, status = outcome.status, "Webhook destination rejected delivery");
                }
                outcome
            }
            Err(e) => {
                warn!(url, error = %e, "Webhook destination unreachable");
                DeliveryOutcome::unreachable(url, e.to_string())
            }
        };

        let label = match (outcome.ok, outcome.status) {
            (true, _) => "delivered",
            (false, 0) => "unreachable",
            (false, _) => "rejected",
        };
        metrics::counter!(WEBHOOK_DELIVERIES_METRIC, "outcome" => label).increment(1);

        outcome
    }
}

/// `sha256=<hex HMAC-SHA256 of body>`
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| PlatformError::internal(format!("invalid signing key: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}
