use std::time::Duration;

use rand::Rng as _;
use relay_core::{KeyBundle, RelayError, Subscription};
use serde::Serialize;

/// Exponential backoff with full jitter, adapted from a synchronous shipper's
/// retry executor to `tokio::time::sleep`. Applied only around the
/// participant-subscribe call to the registry (§7).
#[derive(Debug, Clone)]
pub struct RetryStrategyConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryStrategyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

fn calculate_delay(cfg: &RetryStrategyConfig, attempt: u32) -> Duration {
    let exp = cfg.base_delay.as_millis().saturating_mul(1u128 << attempt.min(20));
    let capped = exp.min(cfg.max_delay.as_millis());
    apply_jitter(capped as u64)
}

fn apply_jitter(delay_ms: u64) -> Duration {
    if delay_ms == 0 {
        return Duration::ZERO;
    }
    let jittered = rand::thread_rng().gen_range(0..=delay_ms);
    Duration::from_millis(jittered)
}

async fn retry<T, F, Fut>(cfg: &RetryStrategyConfig, mut op: F) -> Result<T, RelayError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RelayError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) if attempt + 1 < cfg.max_attempts => {
                let delay = calculate_delay(cfg, attempt);
                tracing::warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "registry call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    subscriber_id: &'a str,
    url: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    signing_public_key: &'a str,
    encr_public_key: &'a str,
    valid_from: String,
    valid_until: String,
}

/// HTTP client for the outbound participant-subscribe call and the
/// key-manager's public-key cache-miss fetch (§4.7, §4.8).
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryStrategyConfig,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            retry: RetryStrategyConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryStrategyConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a subscriber's keys with the registry, retrying transient failures.
    pub async fn subscribe(
        &self,
        sub_id: &str,
        url: &str,
        kind: &str,
        bundle: &KeyBundle,
        valid_from: chrono::DateTime<chrono::Utc>,
        valid_until: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), RelayError> {
        let body = SubscribeRequest {
            subscriber_id: sub_id,
            url,
            kind,
            signing_public_key: &bundle.signing_public,
            encr_public_key: &bundle.encr_public,
            valid_from: valid_from.to_rfc3339(),
            valid_until: valid_until.to_rfc3339(),
        };
        let endpoint = format!("{}/subscribe", self.base_url.trim_end_matches('/'));

        retry(&self.retry, || async {
            let resp = self
                .client
                .post(&endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| RelayError::Internal(format!("registry subscribe request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(RelayError::Internal(format!(
                    "registry subscribe returned status {}",
                    resp.status()
                )));
            }
            Ok(())
        })
        .await
    }

    /// Fetches a subscriber's stored record from the registry, used on a
    /// public-key cache miss (§4.7). Mirrors this system's own lookup
    /// contract exactly: POST `subscriber_id`, a JSON array holding the
    /// single stored `Subscription` on a hit.
    pub async fn lookup_subscription(&self, sub_id: &str) -> Result<Subscription, RelayError> {
        let endpoint = format!("{}/lookUp", self.base_url.trim_end_matches('/'));

        #[derive(Serialize)]
        struct LookupRequest<'a> {
            subscriber_id: &'a str,
        }

        let records: Vec<Subscription> = retry(&self.retry, || async {
            let resp = self
                .client
                .post(&endpoint)
                .json(&LookupRequest { subscriber_id: sub_id })
                .send()
                .await
                .map_err(|e| RelayError::Internal(format!("registry lookup request failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(RelayError::Internal(format!(
                    "registry lookup returned status {}",
                    resp.status()
                )));
            }
            resp.json::<Vec<Subscription>>()
                .await
                .map_err(|e| RelayError::Internal(format!("registry lookup body malformed: {e}")))
        })
        .await?;

        records
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::NotFound(format!("no registry record for {sub_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_max() {
        let cfg = RetryStrategyConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        for attempt in 0..10 {
            let delay = calculate_delay(&cfg, attempt);
            assert!(delay <= cfg.max_delay);
        }
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let cfg = RetryStrategyConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let mut calls = 0;
        let result: Result<(), RelayError> = retry(&cfg, || {
            calls += 1;
            async { Err(RelayError::Internal("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
