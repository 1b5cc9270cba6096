use chrono::Utc;
use relay_core::config::ObservabilityConfig;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

/// Batched access-log exporter. A true no-op when no endpoint is configured:
/// no channel, no task, `log_request` becomes a branch-predicted no-op.
pub struct AccessLogExporter {
    sender: Option<mpsc::Sender<serde_json::Value>>,
}

impl AccessLogExporter {
    pub fn new(config: &ObservabilityConfig) -> Self {
        let Some(endpoint) = config.access_log_endpoint.clone() else {
            return Self { sender: None };
        };
        let (tx, rx) = mpsc::channel(10_000);
        tokio::spawn(Self::flush_loop(
            endpoint,
            config.access_log_batch_size,
            config.access_log_flush_interval_secs,
            rx,
        ));
        Self { sender: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn log_request(&self, module: &str, method: &str, uri: &str, status: u16, latency_ms: f64, sub_id: &str) {
        let Some(sender) = &self.sender else {
            return;
        };
        let entry = json!({
            "_msg": format!("{method} {uri} {status} {latency_ms:.2}ms"),
            "_time": Utc::now().to_rfc3339(),
            "level": "info",
            "type": "access",
            "module": module,
            "method": method,
            "uri": uri,
            "status": status,
            "latency_ms": latency_ms,
            "subscriber_id": sub_id,
        });
        let _ = sender.try_send(entry);
    }

    async fn flush_loop(endpoint: String, batch_size: usize, flush_interval_secs: u64, mut rx: mpsc::Receiver<serde_json::Value>) {
        let client = reqwest::Client::new();
        let mut batch: Vec<serde_json::Value> = Vec::with_capacity(batch_size);
        let mut tick = interval(Duration::from_secs(flush_interval_secs));

        loop {
            tokio::select! {
                Some(entry) = rx.recv() => {
                    batch.push(entry);
                    if batch.len() >= batch_size {
                        Self::flush(&client, &endpoint, &mut batch).await;
                    }
                }
                _ = tick.tick() => {
                    if !batch.is_empty() {
                        Self::flush(&client, &endpoint, &mut batch).await;
                    }
                }
            }
        }
    }

    async fn flush(client: &reqwest::Client, endpoint: &str, batch: &mut Vec<serde_json::Value>) {
        if batch.is_empty() {
            return;
        }
        let mut body = String::new();
        for entry in batch.iter() {
            body.push_str(&serde_json::to_string(entry).unwrap_or_default());
            body.push('\n');
        }
        let count = batch.len();
        match client.post(endpoint).header("Content-Type", "application/stream+json").body(body).send().await {
            Ok(resp) if resp.status().is_success() => debug!(count, "flushed access log batch"),
            Ok(resp) => error!(status = %resp.status(), "access log flush rejected"),
            Err(e) => error!(error = %e, "access log flush error"),
        }
        batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_exporter_has_no_sender() {
        let exporter = AccessLogExporter::disabled();
        exporter.log_request("search", "POST", "/search", 200, 1.5, "sub-1");
    }

    #[test]
    fn config_without_endpoint_is_disabled() {
        let config = ObservabilityConfig {
            metrics_enabled: true,
            metrics_path: "/metrics".into(),
            access_log_endpoint: None,
            access_log_batch_size: 10,
            access_log_flush_interval_secs: 1,
        };
        let exporter = AccessLogExporter::new(&config);
        assert!(exporter.sender.is_none());
    }
}
