//! ThingSpeak channel-update sink.
//!
//! Submits one flat record per call as form fields on the update endpoint.
//! The endpoint accepts at most one update per rate-limit window and answers
//! a rejected update with a body of `"0"`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_domain::{OutputRecord, RecordSink, RelayError, RelayResult};
use tracing::debug;

/// Sink settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ThingSpeakSettings {
    pub update_url: String,
    /// Channel id, used for log attribution only; the write key selects the
    /// channel on the wire.
    pub channel_id: u64,
    pub api_key: String,
    pub http_timeout: Duration,
}

pub struct ThingSpeakSink {
    client: reqwest::Client,
    settings: ThingSpeakSettings,
}

impl ThingSpeakSink {
    pub fn new(settings: ThingSpeakSettings) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("telemetry-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.http_timeout)
            .build()
            .map_err(|err| {
                RelayError::Infrastructure(anyhow::anyhow!("HTTP client setup failed: {err}"))
            })?;

        Ok(Self { client, settings })
    }

    /// Boxed constructor for wiring into the pipeline.
    pub fn into_sink(self) -> Arc<dyn RecordSink> {
        Arc::new(self)
    }
}

/// Render the record as update form parameters, write key first.
fn form_params(api_key: &str, record: &OutputRecord) -> Vec<(String, String)> {
    let mut params = Vec::with_capacity(record.len() + 1);
    params.push(("api_key".to_string(), api_key.to_string()));

    for (slot, value) in &record.slots {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        params.push((slot.clone(), rendered));
    }

    params
}

#[async_trait]
impl RecordSink for ThingSpeakSink {
    async fn submit(&self, record: &OutputRecord) -> RelayResult<()> {
        let params = form_params(&self.settings.api_key, record);

        let response = self
            .client
            .post(&self.settings.update_url)
            .form(&params)
            .send()
            .await
            .map_err(|err| RelayError::Submission(format!("update request failed: {err}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RelayError::Submission(
                "endpoint rate limited the request".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(RelayError::Submission(format!(
                "endpoint returned status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|err| RelayError::Submission(format!("unreadable response body: {err}")))?;

        // A body of "0" means the update was rejected, typically because the
        // channel's rate-limit window has not elapsed.
        let entry = body.trim();
        if entry == "0" {
            return Err(RelayError::Submission(
                "endpoint rejected the update (rate limit window)".to_string(),
            ));
        }

        debug!(
            channel_id = self.settings.channel_id,
            entry = %entry,
            "update accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> OutputRecord {
        OutputRecord {
            slots: value.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_form_params_start_with_the_write_key() {
        let params = form_params("WRITEKEY", &record(json!({"field1": 21.5})));
        assert_eq!(params[0], ("api_key".to_string(), "WRITEKEY".to_string()));
    }

    #[test]
    fn test_numeric_values_render_in_json_notation() {
        let params = form_params("k", &record(json!({"field1": 21.5, "field2": 40})));

        assert!(params.contains(&("field1".to_string(), "21.5".to_string())));
        assert!(params.contains(&("field2".to_string(), "40".to_string())));
    }

    #[test]
    fn test_string_values_render_unquoted() {
        let params = form_params("k", &record(json!({"field4": "auto"})));
        assert!(params.contains(&("field4".to_string(), "auto".to_string())));
    }

    #[test]
    fn test_empty_record_carries_only_the_key() {
        let params = form_params("k", &OutputRecord::default());
        assert_eq!(params.len(), 1);
    }
}
