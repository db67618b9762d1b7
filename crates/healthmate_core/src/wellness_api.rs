//! Client for the external wellness-content service (topic tips and diet
//! plans). Single timeout-bounded attempt per request; failures are
//! recoverable `Upstream` errors, never fatal to the caller.

use std::time::Duration;

use crate::HealthError;

#[derive(Clone, Debug)]
pub struct WellnessApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl WellnessApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build should not fail");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Fetch wellness advice for a topic ("sleep", "stress", ...).
    pub async fn get_health_tips(&self, topic: &str) -> Result<String, HealthError> {
        self.fetch_text("/tips", &[("topic", topic)]).await
    }

    /// Fetch a diet plan for a goal ("weight loss", "muscle gain", ...).
    pub async fn get_diet_plan(&self, goal: &str) -> Result<String, HealthError> {
        self.fetch_text("/diet", &[("goal", goal)]).await
    }

    async fn fetch_text(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String, HealthError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                metrics::counter!("healthmate_wellness_api_errors_total").increment(1);
                tracing::warn!(%url, error = %e, "wellness api request failed");
                HealthError::Upstream(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(256).collect();
            metrics::counter!("healthmate_wellness_api_errors_total").increment(1);
            return Err(HealthError::Upstream(format!(
                "status {}: {}",
                status.as_u16(),
                snippet
            )));
        }
        resp.text()
            .await
            .map_err(|e| HealthError::Upstream(e.to_string()))
    }
}
