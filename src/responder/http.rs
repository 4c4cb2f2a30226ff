use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::responder::Responder;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Forwards approved messages to an HTTP backend.
///
/// Sends `POST <url>` with body `{"message": "..."}` and returns the response
/// body as the reply text.
pub struct HttpResponder {
    url: String,
    client: reqwest::Client,
}

impl HttpResponder {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GatewayError::Backend(e.to_string()))?;
        Ok(Self { url, client })
    }
}

#[async_trait::async_trait]
impl Responder for HttpResponder {
    async fn reply(&self, message: &str) -> Result<String> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(GatewayError::Backend(format!(
                "backend returned {}: {}",
                status, body
            )));
        }

        resp.text()
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}
