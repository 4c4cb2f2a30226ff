//! AI backend abstraction.
//!
//! The pipeline hands every approved message to a [`Responder`] and returns
//! its reply verbatim. Responders know nothing about policy.
//!
//! - [`MockResponder`] — canned echo reply; the default
//! - [`http::HttpResponder`] — forwards the message to an HTTP backend

pub mod http;

use std::sync::Arc;

use crate::config::{ResponderConfig, ResponderKind};
use crate::error::{GatewayError, Result};

/// Trait for chat backends.
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for an approved message.
    async fn reply(&self, message: &str) -> Result<String>;
    /// Backend name for logging (e.g., `"mock"`).
    fn name(&self) -> &str;
}

/// Echoes the message back inside a fixed reply.
#[derive(Debug, Default, Clone)]
pub struct MockResponder;

impl MockResponder {
    pub fn format_reply(message: &str) -> String {
        format!(
            "[AI] (mock response)\nReceived: \"{}\".\nThis content complies with policy.",
            message
        )
    }
}

#[async_trait::async_trait]
impl Responder for MockResponder {
    async fn reply(&self, message: &str) -> Result<String> {
        Ok(Self::format_reply(message))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build the responder selected by the `[responder]` config section.
pub fn from_config(config: &ResponderConfig) -> Result<Arc<dyn Responder>> {
    match config.kind {
        ResponderKind::Mock => Ok(Arc::new(MockResponder)),
        ResponderKind::Http => {
            let url = config.url.clone().ok_or_else(|| {
                GatewayError::Backend("responder.url is required for kind = \"http\"".to_string())
            })?;
            Ok(Arc::new(http::HttpResponder::new(
                url,
                config.timeout_secs.unwrap_or(http::DEFAULT_TIMEOUT_SECS),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_reply_echoes_message() {
        let reply = MockResponder.reply("What is the weather today?").await.unwrap();
        assert!(reply.contains("What is the weather today?"));
        assert!(reply.starts_with("[AI] (mock response)"));
    }

    #[test]
    fn default_config_builds_mock() {
        let responder = from_config(&ResponderConfig::default()).unwrap();
        assert_eq!(responder.name(), "mock");
    }

    #[test]
    fn http_without_url_is_an_error() {
        let config = ResponderConfig {
            kind: ResponderKind::Http,
            url: None,
            timeout_secs: None,
        };
        let err = from_config(&config).err().unwrap();
        assert!(matches!(err, GatewayError::Backend(_)));
    }

    #[test]
    fn http_with_url_builds_http() {
        let config = ResponderConfig {
            kind: ResponderKind::Http,
            url: Some("http://127.0.0.1:9/reply".to_string()),
            timeout_secs: Some(2),
        };
        let responder = from_config(&config).unwrap();
        assert_eq!(responder.name(), "http");
    }
}
