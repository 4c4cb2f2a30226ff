//! Message inspection pipeline.
//!
//! [`InspectionPipeline::inspect`] runs the detectors in priority order,
//! writes exactly one audit record, and then either rejects the message or
//! forwards it to the [`Responder`]. The audit write always happens before
//! the responder is called or the rejection is returned.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::audit::{self, AuditLog, Decision};
use crate::detect::{self, DetectionResult, Detector, ReasonCategory};
use crate::error::Result;
use crate::responder::Responder;

/// HTTP status returned for policy violations.
pub const REJECTED_STATUS: u16 = 403;

/// Result of inspecting one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message passed every detector; carries the backend reply.
    Allowed(String),
    /// The message was blocked.
    Rejected {
        status: u16,
        /// User-facing rejection text.
        message: String,
        category: ReasonCategory,
        detail: String,
    },
}

/// A decision broadcast to live subscribers (e.g., dashboard SSE).
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEvent {
    pub timestamp: String,
    pub decision: Decision,
    pub content: String,
    pub reason: Option<String>,
}

/// User-facing text for a blocked message. Embeds the detail, not the category.
pub fn rejection_message(detail: &str) -> String {
    format!("[BLOCKED] Security policy violation.\nReason: {}", detail)
}

pub struct InspectionPipeline {
    detectors: Vec<Box<dyn Detector>>,
    audit: Arc<AuditLog>,
    responder: Arc<dyn Responder>,
    events: Option<broadcast::Sender<DecisionEvent>>,
}

impl InspectionPipeline {
    pub fn new(
        detectors: Vec<Box<dyn Detector>>,
        audit: Arc<AuditLog>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            detectors,
            audit,
            responder,
            events: None,
        }
    }

    /// Pipeline with the built-in detectors for the given forbidden terms.
    pub fn with_default_detectors(
        forbidden_terms: &[String],
        audit: Arc<AuditLog>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self::new(detect::default_detectors(forbidden_terms), audit, responder)
    }

    /// Publish every decision on `tx`.
    pub fn with_events(mut self, tx: broadcast::Sender<DecisionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Inspect a message.
    ///
    /// Only a responder failure produces `Err`; by then the ALLOW record has
    /// already been written.
    pub async fn inspect(&self, message: &str) -> Result<Outcome> {
        match detect::first_match(&self.detectors, message) {
            DetectionResult::Blocked(reason) => {
                let labelled = reason.labelled();
                warn!("BLOCKED message ({})", labelled);
                self.record(Decision::Block, message, Some(&labelled));
                Ok(Outcome::Rejected {
                    status: REJECTED_STATUS,
                    message: rejection_message(&reason.detail),
                    category: reason.category,
                    detail: reason.detail,
                })
            }
            DetectionResult::Clear => {
                info!("ALLOWED message ({} chars)", message.chars().count());
                self.record(Decision::Allow, message, None);
                let reply = self.responder.reply(message).await.inspect_err(|e| {
                    warn!("Responder {} failed: {}", self.responder.name(), e);
                })?;
                Ok(Outcome::Allowed(reply))
            }
        }
    }

    /// Write the audit record and publish the event under one timestamp.
    fn record(&self, decision: Decision, message: &str, reason: Option<&str>) {
        let timestamp = audit::now_timestamp();
        self.audit.append_at(&timestamp, decision, message, reason);

        if let Some(tx) = &self.events {
            // No subscribers is fine.
            let _ = tx.send(DecisionEvent {
                timestamp,
                decision,
                content: message.to_string(),
                reason: reason.map(str::to_string),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::responder::MockResponder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn default_terms() -> Vec<String> {
        crate::config::DEFAULT_FORBIDDEN_TERMS
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    fn pipeline(dir: &tempfile::TempDir) -> InspectionPipeline {
        let audit = Arc::new(AuditLog::new(dir.path().join("audit_log.txt")));
        InspectionPipeline::with_default_detectors(&default_terms(), audit, Arc::new(MockResponder))
    }

    /// Responder that counts calls and checks the audit record already exists.
    struct CheckingResponder {
        audit: Arc<AuditLog>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Responder for CheckingResponder {
        async fn reply(&self, message: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let records = self.audit.read_all()?;
            assert_eq!(records.last().map(|r| r.content.as_str()), Some(message));
            Ok("ok".to_string())
        }

        fn name(&self) -> &str {
            "checking"
        }
    }

    struct FailingResponder;

    #[async_trait::async_trait]
    impl Responder for FailingResponder {
        async fn reply(&self, _message: &str) -> Result<String> {
            Err(GatewayError::Backend("down".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn password_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = pipeline(&dir).inspect("my password is 1234").await.unwrap();
        match outcome {
            Outcome::Rejected {
                status,
                message,
                category,
                detail,
            } => {
                assert_eq!(status, 403);
                assert_eq!(category, ReasonCategory::ForbiddenTerm);
                assert_eq!(detail, "password");
                assert!(message.contains("Reason: password"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn weather_question_is_allowed_and_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = pipeline(&dir)
            .inspect("What is the weather today?")
            .await
            .unwrap();
        match outcome {
            Outcome::Allowed(reply) => assert!(reply.contains("What is the weather today?")),
            other => panic!("expected allow, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_inspection_writes_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        p.inspect("hello").await.unwrap();
        p.inspect("SECRET plans").await.unwrap();
        p.inspect("func main() {}").await.unwrap();

        let records = p.audit().read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].decision, Decision::Allow);
        assert_eq!(records[1].decision, Decision::Block);
        assert_eq!(records[1].reason.as_deref(), Some("forbidden term: SECRET"));
        assert_eq!(
            records[2].reason.as_deref(),
            Some("source code: source code submission")
        );
    }

    #[tokio::test]
    async fn audit_is_written_before_responder() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("audit_log.txt")));
        let responder = Arc::new(CheckingResponder {
            audit: audit.clone(),
            calls: AtomicUsize::new(0),
        });
        let p = InspectionPipeline::with_default_detectors(
            &default_terms(),
            audit,
            responder.clone(),
        );

        assert_eq!(p.inspect("plain question").await.unwrap(), Outcome::Allowed("ok".into()));
        assert_eq!(responder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn responder_is_not_called_on_block() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("audit_log.txt")));
        let responder = Arc::new(CheckingResponder {
            audit: audit.clone(),
            calls: AtomicUsize::new(0),
        });
        let p = InspectionPipeline::with_default_detectors(
            &default_terms(),
            audit,
            responder.clone(),
        );

        p.inspect("contact me at a@b.com").await.unwrap();
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn responder_failure_still_logs_allow() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("audit_log.txt")));
        let p = InspectionPipeline::with_default_detectors(
            &default_terms(),
            audit.clone(),
            Arc::new(FailingResponder),
        );

        let err = p.inspect("hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::Backend(_)));
        let records = audit.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Allow);
    }

    #[tokio::test]
    async fn unwritable_log_does_not_block_response() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path().join("no-such-dir").join("log.txt")));
        let p = InspectionPipeline::with_default_detectors(
            &default_terms(),
            audit,
            Arc::new(MockResponder),
        );
        assert!(matches!(p.inspect("hello").await.unwrap(), Outcome::Allowed(_)));
        assert!(matches!(
            p.inspect("password").await.unwrap(),
            Outcome::Rejected { .. }
        ));
    }

    #[tokio::test]
    async fn decisions_are_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = broadcast::channel(8);
        let p = pipeline(&dir).with_events(tx);

        p.inspect("AKIA1234567890123456").await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.decision, Decision::Block);
        assert_eq!(event.content, "AKIA1234567890123456");
        assert_eq!(event.reason.as_deref(), Some("credential leak: API key leak"));
    }

    #[tokio::test]
    async fn event_timestamp_matches_audit_record() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = broadcast::channel(8);
        let p = pipeline(&dir).with_events(tx);

        p.inspect("hello").await.unwrap();
        p.inspect("SECRET plans").await.unwrap();

        let records = p.audit().read_all().unwrap();
        for record in &records {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.timestamp, record.timestamp);
            assert_eq!(event.decision, record.decision);
        }
    }
}
