//! Message detectors.
//!
//! A [`Detector`] maps message text to a [`DetectionResult`]. Detectors are
//! pure and total: they never fail and never touch shared state, so the
//! pipeline can run them from any request task.
//!
//! The built-in set lives in [`patterns`]; [`default_detectors`] returns it in
//! priority order.

pub mod patterns;

use serde::Serialize;

pub use patterns::{
    CredentialLeakDetector, ForbiddenTermDetector, PersonalDataDetector, SourceCodeDetector,
};

/// Category of a policy violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReasonCategory {
    ForbiddenTerm,
    PersonalData,
    CredentialLeak,
    SourceCode,
}

impl ReasonCategory {
    /// Label written in front of the detail in the audit log reason.
    pub fn label(self) -> &'static str {
        match self {
            ReasonCategory::ForbiddenTerm => "forbidden term",
            ReasonCategory::PersonalData => "personal data",
            ReasonCategory::CredentialLeak => "credential leak",
            ReasonCategory::SourceCode => "source code",
        }
    }

    pub const ALL: [ReasonCategory; 4] = [
        ReasonCategory::ForbiddenTerm,
        ReasonCategory::PersonalData,
        ReasonCategory::CredentialLeak,
        ReasonCategory::SourceCode,
    ];
}

/// Why a message was blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockReason {
    pub category: ReasonCategory,
    /// The matched term, or a fixed description for pattern detectors.
    pub detail: String,
}

impl BlockReason {
    pub fn new(category: ReasonCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            detail: detail.into(),
        }
    }

    /// Reason as stored in the audit log, e.g. `"forbidden term: password"`.
    pub fn labelled(&self) -> String {
        format!("{}: {}", self.category.label(), self.detail)
    }
}

/// Outcome of running one detector over a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    Clear,
    Blocked(BlockReason),
}

impl DetectionResult {
    pub fn blocked(category: ReasonCategory, detail: impl Into<String>) -> Self {
        DetectionResult::Blocked(BlockReason::new(category, detail))
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, DetectionResult::Clear)
    }
}

/// Trait for rules that classify outbound message text.
pub trait Detector: Send + Sync {
    fn classify(&self, text: &str) -> DetectionResult;

    /// Short identifier for logging.
    fn name(&self) -> &str;
}

/// The four built-in detectors in priority order.
pub fn default_detectors(forbidden_terms: &[String]) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(ForbiddenTermDetector::new(forbidden_terms.to_vec())),
        Box::new(PersonalDataDetector::new()),
        Box::new(CredentialLeakDetector::new()),
        Box::new(SourceCodeDetector::new()),
    ]
}

/// Run `detectors` in order and return the first block, or `Clear`.
pub fn first_match(detectors: &[Box<dyn Detector>], text: &str) -> DetectionResult {
    for detector in detectors {
        if let DetectionResult::Blocked(reason) = detector.classify(text) {
            tracing::debug!("{} matched: {}", detector.name(), reason.detail);
            return DetectionResult::Blocked(reason);
        }
    }
    DetectionResult::Clear
}
