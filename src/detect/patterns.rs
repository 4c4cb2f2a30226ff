//! Built-in detectors.
//!
//! | Priority | Detector | Blocks on |
//! |----------|----------|-----------|
//! | 1 | [`ForbiddenTermDetector`] | configured literal terms |
//! | 2 | [`PersonalDataDetector`] | email addresses |
//! | 3 | [`CredentialLeakDetector`] | Google API keys, AWS access key IDs |
//! | 4 | [`SourceCodeDetector`] | declaration keywords followed by ASCII whitespace |
//!
//! Pattern detectors report a fixed description rather than the matched
//! text, so a block reason never re-leaks the sensitive value.

use regex::Regex;

use super::{DetectionResult, Detector, ReasonCategory};

/// Blocks messages containing any configured term as a substring.
///
/// Matching is case-sensitive. Terms are tried in list order, so when
/// several match the earliest-listed one is reported.
pub struct ForbiddenTermDetector {
    terms: Vec<String>,
}

impl ForbiddenTermDetector {
    /// Empty terms are dropped; they would match every message.
    pub fn new(terms: Vec<String>) -> Self {
        let terms = terms.into_iter().filter(|t| !t.is_empty()).collect();
        Self { terms }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl Detector for ForbiddenTermDetector {
    fn classify(&self, text: &str) -> DetectionResult {
        self.terms
            .iter()
            .find(|term| text.contains(term.as_str()))
            .map(|term| DetectionResult::blocked(ReasonCategory::ForbiddenTerm, term.as_str()))
            .unwrap_or(DetectionResult::Clear)
    }

    fn name(&self) -> &str {
        "forbidden-term"
    }
}

/// Blocks messages containing an email address.
pub struct PersonalDataDetector {
    email: Regex,
}

impl PersonalDataDetector {
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
                .expect("static regex"),
        }
    }
}

impl Default for PersonalDataDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for PersonalDataDetector {
    fn classify(&self, text: &str) -> DetectionResult {
        if self.email.is_match(text) {
            DetectionResult::blocked(ReasonCategory::PersonalData, "email address leak")
        } else {
            DetectionResult::Clear
        }
    }

    fn name(&self) -> &str {
        "personal-data"
    }
}

/// Blocks messages containing a Google API key or an AWS access key ID.
pub struct CredentialLeakDetector {
    patterns: Vec<Regex>,
}

impl CredentialLeakDetector {
    pub fn new() -> Self {
        let patterns = [
            // Google API key
            r"AIza[0-9A-Za-z_-]{35}",
            // AWS access key ID
            r"AKIA[0-9A-Z]{16}",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect();
        Self { patterns }
    }
}

impl Default for CredentialLeakDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for CredentialLeakDetector {
    fn classify(&self, text: &str) -> DetectionResult {
        if self.patterns.iter().any(|re| re.is_match(text)) {
            DetectionResult::blocked(ReasonCategory::CredentialLeak, "API key leak")
        } else {
            DetectionResult::Clear
        }
    }

    fn name(&self) -> &str {
        "credential-leak"
    }
}

/// Blocks messages that look like pasted source code.
///
/// This is a keyword heuristic, so prose such as "the public library"
/// is blocked too.
pub struct SourceCodeDetector {
    keywords: Regex,
}

impl SourceCodeDetector {
    pub fn new() -> Self {
        Self {
            // ASCII whitespace only; an ideographic or no-break space does not count.
            keywords: Regex::new(r"(func|class|import|package|def|public|private)[\t\n\f\r ]+")
                .expect("static regex"),
        }
    }
}

impl Default for SourceCodeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for SourceCodeDetector {
    fn classify(&self, text: &str) -> DetectionResult {
        if self.keywords.is_match(text) {
            DetectionResult::blocked(ReasonCategory::SourceCode, "source code submission")
        } else {
            DetectionResult::Clear
        }
    }

    fn name(&self) -> &str {
        "source-code"
    }
}
