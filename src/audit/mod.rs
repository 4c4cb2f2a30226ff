//! Append-only audit log.
//!
//! Every inspected message is recorded as one line of text:
//!
//! ```text
//! [2026-02-12 10:00:00] [BLOCK] content: my password is 1234 (forbidden term: password)
//! [2026-02-12 10:00:05] [ALLOW] content: What is the weather today?
//! ```
//!
//! The reason is not a separate column; it rides at the end of the content
//! field in parentheses. [`parse_line`] recovers it by scanning for the last
//! `(`/`)` pair, which keeps older logs (including lines written with the
//! `内容: ` marker and `検知: `/`禁止用語: ` labels) readable.
//!
//! Writes go through [`AuditLog::append`], which serializes appenders behind a
//! mutex and never reports failure to the caller. Reads take no lock; a
//! half-written trailing line has no `]` yet and is skipped.
//!
//! The [`export`] submodule renders records as JSON or CSV.

pub mod export;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

use crate::detect::ReasonCategory;

/// Marker preceding the message text in a log line.
pub const CONTENT_MARKER: &str = "content: ";

/// Content marker used by older logs.
const LEGACY_CONTENT_MARKER: &str = "内容: ";

/// Ranking bucket for BLOCK lines without a parenthesized reason.
pub const UNCATEGORIZED_REASON: &str = "other";

/// Reason labels understood in addition to [`ReasonCategory::label`].
const LEGACY_REASON_LABELS: &[(&str, Option<ReasonCategory>)] = &[
    ("禁止用語: ", Some(ReasonCategory::ForbiddenTerm)),
    ("検知: ", None),
    ("detected: ", None),
];

/// Timestamp layout of the first bracketed column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Gateway decision for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Block,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Block => "BLOCK",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One decision reconstructed from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// `YYYY-MM-DD HH:MM:SS`, or empty for lines too short to carry one.
    pub timestamp: String,
    pub decision: Decision,
    /// Message text, without the trailing ` (<reason>)`.
    pub content: String,
    /// Raw reason as written, e.g. `"forbidden term: password"`.
    pub reason: Option<String>,
    /// Reason with its label stripped; used for ranking. `None` for ALLOW.
    pub reason_key: Option<String>,
    /// Category recovered from the reason label, when the label names one.
    pub category: Option<ReasonCategory>,
}

/// Format a single log line (without the trailing newline).
///
/// Line breaks inside `content` are flattened to spaces so that one record
/// always occupies exactly one line.
pub fn format_line(
    timestamp: &str,
    decision: Decision,
    content: &str,
    reason: Option<&str>,
) -> String {
    let content = content.replace(['\r', '\n'], " ");
    match reason {
        Some(reason) => format!("[{timestamp}] [{decision}] {CONTENT_MARKER}{content} ({reason})"),
        None => format!("[{timestamp}] [{decision}] {CONTENT_MARKER}{content}"),
    }
}

/// Split a raw reason into its ranking key and category.
///
/// At most one known label is removed from the front. Unknown labels are
/// kept verbatim so they still rank as their own bucket.
pub fn reason_key(raw: &str) -> (String, Option<ReasonCategory>) {
    for category in ReasonCategory::ALL {
        let label = format!("{}: ", category.label());
        if let Some(rest) = raw.strip_prefix(label.as_str()) {
            return (rest.to_string(), Some(category));
        }
    }
    for (label, category) in LEGACY_REASON_LABELS {
        if let Some(rest) = raw.strip_prefix(label) {
            return (rest.to_string(), *category);
        }
    }
    (raw.to_string(), None)
}

/// Parse one log line. Returns `None` for blank or structurally broken lines.
pub fn parse_line(line: &str) -> Option<AuditRecord> {
    if line.is_empty() || !line.contains(']') {
        return None;
    }

    let decision = if line.contains("[BLOCK]") {
        Decision::Block
    } else {
        Decision::Allow
    };

    let mut reason = None;
    let mut reason_key_value = None;
    let mut category = None;
    if decision == Decision::Block {
        match (line.rfind('('), line.rfind(')')) {
            (Some(start), Some(end)) if end > start => {
                let raw = &line[start + 1..end];
                let (key, cat) = reason_key(raw);
                reason = Some(raw.to_string());
                reason_key_value = Some(key);
                category = cat;
            }
            _ => reason_key_value = Some(UNCATEGORIZED_REASON.to_string()),
        }
    }

    let timestamp = line.get(1..20).unwrap_or("").to_string();

    let marker_pos = [CONTENT_MARKER, LEGACY_CONTENT_MARKER]
        .into_iter()
        .filter_map(|m| line.rfind(m).map(|idx| idx + m.len()))
        .max();
    let mut content = marker_pos.map(|pos| &line[pos..]).unwrap_or("");
    if let Some(raw) = &reason {
        let suffix = format!(" ({raw})");
        content = content.strip_suffix(suffix.as_str()).unwrap_or(content);
    }

    Some(AuditRecord {
        timestamp,
        decision,
        content: content.to_string(),
        reason,
        reason_key: reason_key_value,
        category,
    })
}

/// Parse a whole log, dropping lines that fail [`parse_line`].
pub fn parse_log(text: &str) -> Vec<AuditRecord> {
    text.lines().filter_map(parse_line).collect()
}

/// Handle to the audit log file.
///
/// Cloning is not supported; share it behind an `Arc` so that every writer
/// goes through the same lock.
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a decision stamped with the current local time.
    ///
    /// Failures are traced and swallowed; the caller always proceeds.
    pub fn append(&self, decision: Decision, content: &str, reason: Option<&str>) {
        self.append_at(&now_timestamp(), decision, content, reason);
    }

    /// Append a decision with a caller-supplied timestamp in [`TIMESTAMP_FORMAT`].
    ///
    /// Failures are traced and swallowed, as for [`AuditLog::append`].
    pub fn append_at(
        &self,
        timestamp: &str,
        decision: Decision,
        content: &str,
        reason: Option<&str>,
    ) {
        let line = format_line(timestamp, decision, content, reason);
        if let Err(e) = self.append_line(&line) {
            warn!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }

    /// Append a preformatted line. The file is opened and closed per call.
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes())
    }

    /// Read every record in file order. A missing file reads as empty.
    pub fn read_all(&self) -> crate::error::Result<Vec<AuditRecord>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(parse_log(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// The `limit` most recent records, newest first.
    pub fn read_recent(&self, limit: usize) -> crate::error::Result<Vec<AuditRecord>> {
        let mut records = self.read_all()?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }
}
