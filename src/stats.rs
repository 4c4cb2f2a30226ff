//! Audit log aggregation.
//!
//! [`summarize`] folds parsed [`AuditRecord`]s into a [`Summary`]. Nothing is
//! cached: callers re-read the log and summarize again on every request.

use std::collections::HashMap;

use serde::Serialize;

use crate::audit::{AuditRecord, Decision};

/// Aggregated decision counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Always `block_count + allow_count`.
    pub total: usize,
    pub block_count: usize,
    pub allow_count: usize,
    /// Block count per reason key, including the uncategorized bucket.
    pub reason_ranking: HashMap<String, usize>,
}

impl Summary {
    /// Ranking entries sorted by count (descending), then key.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .reason_ranking
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

/// Count decisions and block reasons in a single pass.
pub fn summarize(records: &[AuditRecord]) -> Summary {
    let mut summary = Summary::default();
    for record in records {
        match record.decision {
            Decision::Block => {
                summary.block_count += 1;
                let key = record
                    .reason_key
                    .as_deref()
                    .unwrap_or(crate::audit::UNCATEGORIZED_REASON);
                *summary.reason_ranking.entry(key.to_string()).or_insert(0) += 1;
            }
            Decision::Allow => summary.allow_count += 1,
        }
    }
    summary.total = summary.block_count + summary.allow_count;
    summary
}
