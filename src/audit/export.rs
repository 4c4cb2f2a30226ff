use serde::Serialize;

use super::AuditRecord;

#[derive(Debug, Serialize)]
struct ExportEntry<'a> {
    timestamp: &'a str,
    decision: &'a str,
    content: &'a str,
    reason: &'a str,
}

impl<'a> From<&'a AuditRecord> for ExportEntry<'a> {
    fn from(record: &'a AuditRecord) -> Self {
        ExportEntry {
            timestamp: &record.timestamp,
            decision: record.decision.as_str(),
            content: &record.content,
            reason: record.reason.as_deref().unwrap_or(""),
        }
    }
}

/// Export records as a pretty-printed JSON array.
pub fn export_json(records: &[AuditRecord]) -> crate::error::Result<String> {
    let entries: Vec<ExportEntry<'_>> = records.iter().map(ExportEntry::from).collect();
    let json = serde_json::to_string_pretty(&entries)?;
    Ok(json)
}

/// Export records as CSV with a header row.
pub fn export_csv(records: &[AuditRecord]) -> String {
    let mut output = String::from("timestamp,decision,content,reason\n");
    for record in records {
        let entry = ExportEntry::from(record);
        output.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(entry.timestamp),
            entry.decision,
            csv_field(entry.content),
            csv_field(entry.reason),
        ));
    }
    output
}

/// Quote a field if it contains a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
