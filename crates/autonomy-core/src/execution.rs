//! Execution log records.
//!
//! Layout:
//!   .autonomy/logs/executions.jsonl   one record per line, append-only
//!
//! The log is written by the surrounding orchestration. The engines only read
//! it; a missing file or a malformed line means "no data", never an error.

use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub task_type: String,
    pub agent_type: String,
    pub success: bool,
    /// Wall-clock duration in milliseconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

/// Load execution records with `timestamp >= since` (all records when `None`).
///
/// I/O failures are logged and treated as an empty log.
pub fn load_executions(path: &Path, since: Option<DateTime<Utc>>) -> Vec<ExecutionRecord> {
    let records: Vec<ExecutionRecord> = match io::read_jsonl(path) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "failed to read execution log");
            return Vec::new();
        }
    };
    match since {
        Some(since) => records
            .into_iter()
            .filter(|r| r.timestamp >= since)
            .collect(),
        None => records,
    }
}

/// Append a record to the execution log.
pub fn append_execution(path: &Path, record: &ExecutionRecord) -> crate::Result<()> {
    io::append_jsonl(path, record)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn record(id: &str, ts: DateTime<Utc>) -> ExecutionRecord {
        ExecutionRecord {
            id: id.to_string(),
            task_type: "feature".to_string(),
            agent_type: "builder".to_string(),
            success: true,
            duration: 1200.0,
            confidence_score: Some(91.0),
            timestamp: ts,
            error: None,
            files: None,
        }
    }

    #[test]
    fn parses_camel_case_fields() {
        let line = r#"{"id":"e1","taskType":"bugfix","agentType":"fixer","success":false,"duration":300,"confidenceScore":72.5,"timestamp":"2026-03-01T10:00:00Z","error":"Request timed out"}"#;
        let rec: ExecutionRecord = serde_json::from_str(line).unwrap();
        assert_eq!(rec.task_type, "bugfix");
        assert_eq!(rec.agent_type, "fixer");
        assert_eq!(rec.confidence_score, Some(72.5));
        assert_eq!(rec.error.as_deref(), Some("Request timed out"));
        assert!(rec.files.is_none());
    }

    #[test]
    fn load_filters_by_since() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("executions.jsonl");
        let now = Utc::now();
        append_execution(&path, &record("old", now - Duration::days(40))).unwrap();
        append_execution(&path, &record("new", now - Duration::days(1))).unwrap();

        let all = load_executions(&path, None);
        assert_eq!(all.len(), 2);

        let recent = load_executions(&path, Some(now - Duration::days(30)));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "new");
    }

    #[test]
    fn load_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_executions(&dir.path().join("missing.jsonl"), None).is_empty());
    }
}
