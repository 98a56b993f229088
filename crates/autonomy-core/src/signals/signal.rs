use crate::types::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SignalType / SignalSource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Error,
    Metric,
    Event,
    Alert,
    Log,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Error => "error",
            SignalType::Metric => "metric",
            SignalType::Event => "event",
            SignalType::Alert => "alert",
            SignalType::Log => "log",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Sentry,
    Posthog,
    Vercel,
    Github,
    Local,
    Manual,
}

impl SignalSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalSource::Sentry => "sentry",
            SignalSource::Posthog => "posthog",
            SignalSource::Vercel => "vercel",
            SignalSource::Github => "github",
            SignalSource::Local => "local",
            SignalSource::Manual => "manual",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// An observation from an external system or internal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub source: SignalSource,
    #[serde(default)]
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Signal {
    pub fn new(
        signal_type: SignalType,
        source: SignalSource,
        priority: Priority,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            signal_type,
            source,
            priority,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// String field of the payload, if present.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_signal_has_unique_id() {
        let a = Signal::new(
            SignalType::Error,
            SignalSource::Sentry,
            Priority::High,
            serde_json::Value::Null,
        );
        let b = Signal::new(
            SignalType::Error,
            SignalSource::Sentry,
            Priority::High,
            serde_json::Value::Null,
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn signal_json_shape() {
        let line = r#"{"id":"s1","type":"event","source":"vercel","priority":"critical","timestamp":"2026-03-01T00:00:00Z","payload":{"status":"failure"}}"#;
        let s: Signal = serde_json::from_str(line).unwrap();
        assert_eq!(s.signal_type, SignalType::Event);
        assert_eq!(s.source, SignalSource::Vercel);
        assert_eq!(s.payload_str("status"), Some("failure"));

        let out = serde_json::to_string(&s).unwrap();
        assert!(out.contains("\"type\":\"event\""));
    }

    #[test]
    fn priority_and_payload_default() {
        let line = r#"{"id":"s2","type":"metric","source":"posthog","timestamp":"2026-03-01T00:00:00Z"}"#;
        let s: Signal = serde_json::from_str(line).unwrap();
        assert_eq!(s.priority, Priority::Medium);
        assert!(s.payload.is_null());
    }
}
