use crate::error::{AutonomyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Urgency shared by signals, patterns, and candidate tasks.
///
/// Ordering is ascending: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn all() -> &'static [Priority] {
        &[
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Critical,
        ]
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AutonomyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(AutonomyError::InvalidValue(format!(
                "unknown priority '{s}': must be low, medium, high, or critical"
            ))),
        }
    }
}

/// Round to two decimals for stable report output.
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Clamp a score into `[0, 100]`.
pub(crate) fn clamp_score(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn priority_from_str() {
        for &p in Priority::all() {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
        }
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_serde_snake_case() {
        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn clamp_and_round() {
        assert_eq!(clamp_score(-12.0), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(round2(66.6666), 66.67);
    }
}
