use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Learning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LearningType {
    Pattern,
    AntiPattern,
    Optimization,
    FailureMode,
    SuccessFactor,
}

impl LearningType {
    pub fn as_str(self) -> &'static str {
        match self {
            LearningType::Pattern => "pattern",
            LearningType::AntiPattern => "anti-pattern",
            LearningType::Optimization => "optimization",
            LearningType::FailureMode => "failure-mode",
            LearningType::SuccessFactor => "success-factor",
        }
    }
}

impl fmt::Display for LearningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much evidence backs a learning. Unrelated to confidence scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningConfidence {
    Low,
    Medium,
    High,
}

impl LearningConfidence {
    /// high: ≥20 samples and ≥30% share; medium: ≥10 and ≥20%; else low.
    pub fn classify(samples: usize, population: usize) -> Self {
        let share = if population == 0 {
            0.0
        } else {
            samples as f64 / population as f64
        };
        if samples >= 20 && share >= 0.30 {
            LearningConfidence::High
        } else if samples >= 10 && share >= 0.20 {
            LearningConfidence::Medium
        } else {
            LearningConfidence::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LearningConfidence::Low => "low",
            LearningConfidence::Medium => "medium",
            LearningConfidence::High => "high",
        }
    }
}

impl fmt::Display for LearningConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learning {
    pub id: String,
    #[serde(rename = "type")]
    pub learning_type: LearningType,
    pub title: String,
    pub description: String,
    pub confidence: LearningConfidence,
    pub sample_size: usize,
    pub evidence: Vec<String>,
    pub suggested_actions: Vec<String>,
    pub applicability: Vec<String>,
    pub time_range: TimeRange,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSummary {
    pub by_type: BTreeMap<LearningType, usize>,
    pub by_confidence: BTreeMap<LearningConfidence, usize>,
    pub top_patterns: Vec<String>,
    pub critical_anti_patterns: Vec<String>,
    pub recommended_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningReport {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub time_range: TimeRange,
    pub total_executions: usize,
    pub learnings: Vec<Learning>,
    pub summary: LearningSummary,
}

// ---------------------------------------------------------------------------
// ConfigProposal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedImpact {
    /// Share of executions (0–100) that would auto-execute, before and after.
    pub auto_execute_share_before: f64,
    pub auto_execute_share_after: f64,
    /// Success rate (0–100) among the would-be auto-executed executions.
    pub precision: f64,
}

/// Advisory configuration change. Never applied automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProposal {
    pub id: String,
    /// Dotted config key, e.g. `confidence.thresholds.auto_execute`.
    pub target: String,
    pub current_value: serde_json::Value,
    pub proposed_value: serde_json::Value,
    pub reasoning: String,
    pub expected_impact: ExpectedImpact,
    pub risk: RiskLevel,
    pub auto_apply: bool,
}

// ---------------------------------------------------------------------------
// SkillScore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTrend {
    Improving,
    Stable,
    Declining,
}

impl fmt::Display for SkillTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkillTrend::Improving => "improving",
            SkillTrend::Stable => "stable",
            SkillTrend::Declining => "declining",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillScore {
    pub agent_type: String,
    /// Overall success rate, 0–100.
    pub score: f64,
    /// Success rate (0–100) per task type.
    pub task_breakdown: BTreeMap<String, f64>,
    pub trend: SkillTrend,
    pub sample_size: usize,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_bands() {
        assert_eq!(LearningConfidence::classify(20, 60), LearningConfidence::High);
        assert_eq!(LearningConfidence::classify(20, 100), LearningConfidence::Medium);
        assert_eq!(LearningConfidence::classify(10, 50), LearningConfidence::Medium);
        assert_eq!(LearningConfidence::classify(10, 60), LearningConfidence::Low);
        assert_eq!(LearningConfidence::classify(9, 9), LearningConfidence::Low);
        assert_eq!(LearningConfidence::classify(0, 0), LearningConfidence::Low);
    }

    #[test]
    fn learning_type_serializes_kebab() {
        let json = serde_json::to_string(&LearningType::AntiPattern).unwrap();
        assert_eq!(json, "\"anti-pattern\"");
        assert_eq!(LearningType::FailureMode.to_string(), "failure-mode");
    }
}
