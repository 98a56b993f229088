//! Batch mining of the execution log.
//!
//! Layout:
//!   .autonomy/learnings/latest.json          most recent report
//!   .autonomy/learnings/<report-id>.json     one file per extraction
//!   .autonomy/learnings/skill-scores.json    overwritten on every recompute
//!
//! Reads degrade to "no data"; write failures are logged and never raised.

pub mod engine;
mod extract;
pub mod types;

pub use engine::LearningEngine;
pub use types::{
    ConfigProposal, ExpectedImpact, Learning, LearningConfidence, LearningReport,
    LearningSummary, LearningType, RiskLevel, SkillScore, SkillTrend, TimeRange,
};
