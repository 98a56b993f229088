use super::extract::{extract_all, ExtractContext};
use super::types::{
    ConfigProposal, ExpectedImpact, Learning, LearningConfidence, LearningReport, LearningSummary,
    LearningType, RiskLevel, SkillScore, SkillTrend, TimeRange,
};
use crate::config::{ConfidenceThresholds, LearningConfig};
use crate::error::Result;
use crate::execution::{load_executions, ExecutionRecord};
use crate::types::round2;
use crate::{io, paths};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Auto-execute thresholds searched by `propose_config_updates`, lowest first.
const CANDIDATE_THRESHOLDS: [f64; 4] = [80.0, 85.0, 90.0, 95.0];
const TARGET_PRECISION: f64 = 0.95;
const TREND_WINDOW: usize = 10;
const TREND_SWING: f64 = 5.0;
const TOP_PATTERNS: usize = 3;
const MAX_RECOMMENDATIONS: usize = 5;

/// Batch miner over the execution log. Writes only under
/// `.autonomy/learnings/`.
pub struct LearningEngine {
    root: PathBuf,
    config: LearningConfig,
}

impl LearningEngine {
    pub fn new(root: impl Into<PathBuf>, config: LearningConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Start of the configured lookback. A non-positive setting falls back
    /// to the default; one past the representable range reads the whole log.
    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut days = self.config.default_lookback_days;
        if days <= 0 {
            let fallback = LearningConfig::default().default_lookback_days;
            tracing::warn!(days, fallback, "non-positive learning lookback, using default");
            days = fallback;
        }
        Duration::try_days(days)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or_else(|| {
                tracing::warn!(days, "learning lookback out of range, reading full log");
                DateTime::<Utc>::MIN_UTC
            })
    }

    fn load_window(&self, since: DateTime<Utc>) -> Vec<ExecutionRecord> {
        load_executions(&paths::executions_log(&self.root), Some(since))
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    /// Mine executions in `[since, now]` (default: the configured lookback)
    /// and persist the report.
    pub fn extract_learnings(&self, since: Option<DateTime<Utc>>) -> LearningReport {
        let now = Utc::now();
        let start = since.unwrap_or_else(|| self.window_start(now));
        let records: Vec<ExecutionRecord> = self
            .load_window(start)
            .into_iter()
            .filter(|r| r.timestamp <= now)
            .collect();

        let ctx = ExtractContext {
            min_sample_size: self.config.min_sample_size,
            time_range: TimeRange { start, end: now },
            now,
        };
        let learnings = extract_all(&records, &ctx);
        tracing::debug!(
            executions = records.len(),
            learnings = learnings.len(),
            "learning extraction finished"
        );

        let report = LearningReport {
            id: format!("learning-{}", now.format("%Y%m%dT%H%M%S%3fZ")),
            generated_at: now,
            time_range: ctx.time_range,
            total_executions: records.len(),
            summary: summarize(&learnings),
            learnings,
        };
        self.persist_report(&report);
        report
    }

    fn persist_report(&self, report: &LearningReport) {
        let dir = paths::learnings_dir(&self.root);
        for path in [dir.join(format!("{}.json", report.id)), dir.join(paths::LATEST_FILE)] {
            if let Err(e) = io::write_json(&path, report) {
                tracing::error!(error = %e, path = %path.display(), "failed to persist learning report");
            }
        }
    }

    pub fn latest_report(&self) -> Result<Option<LearningReport>> {
        io::read_json(&paths::learnings_dir(&self.root).join(paths::LATEST_FILE))
    }

    // -----------------------------------------------------------------------
    // Config proposals
    // -----------------------------------------------------------------------

    /// Advisory threshold changes backed by the lookback window. Nothing is
    /// applied; every proposal carries `auto_apply: false`.
    pub fn propose_config_updates(&self, current: &ConfidenceThresholds) -> Vec<ConfigProposal> {
        let records = self.load_window(self.window_start(Utc::now()));
        let mut proposals = Vec::new();
        proposals.extend(self.propose_auto_execute_threshold(&records, current));
        proposals.extend(self.propose_signal_weights(&records));
        proposals
    }

    fn propose_auto_execute_threshold(
        &self,
        records: &[ExecutionRecord],
        current: &ConfidenceThresholds,
    ) -> Option<ConfigProposal> {
        let scored: Vec<(f64, bool)> = records
            .iter()
            .filter_map(|r| r.confidence_score.map(|s| (s, r.success)))
            .collect();
        if scored.is_empty() {
            return None;
        }

        let (threshold, precision, sample) = CANDIDATE_THRESHOLDS
            .iter()
            .filter(|t| **t >= current.notify)
            .find_map(|&t| {
                let above: Vec<bool> = scored.iter().filter(|(s, _)| *s >= t).map(|(_, ok)| *ok).collect();
                if above.len() < self.config.min_sample_size.max(1) {
                    return None;
                }
                let precision = above.iter().filter(|ok| **ok).count() as f64 / above.len() as f64;
                (precision >= TARGET_PRECISION).then_some((t, precision, above.len()))
            })?;
        if threshold >= current.auto_execute {
            return None;
        }

        let share = |t: f64| {
            round2(scored.iter().filter(|(s, _)| *s >= t).count() as f64 / scored.len() as f64 * 100.0)
        };
        let drop = current.auto_execute - threshold;
        let risk = if drop >= 10.0 {
            RiskLevel::High
        } else if drop >= 5.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Some(ConfigProposal {
            id: "lower-auto-execute-threshold".to_string(),
            target: "confidence.thresholds.auto_execute".to_string(),
            current_value: serde_json::json!(current.auto_execute),
            proposed_value: serde_json::json!(threshold),
            reasoning: format!(
                "{sample} executions scored at or above {threshold} with {:.1}% success, \
                 meeting the {:.0}% precision target",
                precision * 100.0,
                TARGET_PRECISION * 100.0
            ),
            expected_impact: ExpectedImpact {
                auto_execute_share_before: share(current.auto_execute),
                auto_execute_share_after: share(threshold),
                precision: round2(precision * 100.0),
            },
            risk,
            auto_apply: false,
        })
    }

    /// Signal-weight tuning is not implemented; this always proposes nothing.
    fn propose_signal_weights(&self, _records: &[ExecutionRecord]) -> Vec<ConfigProposal> {
        Vec::new()
    }

    // -----------------------------------------------------------------------
    // Skill scores
    // -----------------------------------------------------------------------

    /// Recompute per-agent skill scores over the lookback window and
    /// overwrite `skill-scores.json`.
    pub fn update_skill_scores(&self) -> Vec<SkillScore> {
        let now = Utc::now();
        let records = self.load_window(self.window_start(now));

        let mut by_agent: BTreeMap<&str, Vec<&ExecutionRecord>> = BTreeMap::new();
        for r in &records {
            by_agent.entry(r.agent_type.as_str()).or_default().push(r);
        }

        let scores: Vec<SkillScore> = by_agent
            .into_iter()
            .map(|(agent, mut rs)| {
                rs.sort_by_key(|r| r.timestamp);
                let mut by_task: BTreeMap<String, Vec<&ExecutionRecord>> = BTreeMap::new();
                for r in rs.iter().copied() {
                    by_task.entry(r.task_type.clone()).or_default().push(r);
                }
                SkillScore {
                    agent_type: agent.to_string(),
                    score: success_rate(&rs),
                    task_breakdown: by_task
                        .into_iter()
                        .map(|(t, v)| (t, success_rate(&v)))
                        .collect(),
                    trend: trend(&rs),
                    sample_size: rs.len(),
                    updated_at: now,
                }
            })
            .collect();

        let path = paths::skill_scores_path(&self.root);
        if let Err(e) = io::write_json(&path, &scores) {
            tracing::error!(error = %e, path = %path.display(), "failed to persist skill scores");
        }
        scores
    }

    pub fn skill_scores(root: &Path) -> Result<Vec<SkillScore>> {
        Ok(io::read_json(&paths::skill_scores_path(root))?.unwrap_or_default())
    }
}

fn success_rate(records: &[&ExecutionRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    round2(records.iter().filter(|r| r.success).count() as f64 / records.len() as f64 * 100.0)
}

/// Most recent 10 against the 10 before them, oldest-first input.
fn trend(records: &[&ExecutionRecord]) -> SkillTrend {
    let n = records.len();
    let recent_start = n.saturating_sub(TREND_WINDOW);
    let previous_start = recent_start.saturating_sub(TREND_WINDOW);
    let previous = &records[previous_start..recent_start];
    if previous.is_empty() {
        return SkillTrend::Stable;
    }
    let diff = success_rate(&records[recent_start..]) - success_rate(previous);
    if diff > TREND_SWING {
        SkillTrend::Improving
    } else if diff < -TREND_SWING {
        SkillTrend::Declining
    } else {
        SkillTrend::Stable
    }
}

fn summarize(learnings: &[Learning]) -> LearningSummary {
    let mut summary = LearningSummary::default();
    for l in learnings {
        *summary.by_type.entry(l.learning_type).or_default() += 1;
        *summary.by_confidence.entry(l.confidence).or_default() += 1;
    }
    summary.top_patterns = learnings
        .iter()
        .filter(|l| l.learning_type == LearningType::Pattern)
        .take(TOP_PATTERNS)
        .map(|l| l.title.clone())
        .collect();
    summary.critical_anti_patterns = learnings
        .iter()
        .filter(|l| {
            l.learning_type == LearningType::AntiPattern
                && l.confidence == LearningConfidence::High
        })
        .map(|l| l.title.clone())
        .collect();
    for action in learnings
        .iter()
        .filter(|l| l.confidence != LearningConfidence::Low)
        .flat_map(|l| l.suggested_actions.iter())
    {
        if summary.recommended_actions.len() >= MAX_RECOMMENDATIONS {
            break;
        }
        if !summary.recommended_actions.contains(action) {
            summary.recommended_actions.push(action.clone());
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
