//! The five extraction passes over a window of execution records.
//!
//! Each pass is independent and gated on `min_sample_size` over the
//! population it examines, so a thin log yields no learnings rather than
//! spurious ones.

use super::types::{Learning, LearningConfidence, LearningType, TimeRange};
use crate::execution::ExecutionRecord;
use crate::paths::slugify;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const PATTERN_MIN_SHARE: f64 = 0.30;
const PATTERN_MIN_COUNT: usize = 5;
const ANTI_PATTERN_MIN_COUNT: usize = 3;
const OUTLIER_FACTOR: f64 = 2.0;
const OUTLIER_MIN_COUNT: usize = 5;
const FAILURE_MODE_MIN_RATE: f64 = 0.30;
const FAILURE_MODE_MIN_COUNT: usize = 3;
const HIGH_CONFIDENCE_SCORE: f64 = 90.0;
const SUCCESS_FACTOR_MIN_COUNT: usize = 5;

pub(crate) struct ExtractContext {
    pub min_sample_size: usize,
    pub time_range: TimeRange,
    pub now: DateTime<Utc>,
}

impl ExtractContext {
    #[allow(clippy::too_many_arguments)]
    fn learning(
        &self,
        learning_type: LearningType,
        key: &str,
        title: String,
        description: String,
        samples: usize,
        population: usize,
        evidence: Vec<String>,
        suggested_actions: Vec<String>,
        applicability: Vec<String>,
    ) -> Learning {
        Learning {
            id: format!("{learning_type}-{}", slugify(key)),
            learning_type,
            title,
            description,
            confidence: LearningConfidence::classify(samples, population),
            sample_size: samples,
            evidence,
            suggested_actions,
            applicability,
            time_range: self.time_range,
            extracted_at: self.now,
        }
    }
}

/// Run all five passes, in a fixed order.
pub(crate) fn extract_all(records: &[ExecutionRecord], ctx: &ExtractContext) -> Vec<Learning> {
    let mut out = Vec::new();
    out.extend(extract_patterns(records, ctx));
    out.extend(extract_anti_patterns(records, ctx));
    out.extend(extract_optimizations(records, ctx));
    out.extend(extract_failure_modes(records, ctx));
    out.extend(extract_success_factors(records, ctx));
    out
}

// ---------------------------------------------------------------------------
// Patterns: task types over-represented among successes
// ---------------------------------------------------------------------------

pub(crate) fn extract_patterns(records: &[ExecutionRecord], ctx: &ExtractContext) -> Vec<Learning> {
    let successes: Vec<&ExecutionRecord> = records.iter().filter(|r| r.success).collect();
    if successes.len() < ctx.min_sample_size {
        return Vec::new();
    }
    let by_type = count_by(&successes, |r| r.task_type.as_str());

    let mut found: Vec<(usize, Learning)> = by_type
        .into_iter()
        .filter_map(|(task_type, count)| {
            let share = count as f64 / successes.len() as f64;
            if share <= PATTERN_MIN_SHARE || count < PATTERN_MIN_COUNT {
                return None;
            }
            let learning = ctx.learning(
                LearningType::Pattern,
                task_type,
                format!("'{task_type}' tasks succeed reliably"),
                format!(
                    "{count} of {} successful executions ({:.0}%) were '{task_type}' tasks.",
                    successes.len(),
                    share * 100.0
                ),
                count,
                successes.len(),
                vec![format!("{count} successes"), format!("{:.1}% of successes", share * 100.0)],
                vec![format!("Prefer autonomous execution for '{task_type}' tasks")],
                vec![task_type.to_string()],
            );
            Some((count, learning))
        })
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0));
    found.into_iter().map(|(_, l)| l).collect()
}

// ---------------------------------------------------------------------------
// Anti-patterns: recurring error categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum ErrorCategory {
    Timeout,
    Permission,
    NotFound,
    Validation,
    Network,
    Unknown,
}

impl ErrorCategory {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Permission => "permission",
            ErrorCategory::NotFound => "not-found",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Network => "network",
            ErrorCategory::Unknown => "unknown",
        }
    }

    fn remedy(self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "Raise time budgets or split long-running tasks",
            ErrorCategory::Permission => "Audit agent credentials and file permissions",
            ErrorCategory::NotFound => "Verify referenced paths and resources before execution",
            ErrorCategory::Validation => "Tighten input validation ahead of execution",
            ErrorCategory::Network => "Add retries with backoff around network calls",
            ErrorCategory::Unknown => "Improve error reporting for uncategorized failures",
        }
    }
}

static TAXONOMY: OnceLock<Vec<(ErrorCategory, Regex)>> = OnceLock::new();

fn taxonomy() -> &'static [(ErrorCategory, Regex)] {
    TAXONOMY.get_or_init(|| {
        [
            (ErrorCategory::Timeout, r"(?i)time[d ]?\s?out|deadline exceeded"),
            (ErrorCategory::Permission, r"(?i)permission|denied|forbidden|unauthori[sz]ed|eacces"),
            (ErrorCategory::NotFound, r"(?i)not found|no such file|enoent|\b404\b"),
            (ErrorCategory::Validation, r"(?i)invalid|validation|schema|malformed"),
            (ErrorCategory::Network, r"(?i)network|connection|econnrefused|econnreset|dns|socket"),
        ]
        .into_iter()
        .map(|(c, re)| (c, Regex::new(re).unwrap()))
        .collect()
    })
}

/// First matching category wins.
pub(crate) fn categorize_error(message: &str) -> ErrorCategory {
    taxonomy()
        .iter()
        .find(|(_, re)| re.is_match(message))
        .map(|(c, _)| *c)
        .unwrap_or(ErrorCategory::Unknown)
}

pub(crate) fn extract_anti_patterns(
    records: &[ExecutionRecord],
    ctx: &ExtractContext,
) -> Vec<Learning> {
    let failures: Vec<&ExecutionRecord> = records.iter().filter(|r| !r.success).collect();
    if failures.len() < ctx.min_sample_size {
        return Vec::new();
    }
    let mut buckets: BTreeMap<ErrorCategory, Vec<&ExecutionRecord>> = BTreeMap::new();
    for r in failures.iter().copied() {
        let category = categorize_error(r.error.as_deref().unwrap_or(""));
        buckets.entry(category).or_default().push(r);
    }

    buckets
        .into_iter()
        .filter(|(_, rs)| rs.len() >= ANTI_PATTERN_MIN_COUNT)
        .map(|(category, rs)| {
            let examples: Vec<String> = rs
                .iter()
                .filter_map(|r| r.error.clone())
                .take(3)
                .collect();
            let task_types = distinct(rs.iter().map(|r| r.task_type.as_str()));
            ctx.learning(
                LearningType::AntiPattern,
                category.as_str(),
                format!("Recurring {} failures", category.as_str()),
                format!(
                    "{} of {} failures were categorized as {}.",
                    rs.len(),
                    failures.len(),
                    category.as_str()
                ),
                rs.len(),
                failures.len(),
                examples,
                vec![category.remedy().to_string()],
                task_types,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Optimizations: duration outliers
// ---------------------------------------------------------------------------

pub(crate) fn extract_optimizations(
    records: &[ExecutionRecord],
    ctx: &ExtractContext,
) -> Vec<Learning> {
    if records.is_empty() || records.len() < ctx.min_sample_size {
        return Vec::new();
    }
    let avg = records.iter().map(|r| r.duration).sum::<f64>() / records.len() as f64;
    let outliers: Vec<&ExecutionRecord> = records
        .iter()
        .filter(|r| r.duration > avg * OUTLIER_FACTOR)
        .collect();
    if outliers.len() < OUTLIER_MIN_COUNT {
        return Vec::new();
    }
    let by_type = count_by(&outliers, |r| r.task_type.as_str());
    let evidence = by_type
        .iter()
        .map(|(t, n)| format!("{t}: {n} slow executions"))
        .collect();
    vec![ctx.learning(
        LearningType::Optimization,
        "slow-executions",
        "Slow execution outliers".to_string(),
        format!(
            "{} executions took more than {OUTLIER_FACTOR}x the average duration of {avg:.0}ms.",
            outliers.len()
        ),
        outliers.len(),
        records.len(),
        evidence,
        vec!["Profile slow task types and break them into smaller steps".to_string()],
        by_type.keys().map(|t| t.to_string()).collect(),
    )]
}

// ---------------------------------------------------------------------------
// Failure modes: task types that fail too often
// ---------------------------------------------------------------------------

pub(crate) fn extract_failure_modes(
    records: &[ExecutionRecord],
    ctx: &ExtractContext,
) -> Vec<Learning> {
    if records.len() < ctx.min_sample_size {
        return Vec::new();
    }
    let mut by_type: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for r in records {
        let e = by_type.entry(r.task_type.as_str()).or_default();
        e.0 += 1;
        if !r.success {
            e.1 += 1;
        }
    }

    by_type
        .into_iter()
        .filter_map(|(task_type, (total, failed))| {
            let rate = failed as f64 / total as f64;
            if rate <= FAILURE_MODE_MIN_RATE || failed < FAILURE_MODE_MIN_COUNT {
                return None;
            }
            Some(ctx.learning(
                LearningType::FailureMode,
                task_type,
                format!("'{task_type}' tasks fail frequently"),
                format!(
                    "{failed} of {total} '{task_type}' executions failed ({:.0}%).",
                    rate * 100.0
                ),
                failed,
                total,
                vec![format!("failure rate {:.1}%", rate * 100.0)],
                vec![format!(
                    "Require approval for '{task_type}' tasks until the failure rate drops"
                )],
                vec![task_type.to_string()],
            ))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Success factors: calibration at the high end
// ---------------------------------------------------------------------------

pub(crate) fn extract_success_factors(
    records: &[ExecutionRecord],
    ctx: &ExtractContext,
) -> Vec<Learning> {
    let high: Vec<&ExecutionRecord> = records
        .iter()
        .filter(|r| r.confidence_score.is_some_and(|s| s >= HIGH_CONFIDENCE_SCORE))
        .collect();
    if high.len() < SUCCESS_FACTOR_MIN_COUNT.max(ctx.min_sample_size)
        || !high.iter().all(|r| r.success)
    {
        return Vec::new();
    }
    vec![ctx.learning(
        LearningType::SuccessFactor,
        "high-confidence-calibrated",
        "High confidence scores are well calibrated".to_string(),
        format!(
            "All {} executions scored at or above {HIGH_CONFIDENCE_SCORE} succeeded.",
            high.len()
        ),
        high.len(),
        records.len(),
        vec![format!("{} of {} high-confidence executions succeeded", high.len(), high.len())],
        vec!["Keep auto-executing tasks scored at or above 90".to_string()],
        distinct(high.iter().map(|r| r.task_type.as_str())),
    )]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn count_by<'a>(
    records: &[&'a ExecutionRecord],
    key: impl Fn(&'a ExecutionRecord) -> &'a str,
) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(key(*r)).or_insert(0) += 1;
    }
    counts
}

fn distinct<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut v: Vec<String> = items.map(str::to_string).collect();
    v.sort();
    v.dedup();
    v
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExtractContext {
        let now = Utc::now();
        ExtractContext {
            min_sample_size: 5,
            time_range: TimeRange {
                start: now - chrono::Duration::days(30),
                end: now,
            },
            now,
        }
    }

    fn rec(task_type: &str, success: bool) -> ExecutionRecord {
        ExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            task_type: task_type.to_string(),
            agent_type: "coder".to_string(),
            success,
            duration: 1000.0,
            confidence_score: None,
            timestamp: Utc::now(),
            error: None,
            files: None,
        }
    }

    fn failure(task_type: &str, error: &str) -> ExecutionRecord {
        ExecutionRecord {
            error: Some(error.to_string()),
            ..rec(task_type, false)
        }
    }

    /// 10 feature successes, 3 bugfix successes, 7 refactor failures.
    fn mixed_log() -> Vec<ExecutionRecord> {
        let mut v = Vec::new();
        v.extend((0..10).map(|_| rec("feature", true)));
        v.extend((0..3).map(|_| rec("bugfix", true)));
        v.extend((0..7).map(|_| failure("refactor", "request timed out")));
        v
    }

    #[test]
    fn pattern_requires_share_and_count() {
        let learnings = extract_patterns(&mixed_log(), &ctx());
        assert_eq!(learnings.len(), 1);
        assert_eq!(learnings[0].id, "pattern-feature");
        assert_eq!(learnings[0].sample_size, 10);
        assert!(learnings.iter().all(|l| !l.applicability.contains(&"bugfix".to_string())));
    }

    #[test]
    fn sample_size_gate_blocks_thin_logs() {
        let records: Vec<_> = (0..4).map(|_| rec("feature", true)).collect();
        assert!(extract_patterns(&records, &ctx()).is_empty());
        assert!(extract_all(&records, &ctx()).is_empty());
    }

    #[test]
    fn error_taxonomy() {
        assert_eq!(categorize_error("Request timed out after 30s"), ErrorCategory::Timeout);
        assert_eq!(categorize_error("operation timeout"), ErrorCategory::Timeout);
        assert_eq!(categorize_error("EACCES: permission denied"), ErrorCategory::Permission);
        assert_eq!(categorize_error("file not found: a.rs"), ErrorCategory::NotFound);
        assert_eq!(categorize_error("Invalid input"), ErrorCategory::Validation);
        assert_eq!(categorize_error("ECONNREFUSED 127.0.0.1"), ErrorCategory::Network);
        assert_eq!(categorize_error("segfault"), ErrorCategory::Unknown);
        assert_eq!(categorize_error(""), ErrorCategory::Unknown);
    }

    #[test]
    fn anti_patterns_need_three_occurrences() {
        let mut records = mixed_log();
        records.extend((0..2).map(|_| failure("feature", "permission denied")));
        let learnings = extract_anti_patterns(&records, &ctx());
        assert_eq!(learnings.len(), 1);
        assert_eq!(learnings[0].id, "anti-pattern-timeout");
        assert_eq!(learnings[0].sample_size, 7);
        assert_eq!(learnings[0].evidence.len(), 3);
    }

    #[test]
    fn failure_modes_by_task_type() {
        let learnings = extract_failure_modes(&mixed_log(), &ctx());
        assert_eq!(learnings.len(), 1);
        assert_eq!(learnings[0].id, "failure-mode-refactor");
    }

    #[test]
    fn optimizations_need_five_outliers() {
        let mut records: Vec<_> = (0..20).map(|_| rec("feature", true)).collect();
        for r in records.iter_mut().take(4) {
            r.duration = 10_000.0;
        }
        assert!(extract_optimizations(&records, &ctx()).is_empty());
        records[4].duration = 10_000.0;
        let learnings = extract_optimizations(&records, &ctx());
        assert_eq!(learnings.len(), 1);
        assert_eq!(learnings[0].sample_size, 5);
    }

    #[test]
    fn success_factor_requires_all_high_scores_succeed() {
        let mut records: Vec<_> = (0..5)
            .map(|_| ExecutionRecord {
                confidence_score: Some(95.0),
                ..rec("feature", true)
            })
            .collect();
        assert_eq!(extract_success_factors(&records, &ctx()).len(), 1);
        records.push(ExecutionRecord {
            confidence_score: Some(92.0),
            ..rec("feature", false)
        });
        assert!(extract_success_factors(&records, &ctx()).is_empty());
    }
}
