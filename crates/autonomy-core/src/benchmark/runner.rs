use super::measure::{DimensionMeasurer, FileMeasurer};
use super::spec::{BenchmarkSpec, BenchmarkSuite, Dimension};
use crate::config::BenchmarkConfig;
use crate::error::{AutonomyError, Result};
use crate::types::round2;
use crate::{io, paths};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub spec_id: String,
    pub spec_name: String,
    /// Score per successfully measured dimension.
    pub scores: BTreeMap<Dimension, f64>,
    pub overall: f64,
    pub threshold: f64,
    pub passed: bool,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Results carrying execution errors plus specs never scheduled.
    pub skipped: usize,
    pub dimension_averages: BTreeMap<Dimension, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub suite_id: String,
    pub suite_name: String,
    pub results: Vec<BenchmarkResult>,
    pub aggregate_score: f64,
    pub summary: SuiteSummary,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.summary.passed == self.summary.total
    }
}

// ---------------------------------------------------------------------------
// BenchmarkRunner
// ---------------------------------------------------------------------------

pub struct BenchmarkRunner {
    root: PathBuf,
    config: BenchmarkConfig,
    measurer: Arc<dyn DimensionMeasurer>,
}

impl BenchmarkRunner {
    pub fn new(root: impl Into<PathBuf>, config: BenchmarkConfig) -> Self {
        let root = root.into();
        let measurer = Arc::new(FileMeasurer::new(root.clone()));
        Self {
            root,
            config,
            measurer,
        }
    }

    pub fn with_measurer(
        root: impl Into<PathBuf>,
        config: BenchmarkConfig,
        measurer: Arc<dyn DimensionMeasurer>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            measurer,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Measure every requested dimension and compare the weighted score to
    /// the benchmark's threshold. Never fails: exhausted measurements land in
    /// `errors` and force the result to fail.
    pub async fn run_benchmark(&self, spec: &BenchmarkSpec) -> BenchmarkResult {
        let started = Instant::now();
        let mut scores = BTreeMap::new();
        let mut errors = Vec::new();

        for dimension in spec.unique_dimensions() {
            match self.measure_with_retry(dimension, spec).await {
                Ok(score) => {
                    scores.insert(dimension, round2(score));
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        let overall = weighted_overall(&scores);
        let passed = overall >= spec.threshold && errors.is_empty();
        tracing::debug!(spec = %spec.id, overall, passed, "benchmark finished");

        BenchmarkResult {
            spec_id: spec.id.clone(),
            spec_name: spec.name.clone(),
            scores,
            overall,
            threshold: spec.threshold,
            passed,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            errors,
            artifacts: Vec::new(),
        }
    }

    async fn measure_with_retry(&self, dimension: Dimension, spec: &BenchmarkSpec) -> Result<f64> {
        let deadline = Duration::from_millis(spec.timeout_ms);
        let attempts = self.config.retries.saturating_add(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            let outcome =
                match tokio::time::timeout(deadline, self.measurer.measure(dimension, spec)).await {
                    Ok(r) => r,
                    Err(_elapsed) => {
                        tracing::warn!(
                            spec = %spec.id,
                            dimension = %dimension,
                            timeout_ms = spec.timeout_ms,
                            "measurement timed out"
                        );
                        Err(AutonomyError::MeasurementTimeout {
                            dimension: dimension.to_string(),
                            timeout_ms: spec.timeout_ms,
                        })
                    }
                };
            match outcome {
                Ok(score) => return Ok(score),
                Err(e) => {
                    if attempt < attempts {
                        tracing::warn!(
                            spec = %spec.id,
                            dimension = %dimension,
                            attempt,
                            error = %e,
                            "measurement failed, retrying"
                        );
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AutonomyError::Measurement {
            dimension: dimension.to_string(),
            reason: "no attempts made".to_string(),
        }))
    }

    /// Run every spec of `suite`, then persist the result. With
    /// `concurrency > 1` specs run in parallel chunks; `fail_fast` stops
    /// scheduling after the first failing result or chunk.
    pub async fn run_suite(&self, suite: &BenchmarkSuite) -> SuiteResult {
        let started = Instant::now();
        let mut results = Vec::with_capacity(suite.specs.len());

        let chunk = self.config.concurrency.max(1);
        if chunk == 1 {
            for spec in &suite.specs {
                let result = self.run_benchmark(spec).await;
                let failed = !result.passed;
                results.push(result);
                if failed && self.config.fail_fast {
                    break;
                }
            }
        } else {
            for specs in suite.specs.chunks(chunk) {
                let batch = join_all(specs.iter().map(|s| self.run_benchmark(s))).await;
                let failed = batch.iter().any(|r| !r.passed);
                results.extend(batch);
                if failed && self.config.fail_fast {
                    break;
                }
            }
        }

        let unscheduled = suite.specs.len() - results.len();
        if unscheduled > 0 {
            tracing::info!(suite = %suite.id, unscheduled, "fail-fast skipped remaining specs");
        }

        let result = SuiteResult {
            suite_id: suite.id.clone(),
            suite_name: suite.name.clone(),
            aggregate_score: aggregate(&results),
            summary: summarize(&results, suite.specs.len()),
            results,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        };
        self.persist(&result);
        result
    }

    /// Write `latest.json` and a timestamped history file. Failures are
    /// logged, never raised.
    fn persist(&self, result: &SuiteResult) {
        let dir = paths::benchmarks_dir(&self.root);
        let stamped = dir.join(format!(
            "{}-{}.json",
            result.suite_id,
            result.timestamp.format("%Y%m%dT%H%M%S%3fZ")
        ));
        for path in [stamped, dir.join(paths::LATEST_FILE)] {
            if let Err(e) = io::write_json(&path, result) {
                tracing::error!(error = %e, path = %path.display(), "failed to persist suite result");
            }
        }
    }

    /// Most recent persisted suite result, if any.
    pub fn latest(root: &Path) -> Result<Option<SuiteResult>> {
        io::read_json(&paths::benchmarks_dir(root).join(paths::LATEST_FILE))
    }
}

/// Weighted mean over the measured dimensions only.
fn weighted_overall(scores: &BTreeMap<Dimension, f64>) -> f64 {
    let total_weight: f64 = scores.keys().map(|d| d.weight()).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = scores.iter().map(|(d, s)| s * d.weight()).sum();
    round2(weighted / total_weight)
}

fn aggregate(results: &[BenchmarkResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    round2(results.iter().map(|r| r.overall).sum::<f64>() / results.len() as f64)
}

fn summarize(results: &[BenchmarkResult], total: usize) -> SuiteSummary {
    let passed = results.iter().filter(|r| r.passed).count();
    let errored = results.iter().filter(|r| !r.errors.is_empty()).count();
    let failed = results.len() - passed - errored;

    let mut sums: BTreeMap<Dimension, (f64, usize)> = BTreeMap::new();
    for r in results {
        for (d, s) in &r.scores {
            let e = sums.entry(*d).or_insert((0.0, 0));
            e.0 += s;
            e.1 += 1;
        }
    }
    let dimension_averages = sums
        .into_iter()
        .map(|(d, (sum, n))| (d, round2(sum / n as f64)))
        .collect();

    SuiteSummary {
        total,
        passed,
        failed,
        skipped: errored + (total - results.len()),
        dimension_averages,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
