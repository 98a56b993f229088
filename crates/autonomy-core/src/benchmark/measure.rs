//! Dimension measurement.
//!
//! Each measure returns a 0–100 score. Absent telemetry is not an error; every
//! dimension has its own default:
//!
//! | Dimension      | Source                         | Default when absent |
//! |----------------|--------------------------------|---------------------|
//! | `quality`      | latest `quality.jsonl` entry   | 50 per sub-score    |
//! | `completeness` | `expected_outcomes` vs disk    | 100 (nothing asked) |
//! | `efficiency`   | `.autonomy/metrics.json`       | 100                 |
//! | `drift`        | last 10 `drift.jsonl` entries  | 90                  |
//! | `speed`        | `expected_time / timeout`      | 100                 |

use super::spec::{BenchmarkSpec, Dimension};
use crate::error::{AutonomyError, Result};
use crate::types::clamp_score;
use crate::{io, paths};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

const NEUTRAL: f64 = 50.0;
const DRIFT_WINDOW: usize = 10;
const DRIFT_DEFAULT: f64 = 90.0;

const QUALITY_WEIGHTS: [(&str, f64); 4] = [
    ("tests", 0.4),
    ("lint", 0.2),
    ("types", 0.2),
    ("complexity", 0.2),
];

#[async_trait]
pub trait DimensionMeasurer: Send + Sync {
    async fn measure(&self, dimension: Dimension, spec: &BenchmarkSpec) -> Result<f64>;
}

/// Measures dimensions from the `.autonomy` layout under a project root.
pub struct FileMeasurer {
    root: PathBuf,
}

impl FileMeasurer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn measure_quality(&self) -> Result<f64> {
        let latest: Option<Value> = io::read_jsonl_tail(&paths::quality_log(&self.root), 1)
            .map_err(|e| failure(Dimension::Quality, e))?
            .pop();
        let entry = latest.unwrap_or(Value::Null);
        let score = QUALITY_WEIGHTS
            .iter()
            .map(|(key, w)| quality_subscore(&entry, key).unwrap_or(NEUTRAL) * w)
            .sum::<f64>();
        Ok(clamp_score(score))
    }

    pub async fn measure_completeness(&self, spec: &BenchmarkSpec) -> Result<f64> {
        let expected = &spec.expected_outcomes;

        let mut present = 0usize;
        for file in &expected.files {
            if tokio::fs::try_exists(self.resolve(file))
                .await
                .map_err(|e| failure(Dimension::Completeness, e))?
            {
                present += 1;
            }
        }

        let mut matched = 0usize;
        for p in &expected.patterns {
            match tokio::fs::read_to_string(self.resolve(&p.file)).await {
                Ok(content) if content.contains(&p.pattern) => matched += 1,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(failure(Dimension::Completeness, e)),
            }
        }

        // Weakest link, not an average.
        Ok(ratio(present, expected.files.len()).min(ratio(matched, expected.patterns.len())))
    }

    pub fn measure_efficiency(&self, spec: &BenchmarkSpec) -> Result<f64> {
        let metrics: Option<Value> = io::read_json(&paths::metrics_path(&self.root))
            .map_err(|e| failure(Dimension::Efficiency, e))?;
        let Some(metrics) = metrics else {
            return Ok(100.0);
        };
        let expected = &spec.expected_outcomes;
        let mut score: f64 = 100.0;
        if let Some(budget) = expected.max_tokens {
            if let Some(used) = metrics.get("tokensUsed").and_then(Value::as_f64) {
                score = score.min(budget_score(budget as f64, used));
            }
        }
        if let Some(budget) = expected.max_iterations {
            if let Some(used) = metrics.get("iterations").and_then(Value::as_f64) {
                score = score.min(budget_score(budget as f64, used));
            }
        }
        Ok(clamp_score(score))
    }

    pub fn measure_drift(&self) -> Result<f64> {
        let entries: Vec<Value> = io::read_jsonl_tail(&paths::drift_log(&self.root), DRIFT_WINDOW)
            .map_err(|e| failure(Dimension::Drift, e))?;
        let scores: Vec<f64> = entries
            .iter()
            .filter_map(|e| e.get("score").and_then(Value::as_f64))
            .collect();
        if scores.is_empty() {
            return Ok(DRIFT_DEFAULT);
        }
        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        Ok(clamp_score(100.0 - avg))
    }

    /// Budget ratio, not a stopwatch: the harness owns wall-clock timing.
    pub fn measure_speed(spec: &BenchmarkSpec) -> f64 {
        match spec.expected_outcomes.expected_time {
            Some(expected) if spec.timeout_ms > 0 => {
                (expected as f64 / spec.timeout_ms as f64 * 100.0).min(100.0)
            }
            _ => 100.0,
        }
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl DimensionMeasurer for FileMeasurer {
    async fn measure(&self, dimension: Dimension, spec: &BenchmarkSpec) -> Result<f64> {
        match dimension {
            Dimension::Quality => self.measure_quality(),
            Dimension::Completeness => self.measure_completeness(spec).await,
            Dimension::Efficiency => self.measure_efficiency(spec),
            Dimension::Drift => self.measure_drift(),
            Dimension::Speed => Ok(Self::measure_speed(spec)),
        }
    }
}

fn quality_subscore(entry: &Value, key: &str) -> Option<f64> {
    let section = entry.get(key)?;
    let value = match key {
        "tests" => section.get("coverage").and_then(Value::as_f64)?,
        "lint" => {
            let errors = section.get("errors").and_then(Value::as_f64)?;
            let warnings = section.get("warnings").and_then(Value::as_f64).unwrap_or(0.0);
            100.0 - 10.0 * errors - 2.0 * warnings
        }
        "types" => {
            let errors = section.get("errors").and_then(Value::as_f64)?;
            100.0 - 10.0 * errors
        }
        _ => section.get("score").and_then(Value::as_f64)?,
    };
    Some(clamp_score(value))
}

fn ratio(hit: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        hit as f64 / total as f64 * 100.0
    }
}

fn budget_score(budget: f64, actual: f64) -> f64 {
    if actual <= 0.0 {
        return 100.0;
    }
    (budget / actual * 100.0).min(100.0)
}

fn failure(dimension: Dimension, err: impl std::fmt::Display) -> AutonomyError {
    AutonomyError::Measurement {
        dimension: dimension.to_string(),
        reason: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::spec::FilePattern;
    use serde_json::json;
    use tempfile::TempDir;

    fn spec() -> BenchmarkSpec {
        BenchmarkSpec::new("s", "S", Dimension::all().to_vec())
    }

    #[test]
    fn quality_defaults_to_neutral() {
        let dir = TempDir::new().unwrap();
        let m = FileMeasurer::new(dir.path());
        assert_eq!(m.measure_quality().unwrap(), 50.0);
    }

    #[test]
    fn quality_uses_latest_entry() {
        let dir = TempDir::new().unwrap();
        let log = paths::quality_log(dir.path());
        io::append_jsonl(&log, &json!({ "tests": { "coverage": 10 } })).unwrap();
        io::append_jsonl(
            &log,
            &json!({
                "tests": { "coverage": 90 },
                "lint": { "errors": 1, "warnings": 5 },
                "types": { "errors": 0 },
            }),
        )
        .unwrap();
        let m = FileMeasurer::new(dir.path());
        // 90*.4 + 80*.2 + 100*.2 + 50*.2
        let q = m.measure_quality().unwrap();
        assert!((q - 82.0).abs() < 1e-9, "got {q}");
    }

    #[tokio::test]
    async fn completeness_is_weakest_link() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "fn login() {}").unwrap();
        std::fs::write(dir.path().join("src/b.rs"), "").unwrap();

        let mut s = spec();
        s.expected_outcomes.files = vec!["src/a.rs".into(), "src/b.rs".into()];
        s.expected_outcomes.patterns = vec![
            FilePattern {
                file: "src/a.rs".into(),
                pattern: "fn login".into(),
            },
            FilePattern {
                file: "src/b.rs".into(),
                pattern: "fn logout".into(),
            },
        ];
        let m = FileMeasurer::new(dir.path());
        assert_eq!(m.measure_completeness(&s).await.unwrap(), 50.0);

        s.expected_outcomes.patterns.pop();
        assert_eq!(m.measure_completeness(&s).await.unwrap(), 100.0);

        s.expected_outcomes.files.push("src/missing.rs".into());
        let c = m.measure_completeness(&s).await.unwrap();
        assert!((c - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn efficiency_defaults_and_budgets() {
        let dir = TempDir::new().unwrap();
        let m = FileMeasurer::new(dir.path());
        let mut s = spec();
        s.expected_outcomes.max_tokens = Some(1000);
        s.expected_outcomes.max_iterations = Some(4);
        assert_eq!(m.measure_efficiency(&s).unwrap(), 100.0);

        io::write_json(
            &paths::metrics_path(dir.path()),
            &json!({ "tokensUsed": 2000, "iterations": 2 }),
        )
        .unwrap();
        assert_eq!(m.measure_efficiency(&s).unwrap(), 50.0);

        s.expected_outcomes.max_tokens = None;
        assert_eq!(m.measure_efficiency(&s).unwrap(), 100.0);
    }

    #[test]
    fn drift_defaults_and_window() {
        let dir = TempDir::new().unwrap();
        let m = FileMeasurer::new(dir.path());
        assert_eq!(m.measure_drift().unwrap(), 90.0);

        let log = paths::drift_log(dir.path());
        for _ in 0..5 {
            io::append_jsonl(&log, &json!({ "score": 100 })).unwrap();
        }
        for _ in 0..10 {
            io::append_jsonl(&log, &json!({ "score": 20 })).unwrap();
        }
        assert_eq!(m.measure_drift().unwrap(), 80.0);
    }

    #[test]
    fn speed_is_budget_ratio() {
        let mut s = spec();
        s.timeout_ms = 10_000;
        assert_eq!(FileMeasurer::measure_speed(&s), 100.0);
        s.expected_outcomes.expected_time = Some(2_500);
        assert_eq!(FileMeasurer::measure_speed(&s), 25.0);
        s.expected_outcomes.expected_time = Some(50_000);
        assert_eq!(FileMeasurer::measure_speed(&s), 100.0);
    }

    #[test]
    fn malformed_metrics_is_measurement_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(paths::autonomy_dir(dir.path())).unwrap();
        std::fs::write(paths::metrics_path(dir.path()), "{not json").unwrap();
        let m = FileMeasurer::new(dir.path());
        assert!(matches!(
            m.measure_efficiency(&spec()),
            Err(AutonomyError::Measurement { .. })
        ));
    }
}
