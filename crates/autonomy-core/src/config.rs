use crate::error::{AutonomyError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ConfidenceThresholds
// ---------------------------------------------------------------------------

/// Decision boundaries. Must satisfy
/// `require_approval <= notify <= auto_execute <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    #[serde(default = "default_auto_execute")]
    pub auto_execute: f64,
    #[serde(default = "default_notify")]
    pub notify: f64,
    #[serde(default = "default_require_approval")]
    pub require_approval: f64,
}

fn default_auto_execute() -> f64 {
    95.0
}

fn default_notify() -> f64 {
    80.0
}

fn default_require_approval() -> f64 {
    60.0
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            auto_execute: default_auto_execute(),
            notify: default_notify(),
            require_approval: default_require_approval(),
        }
    }
}

impl ConfidenceThresholds {
    pub fn validate(&self) -> Result<()> {
        let Self {
            auto_execute,
            notify,
            require_approval,
        } = *self;
        if [auto_execute, notify, require_approval]
            .iter()
            .any(|t| !t.is_finite() || *t < 0.0 || *t > 100.0)
        {
            return Err(AutonomyError::InvalidThresholds(format!(
                "thresholds must lie in [0, 100] (auto_execute={auto_execute}, notify={notify}, require_approval={require_approval})"
            )));
        }
        if !(require_approval <= notify && notify <= auto_execute) {
            return Err(AutonomyError::InvalidThresholds(format!(
                "expected require_approval <= notify <= auto_execute, got {require_approval} / {notify} / {auto_execute}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SignalWeights
// ---------------------------------------------------------------------------

/// Per-source weights used to combine confidence signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    #[serde(default = "default_review_weight")]
    pub review: f64,
    #[serde(default = "default_tests_weight")]
    pub tests: f64,
    #[serde(default = "default_lint_weight")]
    pub lint: f64,
    #[serde(default = "default_build_weight")]
    pub build: f64,
    #[serde(default = "default_history_weight")]
    pub history: f64,
    #[serde(default = "default_benchmark_weight")]
    pub benchmark: f64,
}

fn default_review_weight() -> f64 {
    0.3
}

fn default_tests_weight() -> f64 {
    0.25
}

fn default_lint_weight() -> f64 {
    0.1
}

fn default_build_weight() -> f64 {
    0.15
}

fn default_history_weight() -> f64 {
    0.1
}

fn default_benchmark_weight() -> f64 {
    0.1
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            review: default_review_weight(),
            tests: default_tests_weight(),
            lint: default_lint_weight(),
            build: default_build_weight(),
            history: default_history_weight(),
            benchmark: default_benchmark_weight(),
        }
    }
}

impl SignalWeights {
    pub fn total(&self) -> f64 {
        self.review + self.tests + self.lint + self.build + self.history + self.benchmark
    }
}

// ---------------------------------------------------------------------------
// ConfidenceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    #[serde(default)]
    pub thresholds: ConfidenceThresholds,
    #[serde(default)]
    pub weights: SignalWeights,
    #[serde(default = "default_min_signals")]
    pub min_signals: usize,
}

fn default_min_signals() -> usize {
    2
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            thresholds: ConfidenceThresholds::default(),
            weights: SignalWeights::default(),
            min_signals: default_min_signals(),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalsConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Buffer bound applied after each poll cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_batch_size() -> usize {
    100
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// BenchmarkConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Retries after the first failed measurement attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Specs run at once; `1` runs the suite strictly sequentially.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_retries() -> u32 {
    2
}

fn default_concurrency() -> usize {
    1
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            concurrency: default_concurrency(),
            fail_fast: false,
        }
    }
}

// ---------------------------------------------------------------------------
// LearningConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: i64,
}

fn default_min_sample_size() -> usize {
    5
}

/// Ten years.
const MAX_SANE_LOOKBACK_DAYS: i64 = 3650;

fn default_lookback_days() -> i64 {
    30
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_sample_size: default_min_sample_size(),
            default_lookback_days: default_lookback_days(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub learning: LearningConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            confidence: ConfidenceConfig::default(),
            signals: SignalsConfig::default(),
            benchmark: BenchmarkConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl Config {
    /// Load `.autonomy/config.yaml`. An absent file yields the defaults;
    /// a malformed one is an error.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if let Err(e) = self.confidence.thresholds.validate() {
            warn(WarnLevel::Error, format!("confidence.thresholds: {e}"));
        }

        if self.confidence.weights.total() <= 0.0 {
            warn(
                WarnLevel::Warning,
                "confidence.weights sum to zero; every score will be 0".to_string(),
            );
        }

        if self.signals.poll_interval_secs == 0 {
            warn(
                WarnLevel::Warning,
                "signals.poll_interval_secs is 0; polling falls back to 1s".to_string(),
            );
        }

        if self.signals.batch_size == 0 {
            warn(
                WarnLevel::Warning,
                "signals.batch_size is 0; every poll cycle empties the buffer".to_string(),
            );
        }

        if self.benchmark.concurrency == 0 {
            warn(
                WarnLevel::Warning,
                "benchmark.concurrency is 0; suites run sequentially".to_string(),
            );
        }

        if self.benchmark.retries > 10 {
            warn(
                WarnLevel::Warning,
                format!(
                    "benchmark.retries={} (>10 is unusual)",
                    self.benchmark.retries
                ),
            );
        }

        if self.learning.min_sample_size == 0 {
            warn(
                WarnLevel::Warning,
                "learning.min_sample_size is 0; learnings may come from empty samples"
                    .to_string(),
            );
        }

        let days = self.learning.default_lookback_days;
        if days <= 0 {
            warn(
                WarnLevel::Warning,
                format!("learning.default_lookback_days={days}; the default window is used"),
            );
        } else if days > MAX_SANE_LOOKBACK_DAYS {
            warn(
                WarnLevel::Warning,
                format!("learning.default_lookback_days={days} (>{MAX_SANE_LOOKBACK_DAYS} is unusual)"),
            );
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
