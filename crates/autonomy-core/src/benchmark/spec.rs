use crate::error::{AutonomyError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_threshold() -> f64 {
    70.0
}

// ---------------------------------------------------------------------------
// Dimension
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Dimension {
    Quality,
    Completeness,
    Efficiency,
    Drift,
    Speed,
}

/// Global per-dimension weights. Quality and completeness dominate.
pub const DEFAULT_DIMENSION_WEIGHTS: [(Dimension, f64); 5] = [
    (Dimension::Quality, 0.30),
    (Dimension::Completeness, 0.30),
    (Dimension::Efficiency, 0.15),
    (Dimension::Drift, 0.15),
    (Dimension::Speed, 0.10),
];

impl Dimension {
    pub fn all() -> [Dimension; 5] {
        DEFAULT_DIMENSION_WEIGHTS.map(|(d, _)| d)
    }

    pub fn weight(self) -> f64 {
        DEFAULT_DIMENSION_WEIGHTS
            .iter()
            .find(|(d, _)| *d == self)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Quality => "quality",
            Dimension::Completeness => "completeness",
            Dimension::Efficiency => "efficiency",
            Dimension::Drift => "drift",
            Dimension::Speed => "speed",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = AutonomyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quality" => Ok(Dimension::Quality),
            "completeness" => Ok(Dimension::Completeness),
            "efficiency" => Ok(Dimension::Efficiency),
            "drift" => Ok(Dimension::Drift),
            "speed" => Ok(Dimension::Speed),
            other => Err(AutonomyError::UnknownDimension(other.to_string())),
        }
    }
}

impl TryFrom<String> for Dimension {
    type Error = AutonomyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// BenchmarkSpec
// ---------------------------------------------------------------------------

/// `{file, pattern}`: `pattern` must appear as a substring of `file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePattern {
    pub file: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcomes {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<FilePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,
    /// Expected completion time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSpec {
    pub id: String,
    pub name: String,
    pub dimensions: Vec<Dimension>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Per-dimension measurement deadline.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub expected_outcomes: ExpectedOutcomes,
}

impl BenchmarkSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, dimensions: Vec<Dimension>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dimensions,
            threshold: default_threshold(),
            timeout_ms: default_timeout_ms(),
            expected_outcomes: ExpectedOutcomes::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        paths::validate_id(&self.id)?;
        if self.dimensions.is_empty() {
            return Err(AutonomyError::InvalidValue(format!(
                "benchmark '{}' measures no dimensions",
                self.id
            )));
        }
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(AutonomyError::InvalidValue(format!(
                "benchmark '{}' threshold {} is outside [0, 100]",
                self.id, self.threshold
            )));
        }
        if self.timeout_ms == 0 {
            return Err(AutonomyError::InvalidValue(format!(
                "benchmark '{}' timeout_ms must be positive",
                self.id
            )));
        }
        Ok(())
    }

    /// Requested dimensions with duplicates removed, in declared order.
    pub fn unique_dimensions(&self) -> Vec<Dimension> {
        let mut seen = HashSet::new();
        self.dimensions
            .iter()
            .copied()
            .filter(|d| seen.insert(*d))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BenchmarkSuite
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub specs: Vec<BenchmarkSpec>,
}

impl BenchmarkSuite {
    /// Load and validate a suite from a YAML file. A malformed suite is a hard
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let suite: BenchmarkSuite = serde_yaml::from_str(data)?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn validate(&self) -> Result<()> {
        paths::validate_id(&self.id)?;
        let mut ids = HashSet::new();
        for spec in &self.specs {
            spec.validate()?;
            if !ids.insert(spec.id.as_str()) {
                return Err(AutonomyError::InvalidValue(format!(
                    "duplicate benchmark id '{}' in suite '{}'",
                    spec.id, self.id
                )));
            }
        }
        Ok(())
    }
}
