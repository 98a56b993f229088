use crate::error::{AutonomyError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const AUTONOMY_DIR: &str = ".autonomy";
pub const LOGS_DIR: &str = ".autonomy/logs";
pub const BENCHMARKS_DIR: &str = ".autonomy/benchmarks";
pub const LEARNINGS_DIR: &str = ".autonomy/learnings";

pub const CONFIG_FILE: &str = ".autonomy/config.yaml";
pub const METRICS_FILE: &str = ".autonomy/metrics.json";

pub const EXECUTIONS_LOG: &str = "executions.jsonl";
pub const QUALITY_LOG: &str = "quality.jsonl";
pub const DRIFT_LOG: &str = "drift.jsonl";
pub const SIGNALS_LOG: &str = "signals.jsonl";

pub const LATEST_FILE: &str = "latest.json";
pub const SKILL_SCORES_FILE: &str = "skill-scores.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn autonomy_dir(root: &Path) -> PathBuf {
    root.join(AUTONOMY_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join(LOGS_DIR)
}

pub fn executions_log(root: &Path) -> PathBuf {
    logs_dir(root).join(EXECUTIONS_LOG)
}

pub fn quality_log(root: &Path) -> PathBuf {
    logs_dir(root).join(QUALITY_LOG)
}

pub fn drift_log(root: &Path) -> PathBuf {
    logs_dir(root).join(DRIFT_LOG)
}

pub fn signals_log(root: &Path) -> PathBuf {
    logs_dir(root).join(SIGNALS_LOG)
}

pub fn metrics_path(root: &Path) -> PathBuf {
    root.join(METRICS_FILE)
}

pub fn benchmarks_dir(root: &Path) -> PathBuf {
    root.join(BENCHMARKS_DIR)
}

pub fn learnings_dir(root: &Path) -> PathBuf {
    root.join(LEARNINGS_DIR)
}

pub fn skill_scores_path(root: &Path) -> PathBuf {
    learnings_dir(root).join(SKILL_SCORES_FILE)
}

// ---------------------------------------------------------------------------
// Id validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Validate a pattern, benchmark, or suite id.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !id_re().is_match(id) {
        return Err(AutonomyError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Lowercase ASCII slug: alphanumeric runs joined by single dashes.
/// Empty when `s` has no ASCII alphanumerics.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
