//! Reactive patterns: a condition over the signal buffer paired with an
//! action, guarded by a per-pattern cooldown.

use super::signal::{Signal, SignalSource, SignalType};
use crate::types::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// PatternCondition
// ---------------------------------------------------------------------------

/// Caller-supplied predicate over the signal snapshot.
pub type ConditionFn = dyn Fn(&[Signal]) -> bool + Send + Sync;

/// Pure predicate over the current signal snapshot.
#[derive(Clone)]
pub enum PatternCondition {
    /// At least `count` signals of `signal_type` are buffered.
    TypeCountAtLeast {
        signal_type: SignalType,
        count: usize,
    },
    /// Any event signal from `source` whose payload `status` equals `status`.
    SourceEventStatus {
        source: SignalSource,
        status: String,
    },
    /// Any signal (optionally restricted to `source`) whose payload has
    /// boolean `field` set to true.
    PayloadFlag {
        source: Option<SignalSource>,
        field: String,
    },
    Custom(Arc<ConditionFn>),
}

impl PatternCondition {
    pub fn custom(f: impl Fn(&[Signal]) -> bool + Send + Sync + 'static) -> Self {
        PatternCondition::Custom(Arc::new(f))
    }

    /// Number of buffered signals this condition looks at; `0` when none
    /// qualify.
    pub fn matched(&self, signals: &[Signal]) -> usize {
        match self {
            PatternCondition::TypeCountAtLeast { signal_type, count } => {
                let n = count_of(signals, *signal_type);
                if n >= *count {
                    n
                } else {
                    0
                }
            }
            PatternCondition::SourceEventStatus { source, status } => signals
                .iter()
                .filter(|s| {
                    s.source == *source
                        && s.signal_type == SignalType::Event
                        && s.payload_str("status") == Some(status.as_str())
                })
                .count(),
            PatternCondition::PayloadFlag { source, field } => signals
                .iter()
                .filter(|s| source.map_or(true, |src| s.source == src))
                .filter(|s| s.payload.get(field).and_then(|v| v.as_bool()) == Some(true))
                .count(),
            PatternCondition::Custom(f) => {
                if f(signals) {
                    signals.len()
                } else {
                    0
                }
            }
        }
    }

    pub fn matches(&self, signals: &[Signal]) -> bool {
        match self {
            // These two may match an empty buffer.
            PatternCondition::TypeCountAtLeast { signal_type, count } => {
                count_of(signals, *signal_type) >= *count
            }
            PatternCondition::Custom(f) => f(signals),
            other => other.matched(signals) > 0,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PatternCondition::TypeCountAtLeast { signal_type, count } => {
                format!("{count}+ {signal_type} signals")
            }
            PatternCondition::SourceEventStatus { source, status } => {
                format!("{source} event with status '{status}'")
            }
            PatternCondition::PayloadFlag {
                source: Some(src),
                field,
            } => format!("{src} signal with '{field}' set"),
            PatternCondition::PayloadFlag {
                source: None,
                field,
            } => format!("any signal with '{field}' set"),
            PatternCondition::Custom(_) => "custom predicate".to_string(),
        }
    }
}

fn count_of(signals: &[Signal], signal_type: SignalType) -> usize {
    signals.iter().filter(|s| s.signal_type == signal_type).count()
}

impl fmt::Debug for PatternCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ---------------------------------------------------------------------------
// PatternAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternAction {
    Log { message: String },
    SpawnAgent { agent_type: String },
    Notify { channel: String },
}

impl fmt::Display for PatternAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternAction::Log { message } => write!(f, "log: {message}"),
            PatternAction::SpawnAgent { agent_type } => write!(f, "spawn-agent: {agent_type}"),
            PatternAction::Notify { channel } => write!(f, "notify: {channel}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub condition: PatternCondition,
    pub action: PatternAction,
    pub cooldown: Duration,
    pub enabled: bool,
    pub priority: Priority,
    pub tags: Vec<String>,
}

impl Pattern {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        condition: PatternCondition,
        action: PatternAction,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            condition,
            action,
            cooldown: Duration::from_secs(300),
            enabled: true,
            priority: Priority::Medium,
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Whether the cooldown window opened at `last_fired` has elapsed by `now`.
    pub fn cooled_down(&self, last_fired: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last) = last_fired else {
            return true;
        };
        match now.signed_duration_since(last).to_std() {
            Ok(elapsed) => elapsed >= self.cooldown,
            // `now` precedes the last firing.
            Err(_) => false,
        }
    }

    pub fn summary(&self) -> PatternSummary {
        PatternSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            condition: self.condition.describe(),
            action: self.action.clone(),
            cooldown_secs: self.cooldown.as_secs(),
            enabled: self.enabled,
            priority: self.priority,
            tags: self.tags.clone(),
        }
    }
}

/// Serializable view of a [`Pattern`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub condition: String,
    pub action: PatternAction,
    pub cooldown_secs: u64,
    pub enabled: bool,
    pub priority: Priority,
    pub tags: Vec<String>,
}

/// Record of one pattern firing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFiring {
    pub pattern_id: String,
    pub pattern_name: String,
    pub action: PatternAction,
    pub fired_at: DateTime<Utc>,
    pub matched_signals: usize,
}

// ---------------------------------------------------------------------------
// Built-in patterns
// ---------------------------------------------------------------------------

pub const HIGH_ERROR_RATE: &str = "high-error-rate";
pub const DEPLOYMENT_FAILURE: &str = "deployment-failure";
pub const FEATURE_FLAG_ANOMALY: &str = "feature-flag-anomaly";

pub fn builtin_patterns() -> Vec<Pattern> {
    vec![
        Pattern::new(
            HIGH_ERROR_RATE,
            "High error rate",
            PatternCondition::TypeCountAtLeast {
                signal_type: SignalType::Error,
                count: 5,
            },
            PatternAction::SpawnAgent {
                agent_type: "responder".to_string(),
            },
        )
        .with_description("Five or more error signals buffered")
        .with_cooldown(Duration::from_secs(300))
        .with_priority(Priority::High)
        .with_tags(&["errors", "incident"]),
        Pattern::new(
            DEPLOYMENT_FAILURE,
            "Deployment failure",
            PatternCondition::SourceEventStatus {
                source: SignalSource::Vercel,
                status: "failure".to_string(),
            },
            PatternAction::SpawnAgent {
                agent_type: "deployer".to_string(),
            },
        )
        .with_description("A Vercel deployment reported failure")
        .with_cooldown(Duration::from_secs(600))
        .with_priority(Priority::Critical)
        .with_tags(&["deploy"]),
        Pattern::new(
            FEATURE_FLAG_ANOMALY,
            "Feature flag anomaly",
            PatternCondition::PayloadFlag {
                source: Some(SignalSource::Posthog),
                field: "anomaly".to_string(),
            },
            PatternAction::Notify {
                channel: "default".to_string(),
            },
        )
        .with_description("PostHog flagged an anomaly in feature flag metrics")
        .with_cooldown(Duration::from_secs(900))
        .with_priority(Priority::Medium)
        .with_tags(&["feature-flags"]),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
