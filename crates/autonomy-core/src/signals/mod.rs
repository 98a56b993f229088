//! Signal ingestion and reactive pattern matching.
//!
//! Adapters are polled on a schedule; their signals land in a bounded buffer
//! that every enabled [`Pattern`] is evaluated against. A matching pattern
//! fires its [`PatternAction`] through an [`ActionHandler`], then stays quiet
//! until its cooldown elapses.

pub mod adapter;
pub mod pattern;
pub mod processor;
pub mod signal;

pub use adapter::{AdapterHealth, LocalLogAdapter, SignalAdapter};
pub use pattern::{
    builtin_patterns, ConditionFn, Pattern, PatternAction, PatternCondition, PatternFiring,
    PatternSummary, DEPLOYMENT_FAILURE, FEATURE_FLAG_ANOMALY, HIGH_ERROR_RATE,
};
pub use processor::{
    ActionHandler, PollOutcome, SignalMetrics, SignalProcessor, TracingActionHandler,
};
pub use signal::{Signal, SignalSource, SignalType};
