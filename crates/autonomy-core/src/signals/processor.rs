//! Signal buffer, adapter polling, and pattern evaluation.
//!
//! The buffer, pattern table, and cooldown bookkeeping share one mutex, so
//! concurrent `ingest` callers are serialized. Adapter polls and action
//! dispatch happen outside the lock.

use super::adapter::{AdapterHealth, SignalAdapter};
use super::pattern::{builtin_patterns, Pattern, PatternFiring, PatternSummary};
use super::signal::{Signal, SignalSource, SignalType};
use crate::config::SignalsConfig;
use crate::error::{AutonomyError, Result};
use crate::paths;
use crate::types::Priority;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Firings kept for `firings()`; older entries are dropped.
const MAX_FIRING_HISTORY: usize = 500;

// ---------------------------------------------------------------------------
// ActionHandler
// ---------------------------------------------------------------------------

/// Receives pattern firings. Called after the processor lock is released.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, firing: &PatternFiring);
}

/// Default handler: emits each firing as a tracing event.
pub struct TracingActionHandler;

impl ActionHandler for TracingActionHandler {
    fn handle(&self, firing: &PatternFiring) {
        tracing::info!(
            pattern = %firing.pattern_id,
            action = %firing.action,
            matched = firing.matched_signals,
            "pattern fired"
        );
    }
}

// ---------------------------------------------------------------------------
// Metrics / outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMetrics {
    pub total: usize,
    pub by_type: BTreeMap<SignalType, usize>,
    pub by_source: BTreeMap<SignalSource, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutcome {
    pub received: usize,
    pub buffered: usize,
    pub fired: Vec<PatternFiring>,
}

// ---------------------------------------------------------------------------
// SignalProcessor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    buffer: Vec<Signal>,
    patterns: Vec<Pattern>,
    last_fired: HashMap<String, DateTime<Utc>>,
    firings: Vec<PatternFiring>,
}

struct PollLoop {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

struct Inner {
    config: SignalsConfig,
    state: Mutex<State>,
    adapters: Mutex<Vec<Arc<dyn SignalAdapter>>>,
    handler: Arc<dyn ActionHandler>,
}

pub struct SignalProcessor {
    inner: Arc<Inner>,
    poll_loop: Mutex<Option<PollLoop>>,
}

impl SignalProcessor {
    /// Processor loaded with the built-in patterns and the tracing handler.
    pub fn new(config: SignalsConfig) -> Self {
        Self::with_handler(config, Arc::new(TracingActionHandler))
    }

    pub fn with_handler(config: SignalsConfig, handler: Arc<dyn ActionHandler>) -> Self {
        let state = State {
            patterns: builtin_patterns(),
            ..State::default()
        };
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
                adapters: Mutex::new(Vec::new()),
                handler,
            }),
            poll_loop: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SignalsConfig {
        &self.inner.config
    }

    // -----------------------------------------------------------------------
    // Adapters
    // -----------------------------------------------------------------------

    pub fn register_adapter(&self, adapter: Arc<dyn SignalAdapter>) -> Result<()> {
        let mut adapters = lock(&self.inner.adapters);
        let source = adapter.source();
        if adapters.iter().any(|a| a.source() == source) {
            return Err(AutonomyError::AdapterExists(source.to_string()));
        }
        adapters.push(adapter);
        Ok(())
    }

    /// Register the tailing adapter for `.autonomy/logs/signals.jsonl`.
    pub fn register_local_adapter(&self, root: &std::path::Path) -> Result<()> {
        self.register_adapter(Arc::new(super::adapter::LocalLogAdapter::new(
            paths::signals_log(root),
        )))
    }

    pub fn adapter_count(&self) -> usize {
        lock(&self.inner.adapters).len()
    }

    /// Health of every registered adapter. A failing or panicking health
    /// check is reported as unhealthy for that adapter only.
    pub async fn adapter_health(&self) -> Vec<AdapterHealth> {
        let adapters = lock(&self.inner.adapters).clone();
        let mut out = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let source = adapter.source();
            let health = match AssertUnwindSafe(adapter.health()).catch_unwind().await {
                Ok(Ok(h)) => h,
                Ok(Err(e)) => {
                    tracing::warn!(source = %source, error = %e, "adapter health check failed");
                    AdapterHealth::unhealthy(source, e.to_string())
                }
                Err(_) => {
                    tracing::warn!(source = %source, "adapter health check panicked");
                    AdapterHealth::unhealthy(source, "health check panicked")
                }
            };
            out.push(health);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Poll every adapter once, append to the buffer, trim it to
    /// `batch_size`, and evaluate patterns.
    pub async fn poll_all_adapters(&self) -> PollOutcome {
        self.inner.poll_all().await
    }

    /// Start polling. The first cycle runs before this returns; later cycles
    /// run every `poll_interval_secs`. Calling it while running is a no-op.
    pub async fn start(&self) {
        {
            let mut guard = lock(&self.poll_loop);
            if guard.as_ref().is_some_and(|l| !l.handle.is_finished()) {
                return;
            }
            // The slot is filled before the first poll so a concurrent start
            // sees the loop as running.
            let (tx, mut rx_loop) = watch::channel(false);
            let inner = Arc::clone(&self.inner);
            let interval = Duration::from_secs(self.inner.config.poll_interval_secs.max(1));
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // The first tick completes immediately; the initial poll is
                // driven by `start` itself.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = rx_loop.changed() => break,
                    }
                    // An in-flight poll completes even if stop() lands now.
                    inner.poll_all().await;
                }
            });
            *guard = Some(PollLoop {
                handle,
                shutdown: tx,
            });
        }
        tracing::info!(adapters = self.adapter_count(), "signal processor started");
        self.inner.poll_all().await;
    }

    /// Cancel the poll schedule. Safe to call when not started.
    pub fn stop(&self) {
        if let Some(poll_loop) = lock(&self.poll_loop).take() {
            let _ = poll_loop.shutdown.send(true);
            tracing::info!("signal processor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.poll_loop)
            .as_ref()
            .is_some_and(|l| !l.handle.is_finished())
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Append a signal directly and evaluate patterns.
    ///
    /// Unlike the poll path this does not trim the buffer; it grows until the
    /// next poll cycle or an explicit `trim_buffer` call.
    pub fn ingest(&self, signal: Signal) -> Vec<PatternFiring> {
        self.ingest_at(signal, Utc::now())
    }

    /// `ingest` with pattern evaluation pinned to `now`.
    pub fn ingest_at(&self, signal: Signal, now: DateTime<Utc>) -> Vec<PatternFiring> {
        let fired = {
            let mut state = lock(&self.inner.state);
            state.append(vec![signal]);
            state.evaluate(now)
        };
        self.inner.dispatch(&fired);
        fired
    }

    /// Drop the oldest signals beyond `batch_size`. Returns how many went.
    pub fn trim_buffer(&self) -> usize {
        lock(&self.inner.state).trim(self.inner.config.batch_size)
    }

    pub fn buffer(&self) -> Vec<Signal> {
        lock(&self.inner.state).buffer.clone()
    }

    pub fn buffer_len(&self) -> usize {
        lock(&self.inner.state).buffer.len()
    }

    pub fn clear_buffer(&self) {
        lock(&self.inner.state).buffer.clear();
    }

    /// Counts of buffered signals by type, source, and priority.
    pub fn metrics(&self) -> SignalMetrics {
        let state = lock(&self.inner.state);
        let mut m = SignalMetrics {
            total: state.buffer.len(),
            ..SignalMetrics::default()
        };
        for s in &state.buffer {
            *m.by_type.entry(s.signal_type).or_default() += 1;
            *m.by_source.entry(s.source).or_default() += 1;
            *m.by_priority.entry(s.priority).or_default() += 1;
        }
        m
    }

    pub fn firings(&self) -> Vec<PatternFiring> {
        lock(&self.inner.state).firings.clone()
    }

    // -----------------------------------------------------------------------
    // Patterns
    // -----------------------------------------------------------------------

    pub fn add_pattern(&self, pattern: Pattern) -> Result<()> {
        paths::validate_id(&pattern.id)?;
        let mut state = lock(&self.inner.state);
        if state.patterns.iter().any(|p| p.id == pattern.id) {
            return Err(AutonomyError::PatternExists(pattern.id));
        }
        state.patterns.push(pattern);
        Ok(())
    }

    pub fn remove_pattern(&self, id: &str) -> Result<Pattern> {
        let mut state = lock(&self.inner.state);
        let idx = state
            .patterns
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| AutonomyError::PatternNotFound(id.to_string()))?;
        state.last_fired.remove(id);
        Ok(state.patterns.remove(idx))
    }

    pub fn set_pattern_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut state = lock(&self.inner.state);
        let pattern = state
            .patterns
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AutonomyError::PatternNotFound(id.to_string()))?;
        pattern.enabled = enabled;
        Ok(())
    }

    pub fn patterns(&self) -> Vec<PatternSummary> {
        lock(&self.inner.state)
            .patterns
            .iter()
            .map(Pattern::summary)
            .collect()
    }
}

impl Drop for SignalProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    async fn poll_all(&self) -> PollOutcome {
        let adapters = lock(&self.adapters).clone();
        let mut received = Vec::new();
        for adapter in adapters {
            let source = adapter.source();
            match AssertUnwindSafe(adapter.poll()).catch_unwind().await {
                Ok(Ok(signals)) => received.extend(signals),
                Ok(Err(e)) => {
                    tracing::warn!(source = %source, error = %e, "adapter poll failed")
                }
                Err(_) => tracing::warn!(source = %source, "adapter poll panicked"),
            }
        }

        let count = received.len();
        let (fired, buffered) = {
            let mut state = lock(&self.state);
            state.append(received);
            state.trim(self.config.batch_size);
            let fired = state.evaluate(Utc::now());
            (fired, state.buffer.len())
        };
        self.dispatch(&fired);
        PollOutcome {
            received: count,
            buffered,
            fired,
        }
    }

    fn dispatch(&self, fired: &[PatternFiring]) {
        for firing in fired {
            self.handler.handle(firing);
        }
    }
}

impl State {
    /// Append signals whose ids are not already buffered.
    fn append(&mut self, signals: Vec<Signal>) {
        let mut seen: HashSet<String> = self.buffer.iter().map(|s| s.id.clone()).collect();
        for s in signals {
            if seen.insert(s.id.clone()) {
                self.buffer.push(s);
            } else {
                tracing::debug!(id = %s.id, "duplicate signal id dropped");
            }
        }
    }

    fn trim(&mut self, max: usize) -> usize {
        let excess = self.buffer.len().saturating_sub(max);
        if excess > 0 {
            self.buffer.drain(..excess);
        }
        excess
    }

    /// Run enabled patterns in descending priority against the buffer.
    fn evaluate(&mut self, now: DateTime<Utc>) -> Vec<PatternFiring> {
        let mut order: Vec<usize> = (0..self.patterns.len())
            .filter(|&i| self.patterns[i].enabled)
            .collect();
        order.sort_by(|&a, &b| self.patterns[b].priority.cmp(&self.patterns[a].priority));

        let mut fired = Vec::new();
        for i in order {
            let pattern = &self.patterns[i];
            if !pattern.condition.matches(&self.buffer) {
                continue;
            }
            let last = self.last_fired.get(&pattern.id).copied();
            if !pattern.cooled_down(last, now) {
                tracing::debug!(pattern = %pattern.id, "pattern matched inside cooldown");
                continue;
            }
            fired.push(PatternFiring {
                pattern_id: pattern.id.clone(),
                pattern_name: pattern.name.clone(),
                action: pattern.action.clone(),
                fired_at: now,
                matched_signals: pattern.condition.matched(&self.buffer),
            });
            self.last_fired.insert(pattern.id.clone(), now);
        }

        self.firings.extend(fired.iter().cloned());
        let excess = self.firings.len().saturating_sub(MAX_FIRING_HISTORY);
        if excess > 0 {
            self.firings.drain(..excess);
        }
        fired
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
