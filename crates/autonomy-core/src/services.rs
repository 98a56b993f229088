//! Shared engine handles for one project root.
//!
//! Each accessor builds its engine on first use and hands out the same `Arc`
//! until the matching `reset_*` call drops it.

use crate::benchmark::BenchmarkRunner;
use crate::confidence::ConfidenceEngine;
use crate::config::Config;
use crate::error::Result;
use crate::learning::LearningEngine;
use crate::signals::SignalProcessor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct Services {
    root: PathBuf,
    config: Config,
    confidence: Mutex<Option<Arc<ConfidenceEngine>>>,
    signals: Mutex<Option<Arc<SignalProcessor>>>,
    benchmark: Mutex<Option<Arc<BenchmarkRunner>>>,
    learning: Mutex<Option<Arc<LearningEngine>>>,
}

impl Services {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
            confidence: Mutex::new(None),
            signals: Mutex::new(None),
            benchmark: Mutex::new(None),
            learning: Mutex::new(None),
        }
    }

    /// Load `.autonomy/config.yaml` under `root` (defaults when absent).
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = Config::load(&root)?;
        Ok(Self::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fails when the configured thresholds are invalid.
    pub fn confidence_engine(&self) -> Result<Arc<ConfidenceEngine>> {
        let mut slot = lock(&self.confidence);
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(ConfidenceEngine::new(
            self.root.clone(),
            self.config.confidence.clone(),
        )?);
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    pub fn signal_processor(&self) -> Arc<SignalProcessor> {
        let mut slot = lock(&self.signals);
        Arc::clone(slot.get_or_insert_with(|| {
            Arc::new(SignalProcessor::new(self.config.signals.clone()))
        }))
    }

    pub fn benchmark_runner(&self) -> Arc<BenchmarkRunner> {
        let mut slot = lock(&self.benchmark);
        Arc::clone(slot.get_or_insert_with(|| {
            Arc::new(BenchmarkRunner::new(
                self.root.clone(),
                self.config.benchmark.clone(),
            ))
        }))
    }

    pub fn learning_engine(&self) -> Arc<LearningEngine> {
        let mut slot = lock(&self.learning);
        Arc::clone(slot.get_or_insert_with(|| {
            Arc::new(LearningEngine::new(
                self.root.clone(),
                self.config.learning.clone(),
            ))
        }))
    }

    pub fn reset_confidence_engine(&self) {
        lock(&self.confidence).take();
    }

    /// Also stops the processor's poll loop.
    pub fn reset_signal_processor(&self) {
        if let Some(processor) = lock(&self.signals).take() {
            processor.stop();
        }
    }

    pub fn reset_benchmark_runner(&self) {
        lock(&self.benchmark).take();
    }

    pub fn reset_learning_engine(&self) {
        lock(&self.learning).take();
    }

    pub fn reset_all(&self) {
        self.reset_confidence_engine();
        self.reset_signal_processor();
        self.reset_benchmark_runner();
        self.reset_learning_engine();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
