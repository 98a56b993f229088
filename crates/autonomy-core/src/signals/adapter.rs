//! Signal adapters: pluggable polling sources.
//!
//! Adapters for hosted services (Sentry, PostHog, Vercel) live with the
//! integrations that own their credentials. This crate ships the local
//! adapter, which tails `.autonomy/logs/signals.jsonl`.

use super::signal::{Signal, SignalSource};
use crate::error::Result;
use crate::io;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterHealth {
    pub source: SignalSource,
    pub healthy: bool,
    pub last_poll: Option<DateTime<Utc>>,
    pub error_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AdapterHealth {
    pub fn unhealthy(source: SignalSource, message: impl Into<String>) -> Self {
        Self {
            source,
            healthy: false,
            last_poll: None,
            error_count: 0,
            message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait SignalAdapter: Send + Sync {
    fn source(&self) -> SignalSource;

    /// Fetch signals produced since the previous poll.
    async fn poll(&self) -> Result<Vec<Signal>>;

    async fn health(&self) -> Result<AdapterHealth>;
}

// ---------------------------------------------------------------------------
// LocalLogAdapter
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TailState {
    /// Bytes already consumed from the log.
    offset: usize,
    /// Last complete line consumed, ending at `offset`. A log whose consumed
    /// prefix no longer ends with it has been rotated.
    last_line: String,
    last_poll: Option<DateTime<Utc>>,
    error_count: u64,
    last_error: Option<String>,
}

/// Tails a JSONL signal log, returning only complete lines appended since the
/// previous poll.
pub struct LocalLogAdapter {
    path: PathBuf,
    state: Mutex<TailState>,
}

impl LocalLogAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(TailState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TailState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SignalAdapter for LocalLogAdapter {
    fn source(&self) -> SignalSource {
        SignalSource::Local
    }

    async fn poll(&self) -> Result<Vec<Signal>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.lock().last_poll = Some(Utc::now());
                return Ok(Vec::new());
            }
            Err(e) => {
                let mut state = self.lock();
                state.error_count += 1;
                state.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        let mut state = self.lock();
        state.last_poll = Some(Utc::now());
        state.last_error = None;
        let rotated = content
            .get(..state.offset)
            .map_or(true, |consumed| !consumed.ends_with(state.last_line.as_str()));
        if rotated {
            tracing::debug!(path = %self.path.display(), "signal log rotated, reading from start");
            state.offset = 0;
            state.last_line.clear();
        }
        let unread = &content[state.offset..];
        // Leave a trailing partial line for the next poll.
        let complete = match unread.rfind('\n') {
            Some(idx) => &unread[..=idx],
            None => return Ok(Vec::new()),
        };
        let last_start = complete[..complete.len() - 1]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        state.last_line = complete[last_start..].to_string();
        state.offset += complete.len();
        Ok(io::parse_jsonl(complete))
    }

    async fn health(&self) -> Result<AdapterHealth> {
        let state = self.lock();
        Ok(AdapterHealth {
            source: SignalSource::Local,
            healthy: state.last_error.is_none(),
            last_poll: state.last_poll,
            error_count: state.error_count,
            message: state.last_error.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
