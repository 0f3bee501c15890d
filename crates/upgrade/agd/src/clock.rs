//! Time source for block-paced polling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

/// Injected clock so polling can be simulated without real delay.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately and advances `now`.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    sleeps: u32,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState { now, sleeps: 0 }),
        }
    }

    /// Number of `sleep` calls so far.
    pub fn sleeps(&self) -> u32 {
        self.state.lock().map(|s| s.sleeps).unwrap_or_default()
    }

    pub fn advance(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            let delta = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
            state.now = state.now + delta;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().map(|s| s.now).unwrap_or_else(|_| Utc::now())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        if let Ok(mut state) = self.state.lock() {
            state.sleeps += 1;
        }
    }
}
