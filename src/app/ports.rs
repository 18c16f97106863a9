use crate::error::Result;
use crate::types::{ApiParams, ApiResponse};
use std::time::{Duration, Instant};

/// Explorer API port. Implemented by the resilient client; tests script it directly.
pub trait ExplorerApi: Send + Sync {
    fn fetch(&self, params: &ApiParams) -> Result<ApiResponse>;
}

// Ingest-side ports
pub trait HttpTransport: Send + Sync {
    /// Issue one GET. Connection failures and timeouts map to `EtlError::Transport`.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<Duration>,
}

/// Time source for rate limiting and retry backoff.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when slept on. Records every requested sleep.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: std::sync::Mutex<ManualClockState>,
}

#[derive(Debug, Default)]
struct ManualClockState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: std::sync::Mutex::new(ManualClockState::default()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.lock().elapsed += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
        state.sleeps.push(duration);
    }
}
