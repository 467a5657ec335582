//! Time sources and garbage collection bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of whole seconds for usage tracking.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Seconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_secs)),
        }
    }

    pub fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::Relaxed);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Time of the last garbage collection sweep.
///
/// Owned by whoever drives the collection timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcClock {
    last_sweep: Option<u64>,
}

impl GcClock {
    pub const fn new() -> Self {
        Self { last_sweep: None }
    }

    pub const fn last_sweep(&self) -> Option<u64> {
        self.last_sweep
    }

    /// Check if at least `interval` seconds passed since the last sweep.
    pub fn is_due(&self, now: u64, interval: u64) -> bool {
        self.last_sweep
            .map_or(true, |last| now.saturating_sub(last) >= interval)
    }

    pub fn record_sweep(&mut self, now: u64) {
        self.last_sweep = Some(now);
    }
}

/// Host state relevant to a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcContext {
    /// A render is running; textures must stay alive.
    pub is_rendering: bool,
}

impl GcContext {
    pub const fn idle() -> Self {
        Self {
            is_rendering: false,
        }
    }

    pub const fn rendering() -> Self {
        Self { is_rendering: true }
    }
}

/// Why a sweep did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcSkip {
    /// Timeout is 0.
    Disabled,
    Rendering,
    /// The collection interval has not elapsed.
    TooSoon,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub skipped: Option<GcSkip>,
    /// Images whose GPU textures were freed.
    pub textures_freed: usize,
    /// Images whose pixel buffers were freed.
    pub buffers_freed: usize,
}

impl GcReport {
    pub const fn skipped(reason: GcSkip) -> Self {
        Self {
            skipped: Some(reason),
            textures_freed: 0,
            buffers_freed: 0,
        }
    }

    /// Check if anything was freed.
    pub const fn freed_any(&self) -> bool {
        self.textures_freed > 0 || self.buffers_freed > 0
    }
}
