use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Millisecond time source consumed by the engine.
///
/// Readings only need to be monotonic relative to each other; the absolute
/// origin is irrelevant because elapsed time is always a difference.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock anchored at construction.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Hand-driven clock. Clones share the same reading.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_monotonic_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        thread::sleep(Duration::from_millis(15));
        let b = clock.now_ms();
        assert!(b >= a + 10, "expected at least 10ms between {} and {}", a, b);
    }

    #[test]
    fn test_manual_clones_share_reading() {
        let clock = ManualClock::new(100);
        let other = clock.clone();
        clock.advance(50);
        assert_eq!(other.now_ms(), 150);
        other.set(7);
        assert_eq!(clock.now_ms(), 7);
    }
}
