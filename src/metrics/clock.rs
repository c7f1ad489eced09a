//! Clock Abstraction for Emission Timestamps
//!
//! Lines are stamped with unix seconds at the moment they are emitted.
//! Tests pin the time with `ManualClock`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the unix timestamp written into each line
pub trait Clock: Send + Sync + 'static {
    fn now_secs(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        // A clock before 1970 is stamped as 0 rather than failing emission
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep a handle after giving
/// one to an emitter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(secs: u64) -> Self {
        ManualClock {
            secs: Arc::new(AtomicU64::new(secs)),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1234);
        let handle = clock.clone();

        handle.advance(6);
        assert_eq!(clock.now_secs(), 1240);

        handle.set(10);
        assert_eq!(clock.now_secs(), 10);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
