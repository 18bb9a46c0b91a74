//! Spin-sleep backoff policy, shared by claim, commit, and consume_new.

use std::thread;
use std::time::Duration;

/// The three-way backoff policy a handle is configured with.
///
/// - negative: non-blocking, return a miss immediately on contention.
/// - zero: busy-spin, retry immediately.
/// - positive: sleep this many milliseconds between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinSleep(pub i64);

/// What a contended operation should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Give up and return a miss to the caller.
    ReturnMiss,
    /// Spin once (`std::hint::spin_loop`) and retry immediately.
    SpinRetry,
    /// Sleep for the configured duration and retry.
    SleepRetry(Duration),
}

impl SpinSleep {
    /// Decide what to do on contention.
    #[inline]
    pub fn on_contention(self) -> Backoff {
        if self.0 < 0 {
            Backoff::ReturnMiss
        } else if self.0 == 0 {
            Backoff::SpinRetry
        } else {
            Backoff::SleepRetry(Duration::from_millis(self.0 as u64))
        }
    }

    /// Apply the backoff decision: spin or sleep. Returns `false` when the
    /// caller should give up (non-blocking miss).
    #[inline]
    pub fn back_off(self) -> bool {
        match self.on_contention() {
            Backoff::ReturnMiss => false,
            Backoff::SpinRetry => {
                std::hint::spin_loop();
                true
            }
            Backoff::SleepRetry(d) => {
                thread::sleep(d);
                true
            }
        }
    }

    /// `true` when this policy never blocks.
    #[inline]
    pub fn is_non_blocking(self) -> bool {
        self.0 < 0
    }
}
