//! Randomized inter-page delay used by the extraction-program interpreter.
//!
//! Every page transition waits a uniformly drawn duration from
//! `[min, max]` before the next fetch, so a walk never hammers a site.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds for the pause between two page fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDelay {
    /// Shortest pause, in milliseconds.
    pub min_ms: u64,
    /// Longest pause, in milliseconds.
    pub max_ms: u64,
}

impl PageDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_ms = min.as_millis() as u64;
        let max_ms = (max.as_millis() as u64).max(min_ms);
        Self { min_ms, max_ms }
    }

    /// No pause at all. Useful for tests and local fixtures.
    pub fn none() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
        }
    }

    /// Draw the pause for one page transition.
    pub fn sample(&self) -> Duration {
        let spread = self.max_ms.saturating_sub(self.min_ms);
        if spread == 0 {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(self.min_ms.saturating_add(rand_jitter_ms(spread.saturating_add(1))))
    }
}

impl Default for PageDelay {
    /// Between 1 and 3 seconds.
    fn default() -> Self {
        Self {
            min_ms: 1_000,
            max_ms: 3_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Jitter from a time-seeded xorshift; good enough for politeness, not crypto.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
