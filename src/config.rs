//! Engine configuration.

use std::time::Duration;

/// Default fast tier period (1 second).
const DEFAULT_FAST_PERIOD_MS: u64 = 1_000;

/// Default medium tier period (5 seconds).
const DEFAULT_MEDIUM_PERIOD_MS: u64 = 5_000;

/// Default slow tier period (20 seconds).
const DEFAULT_SLOW_PERIOD_MS: u64 = 20_000;

/// Default rolling history capacity per metric series.
const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// Default process list size (top-N by CPU).
const DEFAULT_TOP_PROCESSES: usize = 10;

/// Collection engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fast tier target period; also the loop's drift-correction target.
    pub fast_period: Duration,
    pub medium_period: Duration,
    pub slow_period: Duration,
    pub history_capacity: usize,
    pub top_processes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_period: Duration::from_millis(DEFAULT_FAST_PERIOD_MS),
            medium_period: Duration::from_millis(DEFAULT_MEDIUM_PERIOD_MS),
            slow_period: Duration::from_millis(DEFAULT_SLOW_PERIOD_MS),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            top_processes: DEFAULT_TOP_PROCESSES,
        }
    }
}

impl EngineConfig {
    /// Load engine config from environment variables, falling back to
    /// defaults.
    ///
    /// Supported env vars:
    /// - `FAST_TIER_MS`, `MEDIUM_TIER_MS`, `SLOW_TIER_MS`
    /// - `HISTORY_CAPACITY`
    /// - `TOP_PROCESSES`
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_u64("FAST_TIER_MS") {
            config.fast_period = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = env_u64("MEDIUM_TIER_MS") {
            config.medium_period = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = env_u64("SLOW_TIER_MS") {
            config.slow_period = Duration::from_millis(ms.max(1));
        }
        if let Some(capacity) = env_u64("HISTORY_CAPACITY") {
            config.history_capacity = (capacity as usize).max(1);
        }
        if let Some(count) = env_u64("TOP_PROCESSES") {
            config.top_processes = (count as usize).max(1);
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}
