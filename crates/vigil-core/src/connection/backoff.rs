// ── Reconnect backoff ──

use std::time::Duration;

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based).
///
/// `delay = min(max, initial * 2^(attempt - 1))`, no jitter: 1s, 2s, 4s,
/// 8s, 16s, 30s, 30s... with the defaults.
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    config
        .initial_delay
        .checked_mul(1_u32 << exponent)
        .map_or(config.max_delay, |d| d.min(config.max_delay))
}
