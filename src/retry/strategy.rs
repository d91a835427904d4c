// src/retry/strategy.rs

use crate::config::{BackoffKind, RetryConfig};
use std::time::Duration;

/// Delay to wait after failed attempt number `attempt` (1-based).
pub fn delay_for(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.interval_ms;

    let delay = match config.backoff {
        BackoffKind::Fixed => base,
        BackoffKind::Exponential => {
            // base * 2^(attempt - 1)
            let exponential =
                base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
            match config.max_interval_ms {
                Some(max) => exponential.min(max),
                None => exponential,
            }
        }
    };

    if config.jitter && delay > 0 {
        // Add jitter (0-25% of the calculated delay)
        let jitter = (delay as f64 * rand::random::<f64>() * 0.25) as u64;
        Duration::from_millis(delay.saturating_add(jitter))
    } else {
        Duration::from_millis(delay)
    }
}
