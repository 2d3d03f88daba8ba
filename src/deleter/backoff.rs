use std::time::Duration;

use crate::config::BackoffConfig;

/// Delay sequence for retrying a throttled batch.
///
/// Delays grow by `multiplier` from the initial interval until they reach the
/// max interval, then stay there. There is no jitter and no attempt limit.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(config: &BackoffConfig) -> Self {
        let max = Duration::from_millis(config.max_interval_milliseconds);
        let initial = Duration::from_millis(config.initial_interval_milliseconds).min(max);

        ExponentialBackoff {
            current: initial,
            max,
            multiplier: config.multiplier.max(1.0),
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        delay
    }
}
