//! Retry policy: how many rounds to try and how long to wait between them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest wait between rounds
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Applies to every facade call. One attempt is a round over all candidate URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Rounds before giving up (at least one is always made)
    pub max_attempts: u32,

    /// Wait after the first failed round
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Growth factor applied to the wait after each further failed round
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one round
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Reject policies whose backoff cannot be computed
    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!("retry multiplier must be a finite number >= 1.0, got {}", self.multiplier));
        }
        if self.base_delay > MAX_DELAY {
            return Err(format!(
                "retry base_delay must not exceed {}s, got {:?}",
                MAX_DELAY.as_secs(),
                self.base_delay
            ));
        }
        Ok(())
    }

    /// Delay after `attempts` failed rounds (1-indexed): `base_delay * multiplier^(attempts - 1)`,
    /// capped at [`MAX_DELAY`]
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs).map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    pub(crate) fn rounds(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
