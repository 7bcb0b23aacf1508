//! Randomized pauses between remote calls, so the account does not look
//! like it is driven by a script.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ConfigError;
use crate::models::SleepPolicy;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `low..=high`.
    fn range_inclusive(&self, low: u64, high: u64) -> u64;

    /// Uniform index in `0..len`. `len` must not be zero.
    fn index(&self, len: usize) -> usize {
        self.range_inclusive(0, len.saturating_sub(1) as u64) as usize
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn range_inclusive(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}

impl SleepPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Policy {
            policy: "sleep",
            reason: reason.to_string(),
        };
        if self.extra_chance_total == 0 {
            return Err(invalid("extra pause chance denominator must be positive"));
        }
        if self.extra_chance > self.extra_chance_total {
            return Err(invalid("extra pause chance exceeds its denominator"));
        }
        if self.extra_min > self.extra_max {
            return Err(invalid("extra pause minimum exceeds maximum"));
        }
        Ok(())
    }
}

/// Applies a [`SleepPolicy`] between remote calls. A disabled pacer (debug
/// mode) never sleeps; neither does any pacer once shutdown is requested.
#[derive(Clone)]
pub struct Pacer {
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    enabled: bool,
    shutdown: CancellationToken,
}

impl Pacer {
    pub fn new(
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        enabled: bool,
        shutdown: CancellationToken,
    ) -> Self {
        Pacer {
            clock,
            rng,
            enabled,
            shutdown,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn delay_before_next_action(&self, policy: &SleepPolicy) {
        if !self.enabled {
            return;
        }
        self.jitter(policy.max_rand).await;
        if policy.extra_chance_total == 0 {
            return;
        }
        let draw = self.rng.range_inclusive(0, policy.extra_chance_total - 1);
        if draw < policy.extra_chance {
            let secs = self.rng.range_inclusive(policy.extra_min, policy.extra_max);
            debug!(secs, "taking an extra pause");
            self.pause(Duration::from_secs(secs)).await;
        }
    }

    /// Sleeps a random `0..=max_secs` seconds.
    pub async fn jitter(&self, max_secs: u64) {
        if !self.enabled {
            return;
        }
        let secs = self.rng.range_inclusive(0, max_secs);
        self.pause(Duration::from_secs(secs)).await;
    }

    async fn pause(&self, duration: Duration) {
        if duration.is_zero() || self.shutdown.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = self.clock.sleep(duration) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }
}
