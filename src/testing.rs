//! Deterministic clock and randomness for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use crate::pacing::{Clock, RandomSource};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A clock that only moves when told to. Sleeping returns at once, records
/// the duration and advances the clock by it.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
    trip: Mutex<Option<(Duration, CancellationToken)>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(ManualClock {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
            trip: Mutex::new(None),
        })
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Cancels `token` the first time something sleeps at least `at_least`.
    pub fn cancel_on_sleep_of(&self, at_least: Duration, token: CancellationToken) {
        *self.trip.lock().unwrap() = Some((at_least, token));
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(chrono::Duration::from_std(duration).unwrap());
        if let Some((at_least, token)) = self.trip.lock().unwrap().as_ref() {
            if duration >= *at_least {
                token.cancel();
            }
        }
        tokio::task::yield_now().await;
    }
}

/// Returns queued values (clamped into the requested range), then `low`.
#[derive(Default)]
pub struct ScriptedRandom {
    values: Mutex<VecDeque<u64>>,
    ranges: Mutex<Vec<(u64, u64)>>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = u64>) -> Arc<Self> {
        Arc::new(ScriptedRandom {
            values: Mutex::new(values.into_iter().collect()),
            ranges: Mutex::new(Vec::new()),
        })
    }

    /// Every `(low, high)` range asked for so far.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.ranges.lock().unwrap().clone()
    }
}

impl RandomSource for ScriptedRandom {
    fn range_inclusive(&self, low: u64, high: u64) -> u64 {
        self.ranges.lock().unwrap().push((low, high));
        match self.values.lock().unwrap().pop_front() {
            Some(value) => value.clamp(low, high.max(low)),
            None => low,
        }
    }
}
