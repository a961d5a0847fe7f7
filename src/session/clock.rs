// src/session/clock.rs
// Time as an injected port, so the auto-advance timer and "today" are
// controllable in tests instead of read from ambient global state.

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time, the production implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod manual {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A hand-cranked clock for session tests.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            ManualClock { now: Arc::new(Mutex::new(now)) }
        }

        pub fn advance(&self, delta: chrono::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
