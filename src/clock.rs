// Time source
//
// The wizard validates against the wall clock the user sees, and check-ins are
// stamped in UTC. Both go through this trait so tests can pin "now".

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::sync::RwLock;

pub trait Clock: Send + Sync {
    /// Local wall-clock time, no zone attached
    fn now_local(&self) -> NaiveDateTime;

    fn now_utc(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock. Local wall time and UTC are treated as the same instant.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.write().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now_local(&self) -> NaiveDateTime {
        *self.now.read().unwrap()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.now_local())
    }
}
