use time::PrimitiveDateTime;

use crate::core::time::primitive_now_utc;

/// Source of "now" for every lifecycle decision.
pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        primitive_now_utc()
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

#[cfg(test)]
mod manual {
    use std::sync::Mutex;

    use time::{Duration, PrimitiveDateTime};

    use super::Clock;

    /// Clock that only moves when a test tells it to.
    #[derive(Debug)]
    pub(crate) struct ManualClock {
        now: Mutex<PrimitiveDateTime>,
    }

    impl ManualClock {
        pub(crate) fn new(start: PrimitiveDateTime) -> Self {
            Self { now: Mutex::new(start) }
        }

        pub(crate) fn set(&self, value: PrimitiveDateTime) {
            *self.now.lock().expect("clock lock") = value;
        }

        pub(crate) fn advance(&self, by: Duration) {
            let mut now = self.now.lock().expect("clock lock");
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> PrimitiveDateTime {
            *self.now.lock().expect("clock lock")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    #[test]
    fn manual_clock_advances_only_on_request() {
        let clock = ManualClock::new(datetime!(2025-01-02 10:00:00));
        assert_eq!(clock.now(), datetime!(2025-01-02 10:00:00));

        clock.advance(Duration::minutes(61));
        assert_eq!(clock.now(), datetime!(2025-01-02 11:01:00));

        clock.set(datetime!(2025-01-01 00:00:00));
        assert_eq!(clock.now(), datetime!(2025-01-01 00:00:00));
    }

    #[test]
    fn system_clock_is_close_to_wall_time() {
        let before = primitive_now_utc();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
