// src/clock.rs
use chrono::{Local, NaiveDate, NaiveDateTime};

/// Source of "now" for stamping submissions.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Frozen clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    current_time: NaiveDateTime,
}

impl FixedClock {
    pub fn new(datetime_str: &str) -> Self {
        let current_time = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| panic!("Invalid datetime string: {}", datetime_str));
        Self { current_time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.current_time
    }
}
