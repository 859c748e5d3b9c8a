//! Clock implementations for the `Clock` port.

use std::sync::RwLock;

use chrono::{Days, NaiveDate, Utc};

use crate::traits::Clock;

/// Today's date in UTC. Every caller shares the same reference frame,
/// so a deadline never flips tier depending on who evaluates it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to a chosen date that can be moved by hand.
#[derive(Debug)]
pub struct ManualClock {
    today: RwLock<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { today: RwLock::new(today) }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.write().unwrap_or_else(|e| e.into_inner()) = today;
    }

    /// Moves the clock forward. Saturates at the end of the calendar.
    pub fn advance_days(&self, days: u64) {
        let mut today = self.today.write().unwrap_or_else(|e| e.into_inner());
        *today = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.today.read().unwrap_or_else(|e| e.into_inner())
    }
}
