//! # Trading Calendar
//!
//! Weekend-aware business-day arithmetic. No holiday calendar is applied;
//! every Monday through Friday counts as a trading day.

use chrono::Datelike;
use chrono::Days;
use chrono::NaiveDate;
use chrono::Weekday;

/// Whether `date` falls on a weekday.
pub fn is_business_day(date: NaiveDate) -> bool {
  !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First business day strictly after `date`.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
  let mut day = date + Days::new(1);
  while !is_business_day(day) {
    day = day + Days::new(1);
  }
  day
}

/// The next `count` business days strictly after `start`.
pub fn business_days_after(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
  let mut days = Vec::with_capacity(count);
  let mut day = start;
  for _ in 0..count {
    day = next_business_day(day);
    days.push(day);
  }
  days
}
