//! The evaluation period that concordance is measured over.
use chrono::{Duration, NaiveDate, NaiveDateTime};
use qu::ick_use::*;
use std::fmt;

use crate::util::{self, days_to_duration, saturating_sub, start_of_day};

/// An inclusive date range `[start, end]`, with `end = start + length - 1 day`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EvaluationWindow {
    start: NaiveDate,
    end: NaiveDate,
    length: u32,
}

impl EvaluationWindow {
    /// Create the window from its first day and its length in days.
    pub fn new(start: NaiveDate, length: u32) -> Result<Self> {
        ensure!(
            length > 0,
            "the evaluation length must be a positive number of days, found {}",
            length
        );
        let end = start
            .checked_add_signed(Duration::days(i64::from(length) - 1))
            .with_context(|| {
                format!(
                    "an evaluation period of {} days starting {} ends outside the supported date range",
                    length, start
                )
            })?;
        // the sentinel must be representable too.
        ensure!(
            end.succ_opt().is_some(),
            "the evaluation period ending {} leaves no room for the day after it",
            end
        );
        Ok(EvaluationWindow { start, end, length })
    }

    /// Like `new`, with the start date given as text in the `YYYY-MM-DD` format.
    pub fn parse(start: &str, length: u32) -> Result<Self> {
        let start = util::parse_date(start).context("invalid evaluation start date")?;
        Self::new(start, length)
    }

    /// The first day of the window.
    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// The last day of the window.
    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    /// The number of days in the window.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn start(&self) -> NaiveDateTime {
        start_of_day(self.start)
    }

    pub fn end(&self) -> NaiveDateTime {
        start_of_day(self.end)
    }

    /// Whether `date` falls within the window (both ends inclusive).
    pub fn contains(&self, date: NaiveDateTime) -> bool {
        self.start() <= date && date <= self.end()
    }

    /// The earliest point that activity before the window is allowed to cover from.
    ///
    /// Activity older than this can't bridge into the window, so anything earlier is treated as
    /// if it happened here.
    pub fn dummy_date(&self, validity_duration: f64) -> NaiveDateTime {
        saturating_sub(self.start(), days_to_duration(validity_duration))
    }

    /// The day after the window ends, used to measure the coverage of the last activity.
    pub fn sentinel_date(&self) -> NaiveDateTime {
        // `new` checks this exists
        start_of_day(self.end.succ_opt().unwrap_or(self.end))
    }
}

impl fmt::Display for EvaluationWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} - {} ({} days)", self.start, self.end, self.length)
    }
}
