//! Calendar date parsing, validation and formatting for client records.
//!
//! Accepted input is `M/D/Y` or `M-D-Y` with one or two digit month and day
//! and a two or four digit year. Dates render back as `M/D/Y` without zero
//! padding. "Now" is read from a [`Clock`] on every call so a long-running
//! process never works from a stale default.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use thiserror::Error;

pub use crate::error::TemporalConstraint;
use crate::types::Config;

/// Source of the current moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Local wall-clock time, read on every call.
    System,
    /// A pinned moment, for tests and replays.
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Why a raw date string was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("Incorrect date formatting: {0}")]
    Format(String),

    #[error("Impossible date: {0}")]
    Range(String),

    #[error("Date too far in past: {0}")]
    TooFarInPast(String),

    #[error("Date {raw} {}", .constraint.describe())]
    TemporalConstraint {
        raw: String,
        constraint: TemporalConstraint,
    },
}

fn re_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{1,2})[/-]([0-9]{1,2})[/-]([0-9]{4}|[0-9]{2})$").unwrap()
    })
}

/// Render a date as `M/D/Y`, e.g. `3/4/2018`.
pub fn format_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Parses and checks dates against the configured age ceiling and the
/// current day.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    clock: Clock,
    max_age_years: u32,
    reminder_offset_days: u32,
}

impl DateNormalizer {
    /// Normalizer on the system clock.
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Clock::System)
    }

    pub fn with_clock(config: &Config, clock: Clock) -> Self {
        Self {
            clock,
            max_age_years: config.max_age_years,
            reminder_offset_days: config.reminder_offset_days,
        }
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Parse a raw date, refusing anything older than the age ceiling.
    pub fn parse(&self, raw: &str) -> Result<NaiveDate, DateError> {
        let now = self.clock.now();
        let date = self.parse_calendar(raw, now)?;

        // The ceiling is 52 weeks per year, measured from this exact moment.
        // One too wide for chrono to represent means no ceiling at all.
        let weeks = 52 * i64::from(self.max_age_years);
        let cutoff = Duration::try_weeks(weeks).and_then(|span| now.checked_sub_signed(span));
        if let Some(cutoff) = cutoff {
            if date.and_time(NaiveTime::default()) < cutoff {
                return Err(DateError::TooFarInPast(raw.to_string()));
            }
        }
        Ok(date)
    }

    /// Parse a date already held in the store. No age ceiling applies: a
    /// client admitted years ago keeps a readable record.
    pub fn parse_stored(&self, raw: &str) -> Result<NaiveDate, DateError> {
        self.parse_calendar(raw, self.clock.now())
    }

    fn parse_calendar(&self, raw: &str, now: NaiveDateTime) -> Result<NaiveDate, DateError> {
        let caps = re_date()
            .captures(raw)
            .ok_or_else(|| DateError::Format(raw.to_string()))?;

        let month: u32 = caps[1]
            .parse()
            .map_err(|_| DateError::Format(raw.to_string()))?;
        let day: u32 = caps[2]
            .parse()
            .map_err(|_| DateError::Format(raw.to_string()))?;

        // Two-digit years borrow the current year's first two digits:
        // "18" in 2026 is 2018, and "99" in 2026 is 2099.
        let year_text = if caps[3].len() == 2 {
            let current = format!("{:04}", now.year());
            format!("{}{}", &current[..2], &caps[3])
        } else {
            caps[3].to_string()
        };
        let year: i32 = year_text
            .parse()
            .map_err(|_| DateError::Format(raw.to_string()))?;

        if year < 1 {
            return Err(DateError::Range(raw.to_string()));
        }
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| DateError::Range(raw.to_string()))
    }

    pub fn is_in_future(&self, date: NaiveDate) -> bool {
        self.today() < date
    }

    pub fn is_in_past(&self, date: NaiveDate) -> bool {
        self.today() > date
    }

    pub fn is_today(&self, date: NaiveDate) -> bool {
        self.today() == date
    }

    /// True when a client with this reminder date should be contacted now.
    pub fn contact_now(&self, date: NaiveDate) -> bool {
        self.is_today(date) || self.is_in_past(date)
    }

    /// Parse, apply a temporal constraint, and render as `M/D/Y`.
    pub fn prepare(&self, raw: &str, constraint: TemporalConstraint) -> Result<String, DateError> {
        self.parse_constrained(raw, constraint).map(format_date)
    }

    /// Parse and refuse a date on the forbidden side of today.
    pub fn parse_constrained(
        &self,
        raw: &str,
        constraint: TemporalConstraint,
    ) -> Result<NaiveDate, DateError> {
        let date = self.parse(raw)?;
        let violated = match constraint {
            TemporalConstraint::None => false,
            TemporalConstraint::MustNotBeFuture => self.is_in_future(date),
            TemporalConstraint::MustNotBePast => self.is_in_past(date),
        };
        if violated {
            return Err(DateError::TemporalConstraint {
                raw: raw.to_string(),
                constraint,
            });
        }
        Ok(date)
    }

    /// Reminder date for a client with no explicit schedule: today plus the
    /// configured offset.
    pub fn default_reminder_date(&self) -> NaiveDate {
        let today = self.today();
        today
            .checked_add_signed(Duration::days(i64::from(self.reminder_offset_days)))
            .unwrap_or(today)
    }

    pub fn default_reminder_string(&self) -> String {
        format_date(self.default_reminder_date())
    }
}
