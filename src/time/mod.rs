//! Time resolver: relative tokens and explicit ranges to absolute instants.
//!
//! Every window is closed on both ends. The closing instant is the last
//! microsecond of the final day, so an inclusive `BETWEEN` never picks up
//! rows from the following day.
//!
//! Months, quarters and years honour the model's fiscal offset
//! ([`CalendarConfig::fiscal_year_start_month`]); weeks start on
//! [`CalendarConfig::week_start`].

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::intent::TimeRange;
use crate::model::CalendarConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeRangeError {
    #[error("unsupported relative time expression '{0}'")]
    UnsupportedRelativeExpression(String),

    #[error("malformed time range: {0}")]
    MalformedRange(String),

    #[error("time range falls outside the supported calendar")]
    OutOfRange,
}

pub type TimeResult<T> = Result<T, TimeRangeError>;

/// Resolved `[start, end]` window.
pub type Window = (NaiveDateTime, NaiveDateTime);

/// The closed set of relative tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativePeriod {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    LastQuarter,
    ThisYear,
    LastYear,
    YearToDate,
    LastDays(u32),
}

impl FromStr for RelativePeriod {
    type Err = TimeRangeError;

    /// Case-insensitive; spaces and hyphens count as underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");

        Ok(match token.as_str() {
            "today" => RelativePeriod::Today,
            "yesterday" => RelativePeriod::Yesterday,
            "this_week" => RelativePeriod::ThisWeek,
            "last_week" => RelativePeriod::LastWeek,
            "this_month" => RelativePeriod::ThisMonth,
            "last_month" => RelativePeriod::LastMonth,
            "this_quarter" => RelativePeriod::ThisQuarter,
            "last_quarter" => RelativePeriod::LastQuarter,
            "this_year" => RelativePeriod::ThisYear,
            "last_year" => RelativePeriod::LastYear,
            "year_to_date" | "ytd" => RelativePeriod::YearToDate,
            "last_7_days" => RelativePeriod::LastDays(7),
            "last_30_days" => RelativePeriod::LastDays(30),
            "last_90_days" => RelativePeriod::LastDays(90),
            _ => return Err(TimeRangeError::UnsupportedRelativeExpression(s.into())),
        })
    }
}

impl fmt::Display for RelativePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativePeriod::Today => f.write_str("today"),
            RelativePeriod::Yesterday => f.write_str("yesterday"),
            RelativePeriod::ThisWeek => f.write_str("this_week"),
            RelativePeriod::LastWeek => f.write_str("last_week"),
            RelativePeriod::ThisMonth => f.write_str("this_month"),
            RelativePeriod::LastMonth => f.write_str("last_month"),
            RelativePeriod::ThisQuarter => f.write_str("this_quarter"),
            RelativePeriod::LastQuarter => f.write_str("last_quarter"),
            RelativePeriod::ThisYear => f.write_str("this_year"),
            RelativePeriod::LastYear => f.write_str("last_year"),
            RelativePeriod::YearToDate => f.write_str("year_to_date"),
            RelativePeriod::LastDays(n) => write!(f, "last_{}_days", n),
        }
    }
}

/// How a window steps back to its comparison baseline.
enum Shift {
    Days(i64),
    Months(u32),
    /// Same span, ending just before the start.
    Length,
}

impl RelativePeriod {
    fn shift(&self) -> Shift {
        match self {
            RelativePeriod::Today | RelativePeriod::Yesterday => Shift::Days(1),
            RelativePeriod::ThisWeek | RelativePeriod::LastWeek => Shift::Days(7),
            RelativePeriod::LastDays(n) => Shift::Days(*n as i64),
            RelativePeriod::ThisMonth | RelativePeriod::LastMonth => Shift::Months(1),
            RelativePeriod::ThisQuarter | RelativePeriod::LastQuarter => Shift::Months(3),
            RelativePeriod::ThisYear | RelativePeriod::LastYear | RelativePeriod::YearToDate => {
                Shift::Months(12)
            }
        }
    }
}

/// Resolves [`TimeRange`] values against a fixed reference date.
#[derive(Debug, Clone)]
pub struct TimeResolver {
    calendar: CalendarConfig,
    today: NaiveDate,
}

impl TimeResolver {
    pub fn new(calendar: CalendarConfig, today: NaiveDate) -> Self {
        Self { calendar, today }
    }

    /// Reference date taken from the local clock.
    pub fn from_clock(calendar: CalendarConfig) -> Self {
        Self::new(calendar, Local::now().date_naive())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Absolute window for `range`.
    pub fn resolve(&self, range: &TimeRange) -> TimeResult<Window> {
        match &range.relative {
            Some(token) => self.resolve_relative(token.parse()?),
            None => self.resolve_explicit(range),
        }
    }

    /// The comparison baseline immediately preceding `range`.
    pub fn previous_period(&self, range: &TimeRange) -> TimeResult<Window> {
        let (start, end) = self.resolve(range)?;
        let shift = match &range.relative {
            Some(token) => token.parse::<RelativePeriod>()?.shift(),
            None => Shift::Length,
        };

        match shift {
            Shift::Days(n) => Ok((start - Duration::days(n), end - Duration::days(n))),
            Shift::Months(n) => {
                let prev_start = sub_months(start.date(), n)?;
                // Whole periods close just before the current start; partial
                // ones (year to date) keep their length.
                let prev_end = if end.date() >= last_day(start.date(), n)? {
                    start - Duration::microseconds(1)
                } else {
                    end_of_day(sub_months(end.date(), n)?)
                };
                Ok((start_of_day(prev_start), prev_end))
            }
            Shift::Length => {
                let length = end - start;
                let prev_end = start - Duration::microseconds(1);
                Ok((prev_end - length, prev_end))
            }
        }
    }

    pub fn resolve_relative(&self, period: RelativePeriod) -> TimeResult<Window> {
        let today = self.today;
        let (first, last) = match period {
            RelativePeriod::Today => (today, today),
            RelativePeriod::Yesterday => {
                let d = today - Duration::days(1);
                (d, d)
            }
            RelativePeriod::ThisWeek => {
                let start = self.week_start(today);
                (start, start + Duration::days(6))
            }
            RelativePeriod::LastWeek => {
                let start = self.week_start(today) - Duration::days(7);
                (start, start + Duration::days(6))
            }
            RelativePeriod::ThisMonth => {
                let start = month_start(today)?;
                (start, last_day(start, 1)?)
            }
            RelativePeriod::LastMonth => {
                let start = sub_months(month_start(today)?, 1)?;
                (start, last_day(start, 1)?)
            }
            RelativePeriod::ThisQuarter => {
                let start = self.quarter_start(today)?;
                (start, last_day(start, 3)?)
            }
            RelativePeriod::LastQuarter => {
                let start = sub_months(self.quarter_start(today)?, 3)?;
                (start, last_day(start, 3)?)
            }
            RelativePeriod::ThisYear => {
                let start = self.year_start(today)?;
                (start, last_day(start, 12)?)
            }
            RelativePeriod::LastYear => {
                let start = sub_months(self.year_start(today)?, 12)?;
                (start, last_day(start, 12)?)
            }
            RelativePeriod::YearToDate => (self.year_start(today)?, today),
            RelativePeriod::LastDays(n) => (today - Duration::days(n as i64 - 1), today),
        };
        Ok((start_of_day(first), end_of_day(last)))
    }

    fn resolve_explicit(&self, range: &TimeRange) -> TimeResult<Window> {
        let (start, end) = match (&range.start, &range.end) {
            (Some(s), Some(e)) => (s, e),
            (None, None) => {
                return Err(TimeRangeError::UnsupportedRelativeExpression(String::new()))
            }
            _ => {
                return Err(TimeRangeError::MalformedRange(
                    "both start and end are required".into(),
                ))
            }
        };

        let start = parse_instant(start, false)?;
        let end = parse_instant(end, true)?;
        if start > end {
            return Err(TimeRangeError::MalformedRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok((start, end))
    }

    fn week_start(&self, date: NaiveDate) -> NaiveDate {
        let first = chrono::Weekday::from(self.calendar.week_start).num_days_from_monday();
        let offset = (date.weekday().num_days_from_monday() + 7 - first) % 7;
        date - Duration::days(offset as i64)
    }

    /// Months elapsed since the fiscal year began, 0..=11.
    fn fiscal_month_index(&self, date: NaiveDate) -> u32 {
        (date.month() + 12 - self.calendar.fiscal_year_start_month) % 12
    }

    fn quarter_start(&self, date: NaiveDate) -> TimeResult<NaiveDate> {
        sub_months(month_start(date)?, self.fiscal_month_index(date) % 3)
    }

    fn year_start(&self, date: NaiveDate) -> TimeResult<NaiveDate> {
        sub_months(month_start(date)?, self.fiscal_month_index(date))
    }
}

fn month_start(date: NaiveDate) -> TimeResult<NaiveDate> {
    date.with_day(1).ok_or(TimeRangeError::OutOfRange)
}

fn sub_months(date: NaiveDate, n: u32) -> TimeResult<NaiveDate> {
    date.checked_sub_months(Months::new(n))
        .ok_or(TimeRangeError::OutOfRange)
}

/// Last day of the `months`-long period starting at `start`.
fn last_day(start: NaiveDate, months: u32) -> TimeResult<NaiveDate> {
    let next = start
        .checked_add_months(Months::new(months))
        .ok_or(TimeRangeError::OutOfRange)?;
    Ok(next - Duration::days(1))
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// 23:59:59.999999 on `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + Duration::days(1) - Duration::microseconds(1)
}

/// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS[.ffffff]`. A bare date used as the
/// end of a range closes at the end of that day.
pub fn parse_instant(s: &str, is_end: bool) -> TimeResult<NaiveDateTime> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(if is_end {
            end_of_day(date)
        } else {
            start_of_day(date)
        });
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| TimeRangeError::MalformedRange(format!("cannot parse '{}' as a date", s)))
}
