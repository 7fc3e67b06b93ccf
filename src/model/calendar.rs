// src/model/calendar.rs
use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// Calendar convention used to resolve relative time expressions.
///
/// `fiscal_year_start_month = 1` is the plain calendar year. Any other value
/// shifts quarters and years so the fiscal year begins on the first day of
/// that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub fiscal_year_start_month: u32,
    pub week_start: WeekStart,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            fiscal_year_start_month: 1,
            week_start: WeekStart::Monday,
        }
    }
}

impl CalendarConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(ModelError::InvalidCalendar(format!(
                "fiscal_year_start_month must be 1-12, got {}",
                self.fiscal_year_start_month
            )));
        }
        Ok(())
    }
}

/// First day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<WeekStart> for Weekday {
    fn from(day: WeekStart) -> Self {
        match day {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Tuesday => Weekday::Tue,
            WeekStart::Wednesday => Weekday::Wed,
            WeekStart::Thursday => Weekday::Thu,
            WeekStart::Friday => Weekday::Fri,
            WeekStart::Saturday => Weekday::Sat,
            WeekStart::Sunday => Weekday::Sun,
        }
    }
}
