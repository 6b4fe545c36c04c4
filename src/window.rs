//! Reporting window resolution.
//!
//! A window always ends on a fully elapsed day: yesterday at 23:59:59 in the
//! report time zone. The strategy decides where it starts. Each window has two
//! text forms: the display form used in message headers (`1 Jan 2024`) and
//! the query form sent to the ticket monitor (`2024-01-01` or
//! `2024-01-01 00:00`).

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const DISPLAY_FORMAT: &str = "%-d %b %Y";
const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";
const QUERY_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("report window starts at {start} which is after its end {end}")]
    Inverted {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("report window out of calendar range: {0}")]
    OutOfRange(String),
}

/// How the start of the reporting window is chosen
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WindowStrategy {
    /// From a fixed calendar date
    FixedStart { date: NaiveDate },
    /// From the first day of the month `months` months before the current one
    RollingMonths { months: u32 },
    /// The last `days` fully elapsed days
    RollingDays { days: u32 },
    /// From January 1st of the current year
    #[default]
    YearToDate,
    /// The whole previous calendar year
    PreviousYear,
}

/// Textual date form expected by the ticket-monitor endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFormat {
    Date,
    #[default]
    DateTime,
}

impl QueryFormat {
    fn pattern(self) -> &'static str {
        match self {
            QueryFormat::Date => QUERY_DATE_FORMAT,
            QueryFormat::DateTime => QUERY_DATE_TIME_FORMAT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl ReportWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Calendar year the window ends in
    pub fn year(&self) -> i32 {
        self.end.year()
    }

    pub fn display_start(&self) -> String {
        self.start.format(DISPLAY_FORMAT).to_string()
    }

    pub fn display_end(&self) -> String {
        self.end.format(DISPLAY_FORMAT).to_string()
    }

    /// `1 Jan 2024 - 31 Jan 2024`
    pub fn display_range(&self) -> String {
        format!("{} - {}", self.display_start(), self.display_end())
    }

    pub fn query_start(&self, format: QueryFormat) -> String {
        self.start.format(format.pattern()).to_string()
    }

    pub fn query_end(&self, format: QueryFormat) -> String {
        self.end.format(format.pattern()).to_string()
    }

    pub fn query_range(&self, format: QueryFormat) -> String {
        format!("{} - {}", self.query_start(format), self.query_end(format))
    }
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_range())
    }
}

impl WindowStrategy {
    /// Resolve the window relative to `now`, a wall-clock time already
    /// expressed in the report time zone.
    pub fn resolve(&self, now: NaiveDateTime) -> Result<ReportWindow, WindowError> {
        let today = now.date();
        let yesterday_end = end_of_day(previous_day(today)?);

        let (start, end) = match self {
            WindowStrategy::FixedStart { date } => (start_of_day(*date), yesterday_end),
            WindowStrategy::RollingMonths { months } => {
                let month_start = first_of_month(today)?;
                let start = month_start
                    .checked_sub_months(Months::new(*months))
                    .ok_or_else(|| out_of_range(format!("{months} months before {month_start}")))?;
                (start_of_day(start), yesterday_end)
            }
            WindowStrategy::RollingDays { days } => {
                let start = today
                    .checked_sub_days(Days::new(u64::from((*days).max(1))))
                    .ok_or_else(|| out_of_range(format!("{days} days before {today}")))?;
                (start_of_day(start), yesterday_end)
            }
            WindowStrategy::YearToDate => {
                let year_start = first_of_year(today.year())?;
                // On January 1st no day of the year has elapsed yet
                let end = if today == year_start { now } else { yesterday_end };
                (start_of_day(year_start), end)
            }
            WindowStrategy::PreviousYear => {
                let year = today.year() - 1;
                let start = first_of_year(year)?;
                let end = NaiveDate::from_ymd_opt(year, 12, 31)
                    .ok_or_else(|| out_of_range(format!("December 31st of {year}")))?;
                (start_of_day(start), end_of_day(end))
            }
        };

        ReportWindow::new(start, end)
    }
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    // 23:59:59 is always a valid wall-clock time
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

fn previous_day(date: NaiveDate) -> Result<NaiveDate, WindowError> {
    date.pred_opt()
        .ok_or_else(|| out_of_range(format!("day before {date}")))
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate, WindowError> {
    date.with_day(1)
        .ok_or_else(|| out_of_range(format!("first of month for {date}")))
}

fn first_of_year(year: i32) -> Result<NaiveDate, WindowError> {
    NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| out_of_range(format!("January 1st of {year}")))
}

fn out_of_range(what: String) -> WindowError {
    WindowError::OutOfRange(what)
}
