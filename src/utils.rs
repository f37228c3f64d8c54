use crate::error::{ReconciliationError, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed date interval `[start, end]`, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ReconciliationError::ValidationFailed(format!(
                "window end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// The calendar month `year-month`, first to last day.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            ReconciliationError::DateError(format!("invalid month {}-{:02}", year, month))
        })?;
        Ok(Self {
            start,
            end: last_day_of_month(year, month)?,
        })
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Window match for a record: the authoritative date wins, the creation
    /// timestamp is only consulted when the authoritative date is missing.
    pub fn contains(&self, primary: Option<DateTime<Utc>>, created_at: DateTime<Utc>) -> bool {
        let date = primary.unwrap_or(created_at).date_naive();
        self.contains_date(date)
    }

    pub fn contains_naive(&self, primary: Option<NaiveDate>, created_at: DateTime<Utc>) -> bool {
        let date = primary.unwrap_or_else(|| created_at.date_naive());
        self.contains_date(date)
    }

    /// Every calendar month touched by the window, as `(year, month)`.
    pub fn months(&self) -> Vec<(i32, u32)> {
        let mut months = Vec::new();
        let (mut year, mut month) = (self.start.year(), self.start.month());
        loop {
            months.push((year, month));
            if year == self.end.year() && month == self.end.month() {
                break;
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        months
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| {
            ReconciliationError::DateError(format!("invalid month {}-{:02}", year, month))
        })
}

/// `day` of the given month, clamped to the month's last day.
pub fn clamp_day_in_month(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    let day = day.clamp(1, last.day());
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ReconciliationError::DateError(format!("invalid day {}", day)))
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// into the closed window covering those months.
pub fn parse_period_string(period: &str) -> Result<DateWindow> {
    let parts: Vec<&str> = period.split(':').collect();

    let parse_month_start = |raw: &str| {
        NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").map_err(|_| {
            ReconciliationError::DateError(format!(
                "Invalid date format in period: {}. Expected YYYY-MM",
                raw
            ))
        })
    };

    match parts.len() {
        1 => {
            let start = parse_month_start(parts[0])?;
            DateWindow::month(start.year(), start.month())
        }
        2 => {
            let start = parse_month_start(parts[0])?;
            let end_ref = parse_month_start(parts[1])?;
            let end = last_day_of_month(end_ref.year(), end_ref.month())?;
            DateWindow::new(start, end)
        }
        _ => Err(ReconciliationError::DateError(format!(
            "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
            period
        ))),
    }
}

/// Rounds to cents, midpoint away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

pub fn sum_amounts<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |acc, x| acc + x)
}
