use chrono::{Datelike, Days, Months, NaiveDate};
use thiserror::Error;

use crate::error::{AppError, Result};

/// Earliest date the upload service holds data for.
const MIN_YEAR: i32 = 2025;
const MIN_MONTH: u32 = 1;

pub fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(MIN_YEAR, MIN_MONTH, 1).unwrap_or(NaiveDate::MIN)
}

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn min_date_label() -> String {
    min_date().format("%b %Y").to_string()
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeViolation {
    #[error("Start date must be before end date")]
    StartAfterEnd,
    #[error("End date cannot be in the future")]
    EndInFuture,
    #[error("Date range cannot be before {}", min_date_label())]
    BeforeMinimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// One calendar month back through today.
    pub fn default_for(today: NaiveDate) -> Self {
        let start = today.checked_sub_months(Months::new(1)).unwrap_or(today);
        Self::new(start, today)
    }

    /// The "reset filters" range: today only.
    pub fn today(today: NaiveDate) -> Self {
        Self::new(today, today)
    }

    pub fn validate(&self, today: NaiveDate) -> std::result::Result<(), RangeViolation> {
        validate_range(self.start, self.end, today)
    }

    /// Query-string form used by the analytics endpoint.
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// Header label, e.g. "Mar 01, 2025 - Mar 31, 2025".
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%b %d, %Y"),
            self.end.format("%b %d, %Y")
        )
    }
}

/// Check a candidate range. The first violated rule wins, in this order:
/// start after end, end in the future, start before the minimum date.
pub fn validate_range(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> std::result::Result<(), RangeViolation> {
    if start > end {
        return Err(RangeViolation::StartAfterEnd);
    }
    if end > today {
        return Err(RangeViolation::EndInFuture);
    }
    if start < min_date() {
        return Err(RangeViolation::BeforeMinimum);
    }
    Ok(())
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidDate(s.trim().to_string()))
}

/// Resolve optional `--from`/`--to` arguments against the default range.
pub fn range_from_args(
    from: Option<&str>,
    to: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange> {
    let default = DateRange::default_for(today);
    let start = from.map(parse_date).transpose()?.unwrap_or(default.start);
    let end = to.map(parse_date).transpose()?.unwrap_or(default.end);
    Ok(DateRange::new(start, end))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickRange {
    Today,
    Yesterday,
    Last24Hours,
    Last7Days,
    Last30Days,
    ThisYear,
}

impl QuickRange {
    pub const ALL: [QuickRange; 6] = [
        QuickRange::Today,
        QuickRange::Yesterday,
        QuickRange::Last24Hours,
        QuickRange::Last7Days,
        QuickRange::Last30Days,
        QuickRange::ThisYear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QuickRange::Today => "Today",
            QuickRange::Yesterday => "Yesterday",
            QuickRange::Last24Hours => "Last 24 Hours",
            QuickRange::Last7Days => "Last 7 Days",
            QuickRange::Last30Days => "Last 30 Days",
            QuickRange::ThisYear => "This Year",
        }
    }

    pub fn resolve(self, today: NaiveDate) -> DateRange {
        let back = |days: u64| today.checked_sub_days(Days::new(days)).unwrap_or(today);
        match self {
            QuickRange::Today => DateRange::new(today, today),
            QuickRange::Yesterday => DateRange::new(back(1), back(1)),
            // Day granularity: yesterday through today.
            QuickRange::Last24Hours => DateRange::new(back(1), today),
            QuickRange::Last7Days => DateRange::new(back(7), today),
            QuickRange::Last30Days => DateRange::new(back(30), today),
            QuickRange::ThisYear => {
                let jan1 = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                DateRange::new(jan1, today)
            }
        }
    }
}
