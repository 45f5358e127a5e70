use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, rendered as `"YYYY-MM"` with a zero-padded month.
///
/// Ordering is chronological, so a `BTreeMap<MonthKey, _>` iterates months in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(0..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(ForecastError::InvalidMonthKey(format!(
                "{}-{}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || ForecastError::InvalidMonthKey(value.to_string());

        let (year_part, month_part) = value.split_once('-').ok_or_else(invalid)?;
        if year_part.len() != 4
            || month_part.len() != 2
            || !year_part.chars().all(|c| c.is_ascii_digit())
            || !month_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year: i32 = year_part.parse().map_err(|_| invalid())?;
        let month: u32 = month_part.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: MonthKey) -> i32 {
        let year_diff = other.year - self.year;
        let month_diff = other.month as i32 - self.month as i32;
        year_diff * 12 + month_diff
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

impl JsonSchema for MonthKey {
    fn schema_name() -> String {
        "MonthKey".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let mut schema = String::json_schema(gen).into_object();
        schema.metadata().description =
            Some("Calendar month in YYYY-MM format (e.g. 2025-07)".to_string());
        schema.string().pattern = Some(r"^\d{4}-(0[1-9]|1[0-2])$".to_string());
        schema.into()
    }
}

/// An inclusive span of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MonthRange {
    #[schemars(description = "First month of the period (inclusive)")]
    pub start: MonthKey,

    #[schemars(description = "Last month of the period (inclusive)")]
    pub end: MonthKey,
}

impl MonthRange {
    pub fn new(start: MonthKey, end: MonthKey) -> Self {
        Self { start, end }
    }

    pub fn months(&self) -> Vec<MonthKey> {
        month_keys_in_range(self.start, self.end)
    }

    pub fn contains(&self, key: MonthKey) -> bool {
        self.start <= key && key <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.start.months_until(self.end) as usize + 1
        }
    }
}

impl fmt::Display for MonthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// All month keys from `start` to `end`, inclusive. Empty when `start > end`.
pub fn month_keys_in_range(start: MonthKey, end: MonthKey) -> Vec<MonthKey> {
    let mut keys = Vec::new();
    let mut current = start;
    while current <= end {
        keys.push(current);
        current = current.next();
    }
    keys
}

pub fn month_key_of(date: NaiveDate) -> MonthKey {
    MonthKey::from_date(date)
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM".
pub fn parse_period_string(period: &str) -> Result<MonthRange> {
    let parts: Vec<&str> = period.split(':').collect();

    match parts.len() {
        1 => {
            let key = MonthKey::parse(parts[0].trim())?;
            Ok(MonthRange::new(key, key))
        }
        2 => {
            let start = MonthKey::parse(parts[0].trim())?;
            let end = MonthKey::parse(parts[1].trim())?;
            Ok(MonthRange::new(start, end))
        }
        _ => Err(ForecastError::InvalidPeriodOrder(format!(
            "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
            period
        ))),
    }
}

pub fn validate_fiscal_year_end_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ForecastError::InvalidFiscalYearEndMonth(month));
    }
    Ok(())
}

/// Returns the 0-based index of the month within the fiscal year.
///
/// # Examples
/// - If FY ends in Dec (12): Jan=0, Feb=1, ..., Dec=11
/// - If FY ends in June (6): July=0, Aug=1, ..., June=11
pub fn fiscal_month_index(calendar_month: u32, fiscal_year_end_month: u32) -> usize {
    let fy_start_month = if fiscal_year_end_month == 12 {
        1
    } else {
        fiscal_year_end_month + 1
    };

    if calendar_month >= fy_start_month {
        (calendar_month - fy_start_month) as usize
    } else {
        (calendar_month + 12 - fy_start_month) as usize
    }
}

/// The fiscal year a month belongs to, labelled by the calendar year in which it ends.
pub fn fiscal_year_of(key: MonthKey, fiscal_year_end_month: u32) -> i32 {
    if key.month() <= fiscal_year_end_month {
        key.year()
    } else {
        key.year() + 1
    }
}

/// 1-based fiscal quarter of a month.
pub fn fiscal_quarter_of(key: MonthKey, fiscal_year_end_month: u32) -> u32 {
    (fiscal_month_index(key.month(), fiscal_year_end_month) / 3) as u32 + 1
}
