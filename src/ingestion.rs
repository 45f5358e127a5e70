//! P&L CSV import.
//!
//! Expected layout: a header row with `Account Name`, `Category`, then one column per
//! month labelled like `Jul 2024` (also `jul-24`, `Jul/2024`, `July 2024`). Rows that
//! are totals or summaries are skipped. Amounts lose their `$`, `,` and sign.

use crate::error::{ForecastError, Result};
use crate::schema::{AccountCategory, AccountLine};
use crate::utils::MonthKey;
use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const ACCOUNT_NAME_HEADER: &str = "Account Name";
pub const CATEGORY_HEADER: &str = "Category";

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Category given to rows whose label matches nothing known.
    /// `None` keeps them as [`AccountCategory::Unclassified`].
    pub unclassified_fallback: Option<AccountCategory>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            unclassified_fallback: Some(AccountCategory::OperatingExpenses),
        }
    }
}

/// Reads a `Mon YYYY` style column header. Returns `None` for anything else.
pub fn parse_month_header(header: &str) -> Option<MonthKey> {
    let header = header.trim().to_lowercase();
    let tokens: Vec<&str> = header
        .split(|c: char| c.is_whitespace() || c == '-' || c == '/')
        .filter(|t| !t.is_empty())
        .collect();

    let [month_token, year_token] = tokens.as_slice() else {
        return None;
    };

    if month_token.len() < 3 || !year_token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let month = MONTH_NAMES
        .iter()
        .position(|name| name.starts_with(month_token))? as u32
        + 1;

    let year: i32 = match year_token.len() {
        2 => 2000 + year_token.parse::<i32>().ok()?,
        4 => year_token.parse().ok()?,
        _ => return None,
    };

    MonthKey::new(year, month).ok()
}

/// Strips currency symbols, thousands separators and accounting parentheses and drops
/// the sign. Blank or non-numeric cells give `None`.
pub fn parse_amount(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '(' | ')') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(f64::abs)
}

/// Total and summary rows aggregate other rows and are not accounts.
pub fn is_aggregate_row(account_name: &str) -> bool {
    let name = account_name.to_lowercase();
    name.contains("total") || name.contains("summary")
}

pub fn import_pnl_csv<R: Read>(reader: R, options: &ImportOptions) -> Result<Vec<AccountLine>> {
    let mut csv_reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| ForecastError::MissingHeader(name.to_string()))
    };
    let name_col = column(ACCOUNT_NAME_HEADER)?;
    let category_col = column(CATEGORY_HEADER)?;

    let month_cols: Vec<(usize, MonthKey)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != name_col && *i != category_col)
        .filter_map(|(i, h)| match parse_month_header(h) {
            Some(key) => Some((i, key)),
            None => {
                debug!("Ignoring column '{}': not a month header", h);
                None
            }
        })
        .collect();

    if month_cols.is_empty() {
        return Err(ForecastError::NoMonthColumns);
    }

    let mut lines: Vec<AccountLine> = Vec::new();

    for record in csv_reader.records() {
        let record = record?;

        let account_name = record.get(name_col).unwrap_or("").trim();
        if account_name.is_empty() || is_aggregate_row(account_name) {
            continue;
        }

        let label = record.get(category_col).unwrap_or("");
        let category = match AccountCategory::classify(label) {
            AccountCategory::Unclassified => {
                warn!(
                    "Account '{}' has unrecognised category '{}'",
                    account_name, label
                );
                options
                    .unclassified_fallback
                    .unwrap_or(AccountCategory::Unclassified)
            }
            category => category,
        };

        let position = lines
            .iter()
            .position(|l| l.account_name == account_name && l.category == category);
        let line = match position {
            Some(index) => &mut lines[index],
            None => {
                lines.push(AccountLine::new(account_name, category));
                let last = lines.len() - 1;
                &mut lines[last]
            }
        };

        for (col, month) in &month_cols {
            if let Some(amount) = record.get(*col).and_then(parse_amount) {
                *line.actual_months.entry(*month).or_insert(0.0) += amount;
            }
        }
    }

    if lines.is_empty() {
        return Err(ForecastError::NoDataRows);
    }

    info!(
        "Imported {} account lines across {} month columns",
        lines.len(),
        month_cols.len()
    );

    Ok(lines)
}

pub fn import_pnl_csv_str(data: &str, options: &ImportOptions) -> Result<Vec<AccountLine>> {
    import_pnl_csv(data.as_bytes(), options)
}

pub fn import_pnl_csv_path<P: AsRef<Path>>(
    path: P,
    options: &ImportOptions,
) -> Result<Vec<AccountLine>> {
    let file = File::open(path)?;
    import_pnl_csv(file, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> MonthKey {
        MonthKey::parse(s).unwrap()
    }

    #[test]
    fn test_month_header_formats() {
        assert_eq!(parse_month_header("Jul 2024"), Some(key("2024-07")));
        assert_eq!(parse_month_header("jul 2024"), Some(key("2024-07")));
        assert_eq!(parse_month_header("JUL-24"), Some(key("2024-07")));
        assert_eq!(parse_month_header("Dec/2025"), Some(key("2025-12")));
        assert_eq!(parse_month_header("September 2024"), Some(key("2024-09")));
        assert_eq!(parse_month_header("Sept 2024"), Some(key("2024-09")));
        assert_eq!(parse_month_header("Total"), None);
        assert_eq!(parse_month_header("Jul 202"), None);
        assert_eq!(parse_month_header("Ju 2024"), None);
        assert_eq!(parse_month_header("Foo 2024"), None);
    }

    #[test]
    fn test_amount_cleaning() {
        assert_eq!(parse_amount("$1,234.50"), Some(1234.5));
        assert_eq!(parse_amount("-2000"), Some(2000.0));
        assert_eq!(parse_amount("(350)"), Some(350.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_import_single_row() {
        let csv = "Account Name,Category,Jul 2024,Aug 2024\nSales,Revenue,1000,-2000\n";
        let lines = import_pnl_csv_str(csv, &ImportOptions::default()).unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].account_name, "Sales");
        assert_eq!(lines[0].category, AccountCategory::Revenue);
        assert_eq!(lines[0].actual_months.get(&key("2024-07")), Some(&1000.0));
        assert_eq!(lines[0].actual_months.get(&key("2024-08")), Some(&2000.0));
        assert_eq!(lines[0].actual_months.len(), 2);
    }

    #[test]
    fn test_skips_totals_and_unknown_columns() {
        let csv = "\
Account Name,Category,Notes,Jan 2025,Feb 2025
Sales,Revenue,x,100,200
Total Revenue,Revenue,,100,200
Summary,Revenue,,1,1
Rent,Operating Expenses,,50,
Mystery,Equipment,,5,5
";
        let lines = import_pnl_csv_str(csv, &ImportOptions::default()).unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].account_name, "Rent");
        assert_eq!(lines[1].actual_months.len(), 1);
        assert_eq!(lines[2].category, AccountCategory::OperatingExpenses);

        let keep = ImportOptions {
            unclassified_fallback: None,
        };
        let lines = import_pnl_csv_str(csv, &keep).unwrap();
        assert_eq!(lines[2].category, AccountCategory::Unclassified);
    }

    #[test]
    fn test_header_match_is_case_insensitive() {
        let csv = "account name,CATEGORY,Mar 2025\nFreight,COGS,10\n";
        let lines = import_pnl_csv_str(csv, &ImportOptions::default()).unwrap();
        assert_eq!(lines[0].category, AccountCategory::CostOfSales);
    }

    #[test]
    fn test_duplicate_rows_are_summed() {
        let csv = "Account Name,Category,Jan 2025\nSales,Revenue,10\nSales,Revenue,15\n";
        let lines = import_pnl_csv_str(csv, &ImportOptions::default()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].actual(key("2025-01")), 25.0);
    }

    #[test]
    fn test_missing_headers() {
        let csv = "Name,Category,Jan 2025\nSales,Revenue,1\n";
        let err = import_pnl_csv_str(csv, &ImportOptions::default());
        assert!(matches!(err, Err(ForecastError::MissingHeader(h)) if h == "Account Name"));
    }

    #[test]
    fn test_no_month_columns() {
        let csv = "Account Name,Category,Amount\nSales,Revenue,1\n";
        let err = import_pnl_csv_str(csv, &ImportOptions::default());
        assert!(matches!(err, Err(ForecastError::NoMonthColumns)));
    }

    #[test]
    fn test_no_data_rows() {
        let csv = "Account Name,Category,Jan 2025\nTotal Income,Revenue,100\n,,\n";
        let err = import_pnl_csv_str(csv, &ImportOptions::default());
        assert!(matches!(err, Err(ForecastError::NoDataRows)));
    }
}
