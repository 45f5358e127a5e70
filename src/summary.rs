use crate::schema::{AccountCategory, AccountLine, ForecastDefinition};
use crate::utils::{fiscal_quarter_of, fiscal_year_of, MonthKey};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name given to the Cost of Sales summary line when none exists yet.
pub const COGS_SUMMARY_NAME: &str = "Cost of Goods Sold";

fn summary_names(category: AccountCategory) -> &'static [&'static str] {
    match category {
        AccountCategory::Revenue => &["total revenue", "total income"],
        AccountCategory::CostOfSales => &[
            "cost of goods sold",
            "cost of sales",
            "total cost of sales",
            "total cost of goods sold",
            "cogs",
        ],
        AccountCategory::OperatingExpenses => &["total operating expenses", "total expenses"],
        AccountCategory::OtherIncome => &["total other income"],
        AccountCategory::OtherExpenses => &["total other expenses"],
        AccountCategory::Unclassified => &[],
    }
}

pub fn is_summary_line(line: &AccountLine, category: AccountCategory, default_name: &str) -> bool {
    if line.category != category {
        return false;
    }
    let name = line.account_name.trim().to_lowercase();
    name == default_name.to_lowercase() || summary_names(category).contains(&name.as_str())
}

/// Returns the index of the single summary line for `category`.
///
/// The first matching line wins. Later matches are removed from `lines` without
/// merging their values. A new empty line named `default_name` is appended when
/// nothing matches.
pub fn find_or_create_summary_line(
    lines: &mut Vec<AccountLine>,
    category: AccountCategory,
    default_name: &str,
) -> usize {
    let Some(first) = lines
        .iter()
        .position(|line| is_summary_line(line, category, default_name))
    else {
        debug!("Creating '{}' summary line for {}", default_name, category);
        lines.push(AccountLine::new(default_name, category));
        return lines.len() - 1;
    };

    let before = lines.len();
    let mut index = 0;
    lines.retain(|line| {
        let keep = index <= first || !is_summary_line(line, category, default_name);
        index += 1;
        keep
    });

    if lines.len() < before {
        debug!(
            "Removed {} duplicate {} summary line(s)",
            before - lines.len(),
            category
        );
    }

    first
}

/// Which monthly values a summary reads from each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryBasis {
    Actual,
    Forecast,
    /// The recorded actual where one exists, otherwise the forecast.
    Combined,
}

/// The value recorded for `month` under `basis`, if any.
pub fn recorded_value(line: &AccountLine, month: MonthKey, basis: SummaryBasis) -> Option<f64> {
    match basis {
        SummaryBasis::Actual => line.actual_months.get(&month).copied(),
        SummaryBasis::Forecast => line.forecast_months.get(&month).copied(),
        SummaryBasis::Combined => line
            .actual_months
            .get(&month)
            .or_else(|| line.forecast_months.get(&month))
            .copied(),
    }
}

pub fn line_value(line: &AccountLine, month: MonthKey, basis: SummaryBasis) -> f64 {
    recorded_value(line, month, basis).unwrap_or(0.0)
}

/// Aggregated P&L over a set of months. Margins are percentages of revenue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub revenue: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub operating_expenses: f64,
    pub net_profit: f64,
    pub gross_margin_pct: f64,
    pub net_margin_pct: f64,
}

impl PeriodSummary {
    pub fn from_components(revenue: f64, cogs: f64, operating_expenses: f64) -> Self {
        let gross_profit = revenue - cogs;
        let net_profit = gross_profit - operating_expenses;

        Self {
            revenue,
            cogs,
            gross_profit,
            operating_expenses,
            net_profit,
            gross_margin_pct: margin_pct(gross_profit, revenue),
            net_margin_pct: margin_pct(net_profit, revenue),
        }
    }
}

/// `amount / revenue * 100`, or zero when there is no revenue.
pub fn margin_pct(amount: f64, revenue: f64) -> f64 {
    if revenue == 0.0 {
        0.0
    } else {
        amount / revenue * 100.0
    }
}

fn category_total(
    lines: &[AccountLine],
    category: AccountCategory,
    months: &[MonthKey],
    basis: SummaryBasis,
) -> f64 {
    lines
        .iter()
        .filter(|line| line.category == category)
        .flat_map(|line| months.iter().map(move |m| line_value(line, *m, basis)))
        .fold(0.0, |total, value| total + value)
}

pub fn summarize(
    lines: &[AccountLine],
    months: &[MonthKey],
    basis: SummaryBasis,
) -> PeriodSummary {
    PeriodSummary::from_components(
        category_total(lines, AccountCategory::Revenue, months, basis),
        category_total(lines, AccountCategory::CostOfSales, months, basis),
        category_total(lines, AccountCategory::OperatingExpenses, months, basis),
    )
}

pub fn monthly_summaries(
    lines: &[AccountLine],
    months: &[MonthKey],
    basis: SummaryBasis,
) -> BTreeMap<MonthKey, PeriodSummary> {
    months
        .iter()
        .map(|m| (*m, summarize(lines, std::slice::from_ref(m), basis)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupGranularity {
    Quarter,
    Year,
}

/// A fiscal period, labelled by the calendar year in which the fiscal year ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeriodLabel {
    Quarter { fiscal_year: i32, quarter: u32 },
    Year(i32),
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodLabel::Quarter {
                fiscal_year,
                quarter,
            } => write!(f, "FY{} Q{}", fiscal_year, quarter),
            PeriodLabel::Year(fiscal_year) => write!(f, "FY{}", fiscal_year),
        }
    }
}

/// Sums the lines per fiscal quarter or year over `months`. Missing months count as zero.
pub fn rollup(
    lines: &[AccountLine],
    months: &[MonthKey],
    basis: SummaryBasis,
    granularity: RollupGranularity,
    fiscal_year_end_month: u32,
) -> BTreeMap<PeriodLabel, PeriodSummary> {
    let mut groups: BTreeMap<PeriodLabel, Vec<MonthKey>> = BTreeMap::new();

    for month in months {
        let fiscal_year = fiscal_year_of(*month, fiscal_year_end_month);
        let label = match granularity {
            RollupGranularity::Quarter => PeriodLabel::Quarter {
                fiscal_year,
                quarter: fiscal_quarter_of(*month, fiscal_year_end_month),
            },
            RollupGranularity::Year => PeriodLabel::Year(fiscal_year),
        };
        groups.entry(label).or_default().push(*month);
    }

    groups
        .into_iter()
        .map(|(label, group)| (label, summarize(lines, &group, basis)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalVariance {
    pub goal: f64,
    pub projected: f64,
    /// `projected - goal`; negative means the plan falls short.
    pub variance: f64,
}

impl GoalVariance {
    fn new(goal: f64, projected: f64) -> Self {
        Self {
            goal,
            projected,
            variance: projected - goal,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalReport {
    pub revenue: Option<GoalVariance>,
    pub gross_profit: Option<GoalVariance>,
    pub net_profit: Option<GoalVariance>,
}

/// Compares the fiscal-year plan (actual period plus forecast period) against the goals.
pub fn goal_variance(definition: &ForecastDefinition, lines: &[AccountLine]) -> GoalReport {
    let mut months = definition
        .actual()
        .map(|range| range.months())
        .unwrap_or_default();
    months.extend(definition.forecast().months());

    let projected = summarize(lines, &months, SummaryBasis::Combined);

    GoalReport {
        revenue: definition
            .revenue_goal
            .map(|goal| GoalVariance::new(goal, projected.revenue)),
        gross_profit: definition
            .gross_profit_goal
            .map(|goal| GoalVariance::new(goal, projected.gross_profit)),
        net_profit: definition
            .net_profit_goal
            .map(|goal| GoalVariance::new(goal, projected.net_profit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{month_keys_in_range, MonthRange};

    fn key(s: &str) -> MonthKey {
        MonthKey::parse(s).unwrap()
    }

    #[test]
    fn test_duplicate_summary_lines_collapse_to_first() {
        let mut lines = vec![
            AccountLine::new("Sales", AccountCategory::Revenue),
            AccountLine::new("Cost of Goods Sold", AccountCategory::CostOfSales)
                .with_forecasts([(key("2025-01"), 1.0)]),
            AccountLine::new("Cost of Goods Sold", AccountCategory::CostOfSales)
                .with_forecasts([(key("2025-01"), 2.0)]),
            AccountLine::new("Cost of Goods Sold", AccountCategory::CostOfSales)
                .with_forecasts([(key("2025-01"), 3.0)]),
        ];

        let index = find_or_create_summary_line(
            &mut lines,
            AccountCategory::CostOfSales,
            COGS_SUMMARY_NAME,
        );

        assert_eq!(index, 1);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[index].forecast(key("2025-01")), 1.0);
    }

    #[test]
    fn test_summary_line_created_when_missing() {
        let mut lines = vec![
            AccountLine::new("Cost of Goods Sold", AccountCategory::OperatingExpenses),
            AccountLine::new("Freight", AccountCategory::CostOfSales),
        ];

        let index = find_or_create_summary_line(
            &mut lines,
            AccountCategory::CostOfSales,
            COGS_SUMMARY_NAME,
        );

        assert_eq!(index, 2);
        assert_eq!(lines[index].account_name, COGS_SUMMARY_NAME);
        assert_eq!(lines[index].category, AccountCategory::CostOfSales);
    }

    #[test]
    fn test_summary_name_match_is_case_insensitive() {
        let mut lines = vec![AccountLine::new("COGS", AccountCategory::CostOfSales)];
        let index = find_or_create_summary_line(
            &mut lines,
            AccountCategory::CostOfSales,
            COGS_SUMMARY_NAME,
        );
        assert_eq!(index, 0);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_profit_and_margins() {
        let summary = PeriodSummary::from_components(1_000.0, 400.0, 350.0);
        assert_eq!(summary.gross_profit, 600.0);
        assert_eq!(summary.net_profit, 250.0);
        assert!((summary.gross_margin_pct - 60.0).abs() < 1e-9);
        assert!((summary.net_margin_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_revenue_margins_are_zero() {
        let summary = PeriodSummary::from_components(0.0, 100.0, 50.0);
        assert_eq!(summary.gross_margin_pct, 0.0);
        assert_eq!(summary.net_margin_pct, 0.0);
        assert!(!summary.net_margin_pct.is_nan());
    }

    #[test]
    fn test_combined_basis_prefers_actuals() {
        let line = AccountLine::new("Sales", AccountCategory::Revenue)
            .with_actuals([(key("2025-01"), 10.0)])
            .with_forecasts([(key("2025-01"), 99.0), (key("2025-02"), 20.0)]);

        assert_eq!(line_value(&line, key("2025-01"), SummaryBasis::Combined), 10.0);
        assert_eq!(line_value(&line, key("2025-02"), SummaryBasis::Combined), 20.0);
        assert_eq!(line_value(&line, key("2025-01"), SummaryBasis::Forecast), 99.0);
        assert_eq!(line_value(&line, key("2025-03"), SummaryBasis::Actual), 0.0);
    }

    #[test]
    fn test_quarterly_rollup_for_june_year_end() {
        let months = month_keys_in_range(key("2024-07"), key("2025-06"));
        let lines = vec![
            AccountLine::new("Sales", AccountCategory::Revenue)
                .with_forecasts(months.iter().map(|m| (*m, 100.0))),
            AccountLine::new("Materials", AccountCategory::CostOfSales)
                .with_forecasts(months.iter().map(|m| (*m, 40.0))),
            AccountLine::new("Rent", AccountCategory::OperatingExpenses)
                .with_forecasts(months.iter().map(|m| (*m, 10.0))),
        ];

        let quarters = rollup(
            &lines,
            &months,
            SummaryBasis::Forecast,
            RollupGranularity::Quarter,
            6,
        );
        assert_eq!(quarters.len(), 4);

        let q1 = &quarters[&PeriodLabel::Quarter {
            fiscal_year: 2025,
            quarter: 1,
        }];
        assert_eq!(q1.revenue, 300.0);
        assert_eq!(q1.cogs, 120.0);
        assert_eq!(q1.net_profit, 150.0);

        let years = rollup(
            &lines,
            &months,
            SummaryBasis::Forecast,
            RollupGranularity::Year,
            6,
        );
        assert_eq!(years.len(), 1);
        assert_eq!(years[&PeriodLabel::Year(2025)].revenue, 1_200.0);
        assert_eq!(PeriodLabel::Year(2025).to_string(), "FY2025");
    }

    #[test]
    fn test_goal_variance() {
        let mut definition = ForecastDefinition::new(
            "acme",
            2025,
            MonthRange::new(key("2024-01"), key("2024-12")),
            MonthRange::new(key("2025-02"), key("2025-03")),
        )
        .with_actual_period(MonthRange::new(key("2025-01"), key("2025-01")));
        definition.revenue_goal = Some(300.0);
        definition.net_profit_goal = Some(100.0);

        let lines = vec![AccountLine::new("Sales", AccountCategory::Revenue)
            .with_actuals([(key("2025-01"), 100.0)])
            .with_forecasts([(key("2025-02"), 100.0), (key("2025-03"), 50.0)])];

        let report = goal_variance(&definition, &lines);
        let revenue = report.revenue.unwrap();
        assert_eq!(revenue.projected, 250.0);
        assert_eq!(revenue.variance, -50.0);
        assert!(report.gross_profit.is_none());
        assert_eq!(report.net_profit.unwrap().projected, 250.0);
    }
}
