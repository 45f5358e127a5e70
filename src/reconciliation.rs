use crate::schema::{AccountCategory, AccountLine};
use crate::utils::MonthKey;
use log::info;
use serde::{Deserialize, Serialize};

/// Outcome of netting year-to-date actuals off an annual goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub category: AccountCategory,
    pub goal: f64,
    pub ytd_actual: f64,
    /// `max(goal - ytd_actual, 0)`, the amount left for the forecast months.
    pub remaining: f64,
    /// YTD actuals already reach the goal; forecast months must be zero-filled.
    pub goal_met: bool,
}

pub fn ytd_actual<'a>(
    lines: impl IntoIterator<Item = &'a AccountLine>,
    actual_months: &[MonthKey],
) -> f64 {
    lines
        .into_iter()
        .map(|line| line.actual_total(actual_months))
        .fold(0.0, |total, value| total + value)
}

pub fn reconcile(
    lines: &[AccountLine],
    category: AccountCategory,
    goal: f64,
    actual_months: &[MonthKey],
) -> Reconciliation {
    let ytd = ytd_actual(
        lines.iter().filter(|line| line.category == category),
        actual_months,
    );
    let goal_met = ytd >= goal;
    let remaining = (goal - ytd).max(0.0);

    if goal_met {
        info!(
            "{} goal of {:.2} already met by YTD actuals of {:.2}; forecast months set to zero",
            category, goal, ytd
        );
    }

    Reconciliation {
        category,
        goal,
        ytd_actual: ytd,
        remaining,
        goal_met,
    }
}

/// Copy of `line` with every forecast month explicitly set to zero.
pub fn zero_fill(line: &AccountLine, forecast_months: &[MonthKey]) -> AccountLine {
    let mut filled = line.clone();
    for month in forecast_months {
        filled.forecast_months.insert(*month, 0.0);
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> MonthKey {
        MonthKey::parse(s).unwrap()
    }

    fn revenue_lines() -> Vec<AccountLine> {
        vec![
            AccountLine::new("Sales", AccountCategory::Revenue)
                .with_actuals([(key("2025-01"), 30_000.0), (key("2025-02"), 30_000.0)]),
            AccountLine::new("Consulting", AccountCategory::Revenue)
                .with_actuals([(key("2025-01"), 10_000.0), (key("2024-12"), 99_000.0)]),
            AccountLine::new("Rent", AccountCategory::OperatingExpenses)
                .with_actuals([(key("2025-01"), 5_000.0)]),
        ]
    }

    #[test]
    fn test_remaining_after_ytd() {
        let actual = [key("2025-01"), key("2025-02")];
        let result = reconcile(&revenue_lines(), AccountCategory::Revenue, 100_000.0, &actual);

        assert_eq!(result.ytd_actual, 70_000.0);
        assert_eq!(result.remaining, 30_000.0);
        assert!(!result.goal_met);
    }

    #[test]
    fn test_goal_exceeded() {
        let actual = [key("2025-01"), key("2025-02")];
        let result = reconcile(&revenue_lines(), AccountCategory::Revenue, 50_000.0, &actual);

        assert_eq!(result.remaining, 0.0);
        assert!(result.goal_met);
    }

    #[test]
    fn test_no_actual_period() {
        let result = reconcile(&revenue_lines(), AccountCategory::Revenue, 50_000.0, &[]);
        assert_eq!(result.ytd_actual, 0.0);
        assert_eq!(result.remaining, 50_000.0);
    }

    #[test]
    fn test_empty_category_nets_to_positive_zero() {
        let result = reconcile(&[], AccountCategory::Revenue, 0.0, &[key("2025-01")]);

        assert!(result.ytd_actual.is_sign_positive());
        assert!(result.goal_met);
        assert!(!format!("{:.2}", result.ytd_actual).starts_with('-'));
    }

    #[test]
    fn test_zero_fill_writes_explicit_zeros() {
        let line = AccountLine::new("Sales", AccountCategory::Revenue)
            .with_forecasts([(key("2025-03"), 123.0), (key("2026-01"), 7.0)]);
        let filled = zero_fill(&line, &[key("2025-03"), key("2025-04")]);

        assert_eq!(filled.forecast_months.get(&key("2025-03")), Some(&0.0));
        assert_eq!(filled.forecast_months.get(&key("2025-04")), Some(&0.0));
        assert_eq!(filled.forecast_months.get(&key("2026-01")), Some(&7.0));
        assert_eq!(line.forecast(key("2025-03")), 123.0);
    }
}
