use crate::schema::{AccountCategory, AccountLine, MonthlyValues};
use crate::utils::MonthKey;
use std::collections::BTreeMap;

/// Historical month-by-month amounts mapped onto a set of target months.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalPattern {
    /// Raw (unscaled) baseline amount for each target month.
    pub distribution: MonthlyValues,
    /// Sum of the baseline over every baseline month.
    pub baseline_total: f64,
}

impl SeasonalPattern {
    /// Sum of the baseline amounts that were carried onto target months.
    pub fn matched_total(&self) -> f64 {
        self.distribution.values().sum()
    }

    /// The distribution normalised to weights summing to 1.0.
    pub fn weights(&self) -> MonthlyValues {
        normalize_weights(&self.distribution)
    }

    pub fn is_degenerate(&self) -> bool {
        self.matched_total() == 0.0
    }
}

/// Totals of `actual_months` per baseline month across all given lines.
pub fn baseline_monthly_totals<'a>(
    lines: impl IntoIterator<Item = &'a AccountLine>,
    baseline_months: &[MonthKey],
) -> MonthlyValues {
    let mut totals: MonthlyValues = baseline_months.iter().map(|m| (*m, 0.0)).collect();

    for line in lines {
        for (month, total) in totals.iter_mut() {
            *total += line.actual(*month);
        }
    }

    totals
}

/// Maps baseline totals onto target months by calendar month number, not by offset.
///
/// A November target month takes the baseline November amount, whatever position the
/// month holds in either period. When the baseline covers the same calendar month more
/// than once the amounts are summed. Target months with no baseline counterpart get zero.
pub fn match_by_calendar_month(
    baseline_totals: &MonthlyValues,
    target_months: &[MonthKey],
) -> MonthlyValues {
    let mut by_month_number: BTreeMap<u32, f64> = BTreeMap::new();
    for (month, total) in baseline_totals {
        *by_month_number.entry(month.month()).or_default() += total;
    }

    target_months
        .iter()
        .map(|target| {
            let amount = by_month_number
                .get(&target.month())
                .copied()
                .unwrap_or(0.0);
            (*target, amount)
        })
        .collect()
}

fn extract<'a>(
    lines: impl IntoIterator<Item = &'a AccountLine>,
    baseline_months: &[MonthKey],
    target_months: &[MonthKey],
) -> SeasonalPattern {
    let totals = baseline_monthly_totals(lines, baseline_months);
    let baseline_total = totals.values().sum();

    SeasonalPattern {
        distribution: match_by_calendar_month(&totals, target_months),
        baseline_total,
    }
}

/// Category-level pattern: sums every line of `category` before matching.
pub fn extract_seasonal_pattern(
    lines: &[AccountLine],
    category: AccountCategory,
    baseline_months: &[MonthKey],
    target_months: &[MonthKey],
) -> SeasonalPattern {
    extract(
        lines.iter().filter(|line| line.category == category),
        baseline_months,
        target_months,
    )
}

/// Pattern of a single line's own history.
pub fn extract_line_pattern(
    line: &AccountLine,
    baseline_months: &[MonthKey],
    target_months: &[MonthKey],
) -> SeasonalPattern {
    extract(std::iter::once(line), baseline_months, target_months)
}

pub fn normalize_weights(weights: &MonthlyValues) -> MonthlyValues {
    let sum: f64 = weights.values().sum();
    if sum == 0.0 {
        return weights.clone();
    }
    weights.iter().map(|(m, w)| (*m, w / sum)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::month_keys_in_range;

    fn key(s: &str) -> MonthKey {
        MonthKey::parse(s).unwrap()
    }

    #[test]
    fn test_matches_by_month_number_not_offset() {
        let line = AccountLine::new("Sales", AccountCategory::Revenue)
            .with_actuals([(key("2024-11"), 100.0), (key("2024-12"), 200.0)]);

        let baseline = month_keys_in_range(key("2024-01"), key("2024-12"));
        let target = vec![key("2025-11"), key("2025-12")];

        let pattern = extract_line_pattern(&line, &baseline, &target);

        assert_eq!(pattern.distribution.get(&key("2025-11")), Some(&100.0));
        assert_eq!(pattern.distribution.get(&key("2025-12")), Some(&200.0));
        assert_eq!(pattern.baseline_total, 300.0);
    }

    #[test]
    fn test_missing_baseline_month_is_zero() {
        let line = AccountLine::new("Sales", AccountCategory::Revenue)
            .with_actuals([(key("2024-11"), 100.0)]);

        let baseline = vec![key("2024-11")];
        let target = vec![key("2025-01"), key("2025-11")];

        let pattern = extract_line_pattern(&line, &baseline, &target);
        assert_eq!(pattern.distribution.get(&key("2025-01")), Some(&0.0));
        assert_eq!(pattern.distribution.get(&key("2025-11")), Some(&100.0));
    }

    #[test]
    fn test_category_pattern_ignores_other_categories() {
        let lines = vec![
            AccountLine::new("Sales", AccountCategory::Revenue)
                .with_actuals([(key("2024-03"), 40.0)]),
            AccountLine::new("Services", AccountCategory::Revenue)
                .with_actuals([(key("2024-03"), 60.0)]),
            AccountLine::new("Rent", AccountCategory::OperatingExpenses)
                .with_actuals([(key("2024-03"), 999.0)]),
        ];

        let pattern = extract_seasonal_pattern(
            &lines,
            AccountCategory::Revenue,
            &[key("2024-03")],
            &[key("2025-03")],
        );
        assert_eq!(pattern.distribution.get(&key("2025-03")), Some(&100.0));
    }

    #[test]
    fn test_actuals_outside_baseline_are_ignored() {
        let line = AccountLine::new("Sales", AccountCategory::Revenue)
            .with_actuals([(key("2023-05"), 500.0), (key("2024-05"), 50.0)]);

        let pattern = extract_line_pattern(&line, &[key("2024-05")], &[key("2025-05")]);
        assert_eq!(pattern.baseline_total, 50.0);
    }

    #[test]
    fn test_weights_normalised() {
        let line = AccountLine::new("Sales", AccountCategory::Revenue)
            .with_actuals([(key("2024-01"), 1.0), (key("2024-02"), 3.0)]);
        let pattern = extract_line_pattern(
            &line,
            &[key("2024-01"), key("2024-02")],
            &[key("2025-01"), key("2025-02")],
        );
        let weights = pattern.weights();
        assert!((weights[&key("2025-01")] - 0.25).abs() < 1e-12);
        assert!((weights[&key("2025-02")] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_pattern() {
        let line = AccountLine::new("Sales", AccountCategory::Revenue);
        let pattern = extract_line_pattern(&line, &[key("2024-01")], &[key("2025-01")]);
        assert!(pattern.is_degenerate());
        assert_eq!(pattern.weights().get(&key("2025-01")), Some(&0.0));
    }
}
