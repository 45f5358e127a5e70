use crate::distribution::{distribute, Allocation, DistributionResult, Strategy, SUM_TOLERANCE};
use crate::error::Result;
use crate::reconciliation::{reconcile, zero_fill, Reconciliation};
use crate::schema::{
    AccountCategory, AccountLine, DistributionMethod, ForecastDefinition, MonthlyValues,
};
use crate::seasonality::extract_line_pattern;
use crate::summary::{
    find_or_create_summary_line, summarize, PeriodSummary, SummaryBasis, COGS_SUMMARY_NAME,
};
use crate::utils::MonthKey;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How each line's budget is spread over the forecast months.
#[derive(Debug, Clone, Copy)]
pub enum MonthlyCurve<'a> {
    Method(DistributionMethod),
    /// Proportional to the given per-month weights.
    Weighted(&'a MonthlyValues),
}

/// Non-fatal conditions met while generating a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForecastWarning {
    /// No historical signal to follow; the amount was split evenly instead.
    /// `account` is `None` when the whole category had no baseline activity.
    EvenSplitFallback {
        category: AccountCategory,
        account: Option<String>,
    },
    GoalAlreadyMet {
        category: AccountCategory,
        goal: f64,
        ytd_actual: f64,
    },
    CustomVariance {
        account: String,
        budget: f64,
        allocated: f64,
    },
    /// The category had budget left but no non-manual line to receive it.
    UnallocatedBudget {
        category: AccountCategory,
        amount: f64,
    },
}

impl fmt::Display for ForecastWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastWarning::EvenSplitFallback {
                category,
                account: None,
            } => write!(
                f,
                "{}: no baseline activity, budget split evenly across lines",
                category
            ),
            ForecastWarning::EvenSplitFallback {
                category,
                account: Some(account),
            } => write!(
                f,
                "{} / {}: no usable monthly pattern, budget split evenly across months",
                category, account
            ),
            ForecastWarning::GoalAlreadyMet {
                category,
                goal,
                ytd_actual,
            } => write!(
                f,
                "{}: goal {:.2} already met by YTD actuals {:.2}",
                category, goal, ytd_actual
            ),
            ForecastWarning::CustomVariance {
                account,
                budget,
                allocated,
            } => write!(
                f,
                "{}: custom entries total {:.2} against a budget of {:.2}",
                account, allocated, budget
            ),
            ForecastWarning::UnallocatedBudget { category, amount } => write!(
                f,
                "{}: {:.2} left unallocated, every line is manual",
                category, amount
            ),
        }
    }
}

/// Per-line allocations for one category, keyed by index into the line set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryAllocation {
    pub allocations: BTreeMap<usize, Allocation>,
    pub warnings: Vec<ForecastWarning>,
}

/// Spreads a category budget over its non-manual lines, then over the months.
///
/// Each line receives `budget * line_baseline / category_baseline` and distributes it
/// with its own history. With no baseline activity in the category the budget is split
/// evenly across lines. Weighted and custom curves still shape the months of each line;
/// the history-based methods fall back to an even monthly split.
pub fn allocate_category(
    lines: &[AccountLine],
    category: AccountCategory,
    budget: f64,
    baseline_months: &[MonthKey],
    forecast_months: &[MonthKey],
    curve: MonthlyCurve<'_>,
) -> Result<CategoryAllocation> {
    let mut result = CategoryAllocation::default();

    let candidates: Vec<(usize, &AccountLine)> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.category == category && !line.is_manual)
        .collect();

    if candidates.is_empty() {
        if budget > 0.0 {
            debug!("{}: no automatic lines to receive {:.2}", category, budget);
            result.warnings.push(ForecastWarning::UnallocatedBudget {
                category,
                amount: budget,
            });
        }
        return Ok(result);
    }

    let line_totals: Vec<f64> = candidates
        .iter()
        .map(|(_, line)| line.actual_total(baseline_months))
        .collect();
    let grand_total: f64 = line_totals.iter().sum();

    if grand_total == 0.0 {
        warn!(
            "{}: no baseline activity across {} line(s); splitting {:.2} evenly",
            category,
            candidates.len(),
            budget
        );
        result.warnings.push(ForecastWarning::EvenSplitFallback {
            category,
            account: None,
        });
        let per_line = budget / candidates.len() as f64;
        for (index, line) in &candidates {
            let spread = match curve {
                MonthlyCurve::Weighted(_) | MonthlyCurve::Method(DistributionMethod::Custom) => {
                    distribute_line(line, per_line, baseline_months, forecast_months, curve)?
                }
                MonthlyCurve::Method(_) => distribute(per_line, forecast_months, Strategy::Even)?,
            };
            push_custom_variance(&mut result, line, per_line, &spread);
            result.allocations.insert(*index, spread.allocation);
        }
        return Ok(result);
    }

    for ((index, line), line_total) in candidates.iter().zip(line_totals) {
        let line_budget = budget * line_total / grand_total;
        let distributed =
            distribute_line(line, line_budget, baseline_months, forecast_months, curve)?;

        if distributed.fell_back_to_even && line_budget != 0.0 {
            debug!(
                "{} / {}: no monthly signal, using even split",
                category, line.account_name
            );
            result.warnings.push(ForecastWarning::EvenSplitFallback {
                category,
                account: Some(line.account_name.clone()),
            });
        }

        push_custom_variance(&mut result, line, line_budget, &distributed);
        result.allocations.insert(*index, distributed.allocation);
    }

    Ok(result)
}

fn push_custom_variance(
    result: &mut CategoryAllocation,
    line: &AccountLine,
    line_budget: f64,
    distributed: &DistributionResult,
) {
    if distributed.variance.abs() > SUM_TOLERANCE * line_budget.abs().max(1.0) {
        result.warnings.push(ForecastWarning::CustomVariance {
            account: line.account_name.clone(),
            budget: line_budget,
            allocated: line_budget + distributed.variance,
        });
    }
}

fn distribute_line(
    line: &AccountLine,
    line_budget: f64,
    baseline_months: &[MonthKey],
    forecast_months: &[MonthKey],
    curve: MonthlyCurve<'_>,
) -> Result<DistributionResult> {
    match curve {
        MonthlyCurve::Weighted(weights) => {
            distribute(line_budget, forecast_months, Strategy::Weighted(weights))
        }
        MonthlyCurve::Method(DistributionMethod::Even) => {
            distribute(line_budget, forecast_months, Strategy::Even)
        }
        MonthlyCurve::Method(DistributionMethod::Linear) => {
            distribute(line_budget, forecast_months, Strategy::Linear)
        }
        MonthlyCurve::Method(DistributionMethod::SeasonalPattern) => {
            let pattern = extract_line_pattern(line, baseline_months, forecast_months);
            distribute(line_budget, forecast_months, Strategy::Seasonal(&pattern))
        }
        MonthlyCurve::Method(DistributionMethod::Custom) => {
            let has_entries = forecast_months
                .iter()
                .any(|m| line.forecast_months.contains_key(m));
            if has_entries {
                let custom = Strategy::Custom(&line.forecast_months);
                distribute(line_budget, forecast_months, custom)
            } else {
                let mut even = distribute(line_budget, forecast_months, Strategy::Even)?;
                even.fell_back_to_even = true;
                Ok(even)
            }
        }
    }
}

/// Result of one generation run. `lines` is a new line set; the input is not modified.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRun {
    pub lines: Vec<AccountLine>,
    pub reconciliations: Vec<Reconciliation>,
    pub warnings: Vec<ForecastWarning>,
}

impl ForecastRun {
    pub fn line(&self, account_name: &str) -> Option<&AccountLine> {
        self.lines.iter().find(|l| l.account_name == account_name)
    }

    pub fn summary(&self, months: &[MonthKey], basis: SummaryBasis) -> PeriodSummary {
        summarize(&self.lines, months, basis)
    }
}

pub struct ForecastEngine<'a> {
    definition: &'a ForecastDefinition,
    baseline_months: Vec<MonthKey>,
    actual_months: Vec<MonthKey>,
    forecast_months: Vec<MonthKey>,
}

impl<'a> ForecastEngine<'a> {
    pub fn new(definition: &'a ForecastDefinition) -> Result<Self> {
        definition.validate()?;

        Ok(Self {
            definition,
            baseline_months: definition.baseline().months(),
            actual_months: definition
                .actual()
                .map(|range| range.months())
                .unwrap_or_default(),
            forecast_months: definition.forecast().months(),
        })
    }

    pub fn forecast_months(&self) -> &[MonthKey] {
        &self.forecast_months
    }

    pub fn generate(&self, lines: &[AccountLine]) -> Result<ForecastRun> {
        info!(
            "Generating forecast {} (v{}) for {}: {} lines, forecast {}",
            self.definition.id,
            self.definition.version,
            self.definition.business_id,
            lines.len(),
            self.definition.forecast()
        );

        let mut run = ForecastRun {
            lines: lines.to_vec(),
            reconciliations: Vec::new(),
            warnings: Vec::new(),
        };

        let method = self.definition.distribution_method;

        if let Some(goal) = self.definition.revenue_goal {
            self.project_category(
                &mut run,
                AccountCategory::Revenue,
                goal,
                MonthlyCurve::Method(method),
            )?;
        }

        if let Some(budget) = self.definition.opex_budget {
            self.project_category(
                &mut run,
                AccountCategory::OperatingExpenses,
                budget,
                MonthlyCurve::Method(method),
            )?;
        }

        if let Some(cogs_goal) = self.definition.cogs_goal() {
            find_or_create_summary_line(
                &mut run.lines,
                AccountCategory::CostOfSales,
                COGS_SUMMARY_NAME,
            );
            let revenue_curve = self.revenue_curve(&run.lines);
            self.project_category(
                &mut run,
                AccountCategory::CostOfSales,
                cogs_goal,
                MonthlyCurve::Weighted(&revenue_curve),
            )?;
        }

        for warning in &run.warnings {
            debug!("Forecast warning: {}", warning);
        }

        Ok(run)
    }

    fn project_category(
        &self,
        run: &mut ForecastRun,
        category: AccountCategory,
        goal: f64,
        curve: MonthlyCurve<'_>,
    ) -> Result<()> {
        let forecast = self.definition.forecast();
        for line in run.lines.iter_mut() {
            if line.category == category && !line.is_manual {
                line.forecast_months.retain(|month, _| forecast.contains(*month));
            }
        }

        let reconciliation = reconcile(&run.lines, category, goal, &self.actual_months);

        if reconciliation.goal_met {
            for line in run.lines.iter_mut() {
                if line.category == category && !line.is_manual {
                    let filled = zero_fill(line, &self.forecast_months);
                    *line = filled;
                }
            }
            run.warnings.push(ForecastWarning::GoalAlreadyMet {
                category,
                goal,
                ytd_actual: reconciliation.ytd_actual,
            });
            run.reconciliations.push(reconciliation);
            return Ok(());
        }

        let committed: f64 = run
            .lines
            .iter()
            .filter(|line| line.category == category && line.is_manual)
            .map(|line| line.forecast_total(&self.forecast_months))
            .sum();
        let budget = (reconciliation.remaining - committed).max(0.0);

        debug!(
            "{}: goal {:.2}, YTD {:.2}, manual {:.2}, distributing {:.2}",
            category, goal, reconciliation.ytd_actual, committed, budget
        );

        let allocation = allocate_category(
            &run.lines,
            category,
            budget,
            &self.baseline_months,
            &self.forecast_months,
            curve,
        )?;

        for (index, months) in allocation.allocations {
            let mut updated = run.lines[index].clone();
            updated.forecast_months.extend(months);
            run.lines[index] = updated;
        }

        run.warnings.extend(allocation.warnings);
        run.reconciliations.push(reconciliation);
        Ok(())
    }

    /// Total forecast revenue per forecast month, manual lines included.
    fn revenue_curve(&self, lines: &[AccountLine]) -> MonthlyValues {
        let revenue: Vec<&AccountLine> = lines
            .iter()
            .filter(|line| line.category == AccountCategory::Revenue)
            .collect();

        self.forecast_months
            .iter()
            .map(|m| (*m, revenue.iter().map(|line| line.forecast(*m)).sum()))
            .collect()
    }
}

/// Projects `forecast_months` for every non-manual line under `definition`.
pub fn generate_forecast(
    definition: &ForecastDefinition,
    lines: &[AccountLine],
) -> Result<ForecastRun> {
    ForecastEngine::new(definition)?.generate(lines)
}
