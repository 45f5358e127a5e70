//! # Forecast Builder
//!
//! A library for projecting month-by-month P&L lines from annual goals, historical
//! actuals and a distribution strategy.
//!
//! ## Core Concepts
//!
//! - **Baseline period**: a historical year whose actuals give each account its share
//!   of the category and its seasonal shape
//! - **Actual/YTD period**: months of the forecast year already recorded; they are netted
//!   off the annual goal before anything is distributed
//! - **Forecast period**: the months being projected
//! - **Two-level allocation**: a category budget is split across accounts by baseline
//!   share, then each account's slice is spread across months by the chosen method
//! - **Manual lines**: hand-entered forecasts that generation never overwrites
//!
//! ## Example
//!
//! ```rust,ignore
//! use forecast_builder::*;
//!
//! let csv = "Account Name,Category,Jan 2024,Feb 2024\nSales,Revenue,1000,1500\n";
//! let lines = import_pnl_csv_str(csv, &ImportOptions::default())?;
//!
//! let mut definition = ForecastDefinition::new(
//!     "acme",
//!     2025,
//!     parse_period_string("2024-01:2024-02")?,
//!     parse_period_string("2025-01:2025-02")?,
//! );
//! definition.revenue_goal = Some(5_000.0);
//! definition.cogs_percentage = 0.4;
//! definition.distribution_method = DistributionMethod::SeasonalPattern;
//!
//! let run = ForecastProcessor::process(&definition, &lines)?;
//! let summary = run.summary(definition.forecast().months().as_slice(), SummaryBasis::Forecast);
//! ```

pub mod chart_of_accounts;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod overrides;
pub mod reconciliation;
pub mod repository;
pub mod schema;
pub mod seasonality;
pub mod summary;
pub mod utils;

pub use chart_of_accounts::{month_column_label, AccountEntry, ChartOfAccounts};
pub use distribution::{distribute, Allocation, DistributionResult, Strategy, SUM_TOLERANCE};
pub use engine::{
    allocate_category, generate_forecast, CategoryAllocation, ForecastEngine, ForecastRun,
    ForecastWarning, MonthlyCurve,
};
pub use error::{ForecastError, Result};
pub use ingestion::*;
pub use overrides::*;
pub use reconciliation::{reconcile, Reconciliation};
pub use repository::{
    regenerate_forecast, save_new_version, ForecastRepository, ForecastSnapshot,
    InMemoryRepository,
};
pub use schema::*;
pub use seasonality::{extract_line_pattern, extract_seasonal_pattern, SeasonalPattern};
pub use summary::{
    find_or_create_summary_line, goal_variance, monthly_summaries, rollup, summarize,
    GoalReport, GoalVariance, PeriodLabel, PeriodSummary, RollupGranularity, SummaryBasis,
    COGS_SUMMARY_NAME,
};
pub use utils::*;

use log::{debug, warn};

pub struct ForecastProcessor;

impl ForecastProcessor {
    pub fn process(definition: &ForecastDefinition, lines: &[AccountLine]) -> Result<ForecastRun> {
        validate_line_integrity(lines)?;

        debug!(
            "Input contains {} lines, {} of them manual",
            lines.len(),
            lines.iter().filter(|l| l.is_manual).count()
        );

        let run = generate_forecast(definition, lines)?;

        for warning in &run.warnings {
            warn!("{}", warning);
        }

        Ok(run)
    }

    /// Applies hand edits first, so lines they pin stay manual through generation.
    pub fn process_with_overrides(
        definition: &ForecastDefinition,
        lines: &[AccountLine],
        overrides: &LineOverrides,
    ) -> Result<ForecastRun> {
        let edited = overrides.apply(lines);
        Self::process(definition, &edited)
    }

    pub fn process_csv(
        definition: &ForecastDefinition,
        csv: &str,
        options: &ImportOptions,
    ) -> Result<ForecastRun> {
        let lines = import_pnl_csv_str(csv, options)?;
        Self::process(definition, &lines)
    }
}

fn validate_line_integrity(lines: &[AccountLine]) -> Result<()> {
    for line in lines {
        let values = line
            .actual_months
            .iter()
            .chain(line.forecast_months.iter());

        for (month, value) in values {
            if !value.is_finite() {
                return Err(ForecastError::InvalidAmount {
                    field: format!("{} {}", line.account_name, month),
                    value: *value,
                });
            }
        }
    }

    Ok(())
}
