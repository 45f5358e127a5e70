//! Monthly distribution strategies.
//!
//! Every strategy maps `(total, months, context)` to a per-month allocation. Even,
//! Linear and (non-degenerate) Seasonal allocations always sum to `total`; Custom
//! passes the caller's amounts through and reports how far they drift from it.

use crate::error::{ForecastError, Result};
use crate::schema::MonthlyValues;
use crate::seasonality::SeasonalPattern;
use crate::utils::MonthKey;

/// Relative tolerance used when checking that an allocation sums to its total.
pub const SUM_TOLERANCE: f64 = 1e-6;

pub type Allocation = MonthlyValues;

#[derive(Debug, Clone, Copy)]
pub enum Strategy<'a> {
    Even,
    Linear,
    Seasonal(&'a SeasonalPattern),
    Custom(&'a MonthlyValues),
    /// Proportional to arbitrary per-month weights (used to make COGS follow revenue).
    Weighted(&'a MonthlyValues),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionResult {
    pub allocation: Allocation,
    /// The requested strategy had no usable signal and Even was applied instead.
    pub fell_back_to_even: bool,
    /// Allocated minus requested total. Only Custom can produce a non-zero variance.
    pub variance: f64,
}

impl DistributionResult {
    fn exact(allocation: Allocation) -> Self {
        Self {
            allocation,
            fell_back_to_even: false,
            variance: 0.0,
        }
    }

    fn fallback(allocation: Allocation) -> Self {
        Self {
            allocation,
            fell_back_to_even: true,
            variance: 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.allocation.values().sum()
    }
}

pub fn distribute(
    total: f64,
    months: &[MonthKey],
    strategy: Strategy<'_>,
) -> Result<DistributionResult> {
    match strategy {
        Strategy::Even => distribute_even(total, months).map(DistributionResult::exact),
        Strategy::Linear => distribute_linear(total, months).map(DistributionResult::exact),
        Strategy::Seasonal(pattern) => distribute_seasonal(total, months, pattern),
        Strategy::Custom(custom) => distribute_custom(total, months, custom),
        Strategy::Weighted(weights) => distribute_weighted(total, months, weights),
    }
}

pub fn distribute_even(total: f64, months: &[MonthKey]) -> Result<Allocation> {
    if months.is_empty() {
        return Err(ForecastError::EmptyPeriod);
    }

    let share = total / months.len() as f64;
    Ok(months.iter().map(|m| (*m, share)).collect())
}

/// Month `i` (1-based) of `n` receives `base * i` with `base = 2 * total / (n * (n + 1))`.
pub fn distribute_linear(total: f64, months: &[MonthKey]) -> Result<Allocation> {
    if months.is_empty() {
        return Err(ForecastError::EmptyPeriod);
    }

    let n = months.len() as f64;
    let base = 2.0 * total / (n * (n + 1.0));

    Ok(months
        .iter()
        .enumerate()
        .map(|(i, m)| (*m, base * (i + 1) as f64))
        .collect())
}

/// Scales the historical shape so it sums to `total`; Even when the history is empty.
pub fn distribute_seasonal(
    total: f64,
    months: &[MonthKey],
    pattern: &SeasonalPattern,
) -> Result<DistributionResult> {
    if months.is_empty() {
        return Err(ForecastError::EmptyPeriod);
    }

    let raw: Vec<f64> = months
        .iter()
        .map(|m| pattern.distribution.get(m).copied().unwrap_or(0.0))
        .collect();
    let raw_total: f64 = raw.iter().sum();

    if raw_total == 0.0 {
        return distribute_even(total, months).map(DistributionResult::fallback);
    }

    let scale = total / raw_total;
    Ok(DistributionResult::exact(
        months
            .iter()
            .zip(raw)
            .map(|(m, amount)| (*m, amount * scale))
            .collect(),
    ))
}

/// Passes the caller's per-month amounts through unchanged. Months without an entry
/// get zero and entries outside `months` are dropped.
pub fn distribute_custom(
    total: f64,
    months: &[MonthKey],
    custom: &MonthlyValues,
) -> Result<DistributionResult> {
    if months.is_empty() {
        return Err(ForecastError::EmptyPeriod);
    }

    let allocation: Allocation = months
        .iter()
        .map(|m| (*m, custom.get(m).copied().unwrap_or(0.0)))
        .collect();
    let allocated: f64 = allocation.values().sum();

    Ok(DistributionResult {
        allocation,
        fell_back_to_even: false,
        variance: allocated - total,
    })
}

pub fn distribute_weighted(
    total: f64,
    months: &[MonthKey],
    weights: &MonthlyValues,
) -> Result<DistributionResult> {
    if months.is_empty() {
        return Err(ForecastError::EmptyPeriod);
    }

    let weight_total: f64 = months
        .iter()
        .map(|m| weights.get(m).copied().unwrap_or(0.0))
        .sum();

    if weight_total == 0.0 {
        return distribute_even(total, months).map(DistributionResult::fallback);
    }

    Ok(DistributionResult::exact(
        months
            .iter()
            .map(|m| {
                let weight = weights.get(m).copied().unwrap_or(0.0);
                (*m, total * weight / weight_total)
            })
            .collect(),
    ))
}

/// True when `allocation` sums to `total` within [`SUM_TOLERANCE`] (relative).
pub fn sums_to(allocation: &Allocation, total: f64) -> bool {
    let sum: f64 = allocation.values().sum();
    (sum - total).abs() <= SUM_TOLERANCE * total.abs().max(1.0)
}
