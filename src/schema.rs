use crate::error::{ForecastError, Result};
use crate::utils::{validate_fiscal_year_end_month, MonthKey, MonthRange};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Sparse month-keyed amounts. Absent months are treated as zero.
pub type MonthlyValues = BTreeMap<MonthKey, f64>;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub enum AccountCategory {
    #[serde(rename = "Revenue")]
    #[schemars(description = "Sales of goods or services")]
    Revenue,

    #[serde(rename = "Cost of Sales")]
    #[schemars(description = "Direct costs netted against revenue to produce gross profit")]
    CostOfSales,

    #[serde(rename = "Operating Expenses")]
    #[schemars(description = "Salaries, rent, marketing, utilities and other overheads")]
    OperatingExpenses,

    #[serde(rename = "Other Income")]
    #[schemars(description = "Non-operating income such as interest or asset sales")]
    OtherIncome,

    #[serde(rename = "Other Expenses")]
    #[schemars(description = "Non-operating expenses such as interest paid")]
    OtherExpenses,

    #[schemars(description = "A label that matched none of the known categories")]
    Unclassified,
}

impl AccountCategory {
    pub const ALL: [AccountCategory; 6] = [
        AccountCategory::Revenue,
        AccountCategory::CostOfSales,
        AccountCategory::OperatingExpenses,
        AccountCategory::OtherIncome,
        AccountCategory::OtherExpenses,
        AccountCategory::Unclassified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AccountCategory::Revenue => "Revenue",
            AccountCategory::CostOfSales => "Cost of Sales",
            AccountCategory::OperatingExpenses => "Operating Expenses",
            AccountCategory::OtherIncome => "Other Income",
            AccountCategory::OtherExpenses => "Other Expenses",
            AccountCategory::Unclassified => "Unclassified",
        }
    }

    /// Maps a free-text category label onto the closed category set.
    ///
    /// Cost of sales is checked before revenue because "cost of sales" contains "sales",
    /// and the "other ..." labels before the generic income/expense words.
    pub fn classify(label: &str) -> Self {
        let label = label.trim().to_lowercase();

        if label.contains("cost of sales")
            || label.contains("cost of goods")
            || label.contains("cogs")
        {
            AccountCategory::CostOfSales
        } else if label.contains("other income") {
            AccountCategory::OtherIncome
        } else if label.contains("other expense") {
            AccountCategory::OtherExpenses
        } else if label.contains("revenue") || label.contains("income") || label.contains("sales")
        {
            AccountCategory::Revenue
        } else if label.contains("expense") || label.contains("operating") {
            AccountCategory::OperatingExpenses
        } else {
            AccountCategory::Unclassified
        }
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMethod {
    #[schemars(description = "Equal amount in every forecast month")]
    Even,

    #[schemars(
        description = "Arithmetic ramp: month i of n receives base * i, smallest first, largest last"
    )]
    Linear,

    #[schemars(
        description = "Follows each account's own historical month-by-month shape from the baseline period"
    )]
    SeasonalPattern,

    #[schemars(
        description = "Keeps the per-month amounts already entered on each line and reports the variance against its budget"
    )]
    Custom,
}

impl Default for DistributionMethod {
    fn default() -> Self {
        Self::Even
    }
}

fn default_version() -> u32 {
    1
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_fiscal_year_end_month() -> u32 {
    12
}

/// One forecast for one business and fiscal year. Saved versions are never edited in
/// place; `next_version` produces the successor that references its parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ForecastDefinition {
    #[schemars(description = "Unique identifier of this forecast version")]
    pub id: String,

    #[schemars(description = "The business this forecast belongs to")]
    pub business_id: String,

    #[schemars(description = "Fiscal year label, e.g. 2025")]
    pub fiscal_year: i32,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    #[schemars(description = "Identifier of the version this one supersedes")]
    pub parent_id: Option<String>,

    #[schemars(description = "First month of the historical period used as the seasonal template")]
    pub baseline_start_month: MonthKey,

    pub baseline_end_month: MonthKey,

    #[serde(default)]
    #[schemars(
        description = "First month of the current fiscal year that already has actuals. Omit when the forecast starts straight after the baseline."
    )]
    pub actual_start_month: Option<MonthKey>,

    #[serde(default)]
    pub actual_end_month: Option<MonthKey>,

    #[schemars(description = "First month still being projected")]
    pub forecast_start_month: MonthKey,

    pub forecast_end_month: MonthKey,

    #[serde(default = "default_currency")]
    #[schemars(description = "3-letter ISO currency code")]
    pub currency: String,

    #[serde(default)]
    #[schemars(description = "Annual revenue goal for the fiscal year")]
    pub revenue_goal: Option<f64>,

    #[serde(default)]
    pub gross_profit_goal: Option<f64>,

    #[serde(default)]
    pub net_profit_goal: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Annual operating expense budget for the fiscal year")]
    pub opex_budget: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Cost of sales as a decimal fraction of revenue, e.g. 0.4")]
    pub cogs_percentage: f64,

    #[serde(default)]
    pub distribution_method: DistributionMethod,

    #[serde(default = "default_fiscal_year_end_month")]
    #[schemars(description = "Month the fiscal year ends (1 = January, 12 = December)")]
    pub fiscal_year_end_month: u32,
}

impl ForecastDefinition {
    pub fn new(
        business_id: impl Into<String>,
        fiscal_year: i32,
        baseline: MonthRange,
        forecast: MonthRange,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.into(),
            fiscal_year,
            version: default_version(),
            parent_id: None,
            baseline_start_month: baseline.start,
            baseline_end_month: baseline.end,
            actual_start_month: None,
            actual_end_month: None,
            forecast_start_month: forecast.start,
            forecast_end_month: forecast.end,
            currency: default_currency(),
            revenue_goal: None,
            gross_profit_goal: None,
            net_profit_goal: None,
            opex_budget: None,
            cogs_percentage: 0.0,
            distribution_method: DistributionMethod::default(),
            fiscal_year_end_month: default_fiscal_year_end_month(),
        }
    }

    pub fn with_actual_period(mut self, actual: MonthRange) -> Self {
        self.actual_start_month = Some(actual.start);
        self.actual_end_month = Some(actual.end);
        self
    }

    pub fn baseline(&self) -> MonthRange {
        MonthRange::new(self.baseline_start_month, self.baseline_end_month)
    }

    /// The actual/YTD period, if the definition has one.
    pub fn actual(&self) -> Option<MonthRange> {
        match (self.actual_start_month, self.actual_end_month) {
            (Some(start), Some(end)) => Some(MonthRange::new(start, end)),
            _ => None,
        }
    }

    pub fn forecast(&self) -> MonthRange {
        MonthRange::new(self.forecast_start_month, self.forecast_end_month)
    }

    /// Annual cost of sales implied by the revenue goal. `None` when there is no revenue
    /// goal or no COGS percentage, in which case COGS is not projected.
    pub fn cogs_goal(&self) -> Option<f64> {
        if self.cogs_percentage <= 0.0 {
            return None;
        }
        self.revenue_goal.map(|goal| goal * self.cogs_percentage)
    }

    pub fn validate(&self) -> Result<()> {
        validate_fiscal_year_end_month(self.fiscal_year_end_month)?;

        let baseline = self.baseline();
        let forecast = self.forecast();

        if baseline.is_empty() {
            return Err(ForecastError::InvalidPeriodOrder(format!(
                "baseline period {} ends before it starts",
                baseline
            )));
        }
        if forecast.is_empty() {
            return Err(ForecastError::InvalidPeriodOrder(format!(
                "forecast period {} ends before it starts",
                forecast
            )));
        }

        match (self.actual_start_month, self.actual_end_month) {
            (Some(start), Some(end)) => {
                if baseline.end >= start || start > end || end >= forecast.start {
                    return Err(ForecastError::InvalidPeriodOrder(format!(
                        "expected baseline_end < actual_start <= actual_end < forecast_start, got baseline {}, actual {}:{}, forecast {}",
                        baseline, start, end, forecast
                    )));
                }
            }
            (None, None) => {
                if baseline.end >= forecast.start {
                    return Err(ForecastError::InvalidPeriodOrder(format!(
                        "baseline {} overlaps forecast {}",
                        baseline, forecast
                    )));
                }
            }
            _ => {
                return Err(ForecastError::InvalidPeriodOrder(
                    "actual period needs both a start and an end month".to_string(),
                ));
            }
        }

        if !self.cogs_percentage.is_finite() || !(0.0..=1.0).contains(&self.cogs_percentage) {
            return Err(ForecastError::InvalidCogsPercentage(self.cogs_percentage));
        }

        for (field, value) in [
            ("revenue_goal", self.revenue_goal),
            ("opex_budget", self.opex_budget),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ForecastError::InvalidAmount {
                        field: field.to_string(),
                        value,
                    });
                }
            }
        }

        for (field, value) in [
            ("gross_profit_goal", self.gross_profit_goal),
            ("net_profit_goal", self.net_profit_goal),
        ] {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(ForecastError::InvalidAmount {
                        field: field.to_string(),
                        value,
                    });
                }
            }
        }

        Ok(())
    }

    /// A superseding copy: fresh id, linked to this version as its parent.
    pub fn next_version(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            version: self.version + 1,
            parent_id: Some(self.id.clone()),
            ..self.clone()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ForecastDefinition)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// One named account within a P&L category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AccountLine {
    #[schemars(description = "The account name as it appears in the P&L (e.g. 'Sales', 'Office Rent')")]
    pub account_name: String,

    pub category: AccountCategory,

    #[serde(default, deserialize_with = "deserialize_amounts")]
    #[schemars(description = "Recorded amounts keyed by YYYY-MM; only populated months are present")]
    pub actual_months: MonthlyValues,

    #[serde(default, deserialize_with = "deserialize_amounts")]
    #[schemars(description = "Projected amounts keyed by YYYY-MM")]
    pub forecast_months: MonthlyValues,

    #[serde(default)]
    #[schemars(
        description = "If true the forecast values were entered by hand and are never recomputed"
    )]
    pub is_manual: bool,
}

impl AccountLine {
    pub fn new(account_name: impl Into<String>, category: AccountCategory) -> Self {
        Self {
            account_name: account_name.into(),
            category,
            actual_months: BTreeMap::new(),
            forecast_months: BTreeMap::new(),
            is_manual: false,
        }
    }

    pub fn with_actuals(mut self, actuals: impl IntoIterator<Item = (MonthKey, f64)>) -> Self {
        self.actual_months.extend(actuals);
        self
    }

    pub fn with_forecasts(mut self, forecasts: impl IntoIterator<Item = (MonthKey, f64)>) -> Self {
        self.forecast_months.extend(forecasts);
        self
    }

    pub fn manual(mut self) -> Self {
        self.is_manual = true;
        self
    }

    pub fn actual(&self, month: MonthKey) -> f64 {
        self.actual_months.get(&month).copied().unwrap_or(0.0)
    }

    pub fn forecast(&self, month: MonthKey) -> f64 {
        self.forecast_months.get(&month).copied().unwrap_or(0.0)
    }

    pub fn actual_total(&self, months: &[MonthKey]) -> f64 {
        months
            .iter()
            .map(|m| self.actual(*m))
            .fold(0.0, |total, value| total + value)
    }

    pub fn forecast_total(&self, months: &[MonthKey]) -> f64 {
        months
            .iter()
            .map(|m| self.forecast(*m))
            .fold(0.0, |total, value| total + value)
    }
}

fn deserialize_amounts<'de, D>(deserializer: D) -> std::result::Result<MonthlyValues, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<MonthKey, Option<f64>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(month, value)| (month, value.unwrap_or(0.0)))
        .collect())
}
