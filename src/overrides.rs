use crate::schema::{AccountCategory, AccountLine, MonthlyValues};
use crate::utils::MonthKey;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hand edits to a line set, applied in order on top of a generated forecast.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct LineOverrides {
    #[schemars(
        description = "Lines to add before any modification runs, so they can be targeted by later modifications."
    )]
    #[serde(default)]
    pub new_lines: Vec<AccountLine>,

    #[schemars(description = "Ordered list of modifications to apply to lines.")]
    #[serde(default)]
    pub modifications: Vec<LineModification>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LineModification {
    /// Pin one forecast month. The line becomes manual and is skipped by regeneration.
    SetForecastValue {
        target: String,
        #[schemars(description = "Month to set, as YYYY-MM.")]
        month: MonthKey,
        value: f64,
    },

    /// Hand a manual line back to the engine.
    ReleaseManual { target: String },

    Rename {
        #[schemars(description = "The exact current account name.")]
        target: String,
        new_name: String,
    },

    Recategorize {
        target: String,
        category: AccountCategory,
    },

    Delete { target: String },

    /// Sum several lines into one, month by month, for actuals and forecasts.
    Merge {
        #[schemars(description = "Account names to merge from. These are removed.")]
        sources: Vec<String>,
        #[schemars(
            description = "The account name to merge into. If it doesn't exist, it takes the category of the first source."
        )]
        target_name: String,
    },

    /// Multiply every forecast month by `factor`.
    ScaleForecast { target: String, factor: f64 },
}

impl LineOverrides {
    /// Returns a new line set; `base` is left as it was.
    pub fn apply(&self, base: &[AccountLine]) -> Vec<AccountLine> {
        let mut lines = base.to_vec();
        lines.extend(self.new_lines.iter().cloned());

        for modification in &self.modifications {
            apply_single_modification(&mut lines, modification);
        }

        lines
    }

    pub fn schema_as_json() -> serde_json::Result<String> {
        let schema = schemars::schema_for!(LineOverrides);
        serde_json::to_string_pretty(&schema)
    }
}

fn find_mut<'a>(lines: &'a mut [AccountLine], name: &str) -> Option<&'a mut AccountLine> {
    let found = lines.iter_mut().find(|l| l.account_name == name);
    if found.is_none() {
        warn!("Override target '{}' not found; skipping", name);
    }
    found
}

fn apply_single_modification(lines: &mut Vec<AccountLine>, modification: &LineModification) {
    match modification {
        LineModification::SetForecastValue {
            target,
            month,
            value,
        } => {
            if let Some(line) = find_mut(lines, target) {
                line.forecast_months.insert(*month, *value);
                line.is_manual = true;
            }
        }

        LineModification::ReleaseManual { target } => {
            if let Some(line) = find_mut(lines, target) {
                line.is_manual = false;
            }
        }

        LineModification::Rename { target, new_name } => {
            if let Some(line) = find_mut(lines, target) {
                line.account_name = new_name.clone();
            }
        }

        LineModification::Recategorize { target, category } => {
            if let Some(line) = find_mut(lines, target) {
                line.category = *category;
            }
        }

        LineModification::Delete { target } => {
            lines.retain(|l| &l.account_name != target);
        }

        LineModification::ScaleForecast { target, factor } => {
            if let Some(line) = find_mut(lines, target) {
                for value in line.forecast_months.values_mut() {
                    *value *= factor;
                }
            }
        }

        LineModification::Merge {
            sources,
            target_name,
        } => merge_lines(lines, sources, target_name),
    }
}

fn merge_lines(lines: &mut Vec<AccountLine>, sources: &[String], target_name: &str) {
    let matches = |line: &AccountLine| {
        sources.contains(&line.account_name) || line.account_name == target_name
    };

    let Some(position) = lines.iter().position(|l| matches(l)) else {
        warn!("No lines to merge into '{}'", target_name);
        return;
    };

    let mut merged = lines[position].clone();
    merged.account_name = target_name.to_string();
    merged.actual_months = MonthlyValues::new();
    merged.forecast_months = MonthlyValues::new();
    merged.is_manual = false;

    for line in lines.iter().filter(|l| matches(l)) {
        for (month, value) in &line.actual_months {
            *merged.actual_months.entry(*month).or_insert(0.0) += value;
        }
        for (month, value) in &line.forecast_months {
            *merged.forecast_months.entry(*month).or_insert(0.0) += value;
        }
        merged.is_manual |= line.is_manual;
    }

    lines.retain(|l| !matches(l));
    lines.insert(position.min(lines.len()), merged);
}
