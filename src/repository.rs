//! Persistence boundary.
//!
//! The engine never touches storage. Callers go through [`ForecastRepository`], which
//! keeps definitions append-only: a saved version is superseded by a new one with a
//! `parent_id`, never overwritten.

use crate::engine::{generate_forecast, ForecastRun};
use crate::error::{ForecastError, Result};
use crate::schema::{AccountLine, ForecastDefinition};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

pub trait ForecastRepository {
    fn load_definition(&self, id: &str) -> Result<ForecastDefinition>;

    /// Stores a new version. Fails with `DuplicateVersion` if the id is already saved.
    fn save_definition(&mut self, definition: ForecastDefinition) -> Result<()>;

    /// Lines stored for a forecast; empty when none were saved yet.
    fn load_lines(&self, forecast_id: &str) -> Result<Vec<AccountLine>>;

    /// Replaces the line set of an existing forecast.
    fn save_lines(&mut self, forecast_id: &str, lines: Vec<AccountLine>) -> Result<()>;

    /// The versions leading to `id`, oldest first.
    fn version_chain(&self, id: &str) -> Result<Vec<ForecastDefinition>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id.to_string());

        while let Some(current) = next {
            if !seen.insert(current.clone()) {
                break;
            }
            let definition = self.load_definition(&current)?;
            next = definition.parent_id.clone();
            chain.push(definition);
        }

        chain.reverse();
        Ok(chain)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    definitions: BTreeMap<String, ForecastDefinition>,
    lines: BTreeMap<String, Vec<AccountLine>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions of one business and fiscal year, ordered by version.
    pub fn versions_for(&self, business_id: &str, fiscal_year: i32) -> Vec<&ForecastDefinition> {
        let mut versions: Vec<&ForecastDefinition> = self
            .definitions
            .values()
            .filter(|d| d.business_id == business_id && d.fiscal_year == fiscal_year)
            .collect();
        versions.sort_by_key(|d| d.version);
        versions
    }

    pub fn latest_version(
        &self,
        business_id: &str,
        fiscal_year: i32,
    ) -> Option<&ForecastDefinition> {
        self.versions_for(business_id, fiscal_year).pop()
    }
}

impl ForecastRepository for InMemoryRepository {
    fn load_definition(&self, id: &str) -> Result<ForecastDefinition> {
        self.definitions
            .get(id)
            .cloned()
            .ok_or_else(|| ForecastError::NotFound(id.to_string()))
    }

    fn save_definition(&mut self, definition: ForecastDefinition) -> Result<()> {
        if self.definitions.contains_key(&definition.id) {
            return Err(ForecastError::DuplicateVersion(definition.id));
        }
        definition.validate()?;
        debug!(
            "Saving forecast {} (version {}) for {}",
            definition.id, definition.version, definition.business_id
        );
        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    fn load_lines(&self, forecast_id: &str) -> Result<Vec<AccountLine>> {
        if !self.definitions.contains_key(forecast_id) {
            return Err(ForecastError::NotFound(forecast_id.to_string()));
        }
        Ok(self.lines.get(forecast_id).cloned().unwrap_or_default())
    }

    fn save_lines(&mut self, forecast_id: &str, lines: Vec<AccountLine>) -> Result<()> {
        if !self.definitions.contains_key(forecast_id) {
            return Err(ForecastError::NotFound(forecast_id.to_string()));
        }
        self.lines.insert(forecast_id.to_string(), lines);
        Ok(())
    }
}

/// Loads a forecast and its lines, regenerates, and stores the new lines.
pub fn regenerate_forecast<R: ForecastRepository + ?Sized>(
    repository: &mut R,
    forecast_id: &str,
) -> Result<ForecastRun> {
    let definition = repository.load_definition(forecast_id)?;
    let lines = repository.load_lines(forecast_id)?;

    let run = generate_forecast(&definition, &lines)?;
    repository.save_lines(forecast_id, run.lines.clone())?;

    info!(
        "Regenerated forecast {} with {} lines and {} warnings",
        forecast_id,
        run.lines.len(),
        run.warnings.len()
    );

    Ok(run)
}

/// Saves a successor of `forecast_id` with `edit` applied, carrying its lines across.
pub fn save_new_version<R, F>(
    repository: &mut R,
    forecast_id: &str,
    edit: F,
) -> Result<ForecastDefinition>
where
    R: ForecastRepository + ?Sized,
    F: FnOnce(&mut ForecastDefinition),
{
    let parent = repository.load_definition(forecast_id)?;
    let lines = repository.load_lines(forecast_id)?;

    let mut next = parent.next_version();
    edit(&mut next);

    repository.save_definition(next.clone())?;
    repository.save_lines(&next.id, lines)?;

    Ok(next)
}

/// A definition with its lines, as written to and read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSnapshot {
    pub definition: ForecastDefinition,
    pub lines: Vec<AccountLine>,
}

impl ForecastSnapshot {
    pub fn load<R: ForecastRepository + ?Sized>(repository: &R, forecast_id: &str) -> Result<Self> {
        Ok(Self {
            definition: repository.load_definition(forecast_id)?,
            lines: repository.load_lines(forecast_id)?,
        })
    }

    /// Stores the snapshot as a new version in `repository`.
    pub fn store<R: ForecastRepository + ?Sized>(self, repository: &mut R) -> Result<()> {
        let id = self.definition.id.clone();
        repository.save_definition(self.definition)?;
        repository.save_lines(&id, self.lines)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.definition.validate()?;
        Ok(snapshot)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
