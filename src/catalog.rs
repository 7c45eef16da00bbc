//! Application and system lookups consumed by admission
//!
//! Admission only reads from the catalog. The binary loads a [StaticCatalog] from a JSON file;
//! anything else that can answer the three lookups can stand in for it.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::software::Application;
use crate::system::{ExecutionSystem, StorageSystem};

pub trait Catalog {
    fn application(&self, app_id: &str) -> Option<&Application>;

    fn execution_system(&self, system_id: &str) -> Option<&ExecutionSystem>;

    /// Does `system_id` name a configured storage resource?
    fn storage_exists(&self, system_id: &str) -> bool;
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCatalog {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub execution_systems: Vec<ExecutionSystem>,
    #[serde(default)]
    pub storage_systems: Vec<StorageSystem>,
}

impl StaticCatalog {
    pub fn load(path: &Path) -> Result<StaticCatalog> {
        info!("Reading catalog at {}", path.display());
        let json = fs::read_to_string(path)
            .with_context(|| format!("Can't read catalog at {}", path.display()))?;
        StaticCatalog::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<StaticCatalog> {
        let catalog: StaticCatalog = serde_json::from_str(json).context("Invalid catalog JSON")?;
        catalog.check()?;
        info!(
            "Catalog has {} applications, {} execution systems, {} storage systems",
            catalog.applications.len(),
            catalog.execution_systems.len(),
            catalog.storage_systems.len()
        );
        Ok(catalog)
    }

    /// Enforce the invariants admission assumes were established when schemas were defined
    fn check(&self) -> Result<()> {
        for app in &self.applications {
            let mut keys = HashSet::new();
            for param in &app.parameters {
                if !keys.insert(param.key.as_str()) {
                    bail!("Application {} declares {} more than once", app.id, param.key);
                }
                if !param.visible && param.default_value.is_null() {
                    bail!("Hidden parameter {} of {} has no default value", param.key, app.id);
                }
            }
            for input in &app.inputs {
                if !keys.insert(input.key.as_str()) {
                    bail!("Application {} declares {} more than once", app.id, input.key);
                }
                if !input.visible && input.default_value.is_null() {
                    bail!("Hidden input {} of {} has no default value", input.key, app.id);
                }
            }
            self.execution_system(&app.execution_system).ok_or_else(|| {
                anyhow!("Application {} runs on unknown system {}", app.id, app.execution_system)
            })?;
        }

        for system in &self.execution_systems {
            let defaults = system.queues.iter().filter(|q| q.is_system_default).count();
            if defaults > 1 {
                bail!("Execution system {} has {} default queues", system.id, defaults);
            }
        }

        Ok(())
    }
}

impl Catalog for StaticCatalog {
    fn application(&self, app_id: &str) -> Option<&Application> {
        self.applications.iter().find(|app| app.id == app_id)
    }

    fn execution_system(&self, system_id: &str) -> Option<&ExecutionSystem> {
        self.execution_systems.iter().find(|system| system.id == system_id)
    }

    fn storage_exists(&self, system_id: &str) -> bool {
        self.storage_systems.iter().any(|system| system.id == system_id)
    }
}
