//! History of database updates, grouped like the workbook change log

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::filter::Filter;
use crate::change_log::{moment_key, sidecar_path};
use crate::workbook::Row;

pub const DATABASE_LOG_SUFFIX: &str = "_database_logs";

/// One executed UPDATE statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub changes: Row,
    #[serde(flatten)]
    pub filter: Filter,
    pub rows_affected: u64,
}

/// `moment -> table -> process -> [update, ...]`
pub type UpdateEntries = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<UpdateRecord>>>>;

#[derive(Debug, Clone)]
pub struct DatabaseLog {
    path: PathBuf,
    entries: UpdateEntries,
}

impl DatabaseLog {
    /// Load history from `path`, or start empty if the file does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read database log: {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("Database log is corrupt: {}", path.display()))?
        } else {
            UpdateEntries::new()
        };

        Ok(Self { path, entries })
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: UpdateEntries::new(),
        }
    }

    /// `<dir>/<stem>_database_logs.json` next to a database file
    pub fn path_for(database: &Path) -> PathBuf {
        sidecar_path(database, DATABASE_LOG_SUFFIX)
    }

    pub fn entries(&self) -> &UpdateEntries {
        &self.entries
    }

    pub fn record(&mut self, process: &str, table: &str, update: UpdateRecord) {
        self.record_at(Local::now().naive_local(), process, table, update);
    }

    pub fn record_at(&mut self, at: NaiveDateTime, process: &str, table: &str, update: UpdateRecord) {
        self.entries
            .entry(moment_key(at))
            .or_default()
            .entry(table.to_string())
            .or_default()
            .entry(process.to_string())
            .or_default()
            .push(update);
    }

    pub fn persist(&self) -> Result<()> {
        crate::fs::atomic_write_json(&self.path, &self.entries)
            .with_context(|| format!("Failed to save database log: {}", self.path.display()))?;
        log::info!("Saved database log to {}", self.path.display());
        Ok(())
    }
}
