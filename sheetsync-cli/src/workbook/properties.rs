//! Per-sheet visual metadata carried across load and save

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::change_log::sidecar_path;

/// Suffix of the properties sidecar written next to a saved workbook
pub const PROPERTIES_FILE_SUFFIX: &str = "_workbook_properties";

/// Visibility of a sheet tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetState {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

impl From<calamine::SheetVisible> for SheetState {
    fn from(visible: calamine::SheetVisible) -> Self {
        match visible {
            calamine::SheetVisible::Visible => SheetState::Visible,
            calamine::SheetVisible::Hidden => SheetState::Hidden,
            calamine::SheetVisible::VeryHidden => SheetState::VeryHidden,
        }
    }
}

impl std::fmt::Display for SheetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetState::Visible => write!(f, "visible"),
            SheetState::Hidden => write!(f, "hidden"),
            SheetState::VeryHidden => write!(f, "very hidden"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetProperties {
    #[serde(default)]
    pub state: SheetState,
    /// Data rows at the last save; trailing all-null rows leave no cells in the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
}

/// Sheet properties keyed by sheet name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyStore {
    sheets: IndexMap<String, SheetProperties>,
}

impl PropertyStore {
    /// Default properties for every named sheet
    pub fn for_sheets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = PropertyStore::default();
        for name in names {
            store.register_sheet(name);
        }
        store
    }

    /// Overlay the sidecar next to `workbook_path`, if one was saved earlier
    pub(crate) fn overlay_sidecar(&mut self, workbook_path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let path = properties_path_for(workbook_path);
        if !path.exists() {
            return Ok(());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read sheet properties: {}", path.display()))?;
        let saved: PropertyStore = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse sheet properties: {}", path.display()))?;

        for (name, props) in saved.sheets {
            if let Some(existing) = self.sheets.get_mut(&name) {
                *existing = props;
            }
        }
        Ok(())
    }

    /// Add default properties for `name` unless it already has some
    pub fn register_sheet(&mut self, name: impl Into<String>) {
        self.sheets.entry(name.into()).or_default();
    }

    pub fn get(&self, name: &str) -> Option<&SheetProperties> {
        self.sheets.get(name)
    }

    pub fn set_state(&mut self, name: &str, state: SheetState) {
        self.sheets.entry(name.to_string()).or_default().state = state;
    }

    pub fn set_row_count(&mut self, name: &str, rows: usize) {
        self.sheets.entry(name.to_string()).or_default().row_count = Some(rows);
    }

    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.get(name).and_then(|p| p.row_count)
    }

    /// Properties of `name`, or the defaults for an unregistered sheet
    pub fn state_of(&self, name: &str) -> SheetState {
        self.get(name).map(|p| p.state).unwrap_or_default()
    }

    /// Persist the properties next to the workbook saved at `target_path`
    pub fn apply_changes(&self, target_path: &Path) -> std::io::Result<PathBuf> {
        let path = properties_path_for(target_path);
        crate::fs::atomic_write_json(&path, self)?;
        log::debug!("Saved sheet properties to {}", path.display());
        Ok(path)
    }
}

pub fn properties_path_for(workbook_path: &Path) -> PathBuf {
    sidecar_path(workbook_path, PROPERTIES_FILE_SUFFIX)
}
