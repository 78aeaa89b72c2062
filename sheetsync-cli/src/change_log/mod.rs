//! Timestamped, process-attributed history of cell mutations
//!
//! The log is a nested mapping `moment -> sheet -> process -> {coordinate: [previous, new]}`
//! persisted as pretty-printed JSON next to the source workbook. Moments have
//! second resolution, so every mutation made by the same process on the same
//! sheet within one second lands in a single bucket.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::workbook::{CellValue, Result, WorkbookError};

/// Format of the moment keys; sorts chronologically as text
pub const MOMENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix appended to the workbook stem to name its change log
pub const LOG_FILE_SUFFIX: &str = "_workbook_logs";

pub type Payload = BTreeMap<Coordinate, CellChange>;
pub type ProcessLogs = BTreeMap<String, Payload>;
pub type SheetLogs = BTreeMap<String, ProcessLogs>;
pub type Entries = BTreeMap<String, SheetLogs>;

/// A (row, column) pair within a sheet, serialized as `"row,col"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    pub row: usize,
    pub col: usize,
}

impl Coordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl std::str::FromStr for Coordinate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (row, col) = s
            .split_once(',')
            .ok_or_else(|| format!("invalid coordinate '{}', expected 'row,col'", s))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid coordinate '{}': {}", s, e))
        };
        Ok(Coordinate::new(parse(row)?, parse(col)?))
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Previous and new value of one cell, serialized as `[previous, new]`
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    pub previous: CellValue,
    pub new: CellValue,
}

impl CellChange {
    pub fn new(previous: CellValue, new: CellValue) -> Self {
        Self { previous, new }
    }
}

impl Serialize for CellChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.previous, &self.new).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CellChange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (previous, new) = <(CellValue, CellValue)>::deserialize(deserializer)?;
        Ok(CellChange { previous, new })
    }
}

/// Format a point in time as a change log moment key
pub fn moment_key(at: NaiveDateTime) -> String {
    at.format(MOMENT_FORMAT).to_string()
}

/// `<dir>/<stem>_workbook_logs.json` for a workbook at `<dir>/<stem>.<ext>`
pub fn log_path_for(workbook_path: &Path) -> PathBuf {
    sidecar_path(workbook_path, LOG_FILE_SUFFIX)
}

/// `<dir>/<stem><suffix>.json` next to `path`
pub fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}.json", stem, suffix))
}

/// Append-only change history bound to a file on disk
#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
    entries: Entries,
}

impl ChangeLog {
    /// Load history from `path`, or start empty if the file does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let entries: Entries =
                serde_json::from_slice(&bytes).map_err(|source| WorkbookError::CorruptLog {
                    path: path.clone(),
                    source,
                })?;
            log::debug!(
                "Loaded change log {} ({} moments)",
                path.display(),
                entries.len()
            );
            entries
        } else {
            Entries::new()
        };

        Ok(Self { path, entries })
    }

    /// Empty log that will persist to `path`, ignoring any existing file
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Entries::new(),
        }
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    /// Number of distinct moments recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `payload` at the current local second
    pub fn append(&mut self, process: &str, sheet: &str, payload: Payload) {
        self.append_at(Local::now().naive_local(), process, sheet, payload);
    }

    /// Record `payload` at `at` (truncated to the second)
    ///
    /// Coordinates already present in the `(moment, sheet, process)` bucket are
    /// overwritten; every other coordinate in the bucket is kept.
    pub fn append_at(&mut self, at: NaiveDateTime, process: &str, sheet: &str, payload: Payload) {
        self.entries
            .entry(moment_key(at))
            .or_default()
            .entry(sheet.to_string())
            .or_default()
            .entry(process.to_string())
            .or_default()
            .extend(payload);
    }

    pub fn bucket(&self, moment: &str, sheet: &str, process: &str) -> Option<&Payload> {
        self.entries.get(moment)?.get(sheet)?.get(process)
    }

    /// Most recent bucket for `(sheet, process)` with its moment key
    pub fn latest_bucket(&self, sheet: &str, process: &str) -> Option<(&str, &Payload)> {
        self.entries.iter().rev().find_map(|(moment, sheets)| {
            sheets
                .get(sheet)
                .and_then(|processes| processes.get(process))
                .map(|payload| (moment.as_str(), payload))
        })
    }

    /// Rewrite the whole log file atomically
    pub fn persist(&self) -> std::io::Result<()> {
        crate::fs::atomic_write_json(&self.path, &self.entries)?;
        log::info!(
            "Saved change log to {} ({} moments)",
            self.path.display(),
            self.entries.len()
        );
        Ok(())
    }
}
