//! Workbook manager: owns the sheets of one workbook, mirrors cell mutations
//! into the change log and saves sheets, log and properties as one unit.

mod error;
pub mod excel;
pub mod properties;
mod sheet;
mod value;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::change_log::{CellChange, ChangeLog, Coordinate, Payload, log_path_for};
use crate::fs::resolve_path;

pub use error::{Result, WorkbookError};
pub use properties::{PropertyStore, SheetState};
pub use sheet::{Row, Sheet, SheetSeed};
pub use value::{CellValue, TIMESTAMP_FORMAT, parse_timestamp};

/// Rows returned by [`WorkbookManager::get_entries`]
#[derive(Debug, Clone, PartialEq)]
pub enum Entries {
    /// First matching row
    One(Row),
    /// Every matching row, in row order
    All(Vec<Row>),
}

/// What `save` actually wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Every sheet was written to the target
    Written { sheets: usize },
    /// No sheet had rows, so the sheet write was skipped
    SheetsSkipped,
}

#[derive(Debug)]
pub struct WorkbookManager {
    source: Option<PathBuf>,
    sheets: IndexMap<String, Sheet>,
    change_log: Option<ChangeLog>,
    properties: PropertyStore,
}

impl WorkbookManager {
    /// Load every sheet from `path` along with its change log and properties
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WorkbookError::InvalidPath(path.to_path_buf()));
        }

        let loaded = excel::read_workbook(path)?;
        let mut sheets = loaded.sheets;
        let mut properties = loaded.properties;
        if let Err(err) = properties.overlay_sidecar(path) {
            log::warn!("Ignoring saved sheet properties: {:#}", err);
        }

        for (name, sheet) in sheets.iter_mut() {
            if let Some(rows) = properties.row_count(name) {
                sheet.pad_rows(rows);
            }
        }

        let change_log = ChangeLog::load(log_path_for(path))?;

        log::info!(
            "Opened workbook {} ({} sheets)",
            path.display(),
            sheets.len()
        );

        Ok(Self {
            source: Some(path.to_path_buf()),
            sheets,
            change_log: Some(change_log),
            properties,
        })
    }

    /// Build a workbook directly from sheet definitions, with no source file
    pub fn from_sheets(definitions: IndexMap<String, Vec<Row>>) -> Self {
        let sheets: IndexMap<String, Sheet> = definitions
            .into_iter()
            .map(|(name, rows)| (name, Sheet::from_rows(rows)))
            .collect();
        let properties = PropertyStore::for_sheets(sheets.keys().cloned());

        Self {
            source: None,
            sheets,
            change_log: None,
            properties,
        }
    }

    /// Start mirroring cell updates into `log`, replacing any attached log
    pub fn attach_change_log(&mut self, log: ChangeLog) {
        self.change_log = Some(log);
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn change_log(&self) -> Option<&ChangeLog> {
        self.change_log.as_ref()
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyStore {
        &mut self.properties
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .get(name)
            .ok_or_else(|| WorkbookError::UnknownSheet(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.sheets
            .get_mut(name)
            .ok_or_else(|| WorkbookError::UnknownSheet(name.to_string()))
    }

    /// Add a new sheet seeded from column names or rows
    pub fn create_sheet(&mut self, name: &str, seed: impl Into<SheetSeed>) -> Result<()> {
        if self.sheets.contains_key(name) {
            return Err(WorkbookError::DuplicateSheet(name.to_string()));
        }

        self.sheets
            .insert(name.to_string(), Sheet::from_seed(seed.into()));
        self.properties.register_sheet(name);
        log::debug!("Created sheet '{}'", name);
        Ok(())
    }

    /// Overwrite one cell and record `(previous, new)` in the change log
    pub fn update_cell(
        &mut self,
        process: &str,
        sheet: &str,
        row: usize,
        col: usize,
        new_value: impl Into<CellValue>,
    ) -> Result<()> {
        let new_value = new_value.into();
        let table = self.sheet_mut(sheet)?;
        let (rows, cols) = (table.row_count(), table.column_count());

        let previous = table
            .set_cell(row, col, new_value.clone())
            .ok_or_else(|| WorkbookError::OutOfBounds {
                sheet: sheet.to_string(),
                row,
                col,
                rows,
                cols,
            })?;

        log::debug!(
            "[{}] {}!({}, {}): {} -> {}",
            process,
            sheet,
            row,
            col,
            previous,
            new_value
        );

        if let Some(change_log) = &mut self.change_log {
            let payload = Payload::from([(
                Coordinate::new(row, col),
                CellChange::new(previous, new_value),
            )]);
            change_log.append(process, sheet, payload);
        }

        Ok(())
    }

    /// Append a row; unknown keys become new columns (not logged)
    pub fn append_row(&mut self, sheet: &str, row: &Row) -> Result<()> {
        self.sheet_mut(sheet)?.push_row(row);
        Ok(())
    }

    /// Rows of `sheet` whose cells equal every condition
    ///
    /// Returns `None` when nothing matches. All unknown condition columns are
    /// reported together before any filtering happens.
    pub fn get_entries(
        &self,
        sheet: &str,
        conditions: &Row,
        return_all: bool,
    ) -> Result<Option<Entries>> {
        let table = self.sheet(sheet)?;

        let unknown = table.unknown_columns(conditions);
        if !unknown.is_empty() {
            return Err(WorkbookError::InvalidColumn {
                sheet: sheet.to_string(),
                columns: unknown.into_iter().map(str::to_string).collect(),
            });
        }

        let mut matches = table.matching_indices(conditions);

        let entries = if return_all {
            let rows: Vec<Row> = matches.filter_map(|idx| table.row(idx)).collect();
            (!rows.is_empty()).then_some(Entries::All(rows))
        } else {
            matches.next().and_then(|idx| table.row(idx)).map(Entries::One)
        };

        Ok(entries)
    }

    /// First row matching `conditions`
    pub fn find_entry(&self, sheet: &str, conditions: &Row) -> Result<Option<Row>> {
        Ok(match self.get_entries(sheet, conditions, false)? {
            Some(Entries::One(row)) => Some(row),
            _ => None,
        })
    }

    /// Every row matching `conditions`; empty when nothing matches
    pub fn find_entries(&self, sheet: &str, conditions: &Row) -> Result<Vec<Row>> {
        Ok(match self.get_entries(sheet, conditions, true)? {
            Some(Entries::All(rows)) => rows,
            _ => Vec::new(),
        })
    }

    /// Whether `target` names the file this workbook was opened from
    pub fn is_source_path(&self, target: &Path) -> bool {
        self.source
            .as_deref()
            .is_some_and(|source| resolve_path(source) == resolve_path(target))
    }

    /// Save every sheet to `target`, then the change log and the properties
    ///
    /// The workbook is written to a temp file and renamed into place, so a
    /// failed save leaves any previous file at `target` untouched.
    pub fn save(&self, target: impl AsRef<Path>, preserve_row_index: bool) -> Result<SaveOutcome> {
        let target = target.as_ref();

        if self.is_source_path(target) {
            log::warn!(
                "The save path is the same as the read path, {} will be overwritten with changes",
                target.display()
            );
        }

        let mut properties = self.properties.clone();
        for (name, sheet) in &self.sheets {
            properties.set_row_count(name, sheet.row_count());
        }

        let outcome = if self.sheets.values().all(Sheet::is_empty) {
            log::info!("Workbook is empty, skipping sheet write to {}", target.display());
            SaveOutcome::SheetsSkipped
        } else {
            let bytes = excel::render_workbook(&self.sheets, &properties, preserve_row_index)
                .map_err(|e| WorkbookError::save_failed(target, e))?;
            crate::fs::atomic_write_bytes(target, &bytes)
                .map_err(|e| WorkbookError::save_failed(target, e))?;
            log::info!(
                "Saved {} sheets to {}",
                self.sheets.len(),
                target.display()
            );
            SaveOutcome::Written {
                sheets: self.sheets.len(),
            }
        };

        if let Some(change_log) = &self.change_log {
            change_log
                .persist()
                .map_err(|e| WorkbookError::save_failed(target, e))?;
        }

        properties
            .apply_changes(target)
            .map_err(|e| WorkbookError::save_failed(target, e))?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn people() -> WorkbookManager {
        let mut definitions = IndexMap::new();
        definitions.insert(
            "People".to_string(),
            vec![
                row(&[("id", 1.into()), ("name", "Ann".into())]),
                row(&[("id", 2.into()), ("name", "Bo".into())]),
            ],
        );
        WorkbookManager::from_sheets(definitions)
    }

    fn people_logged() -> WorkbookManager {
        let mut wb = people();
        // Never persisted by these tests
        wb.attach_change_log(ChangeLog::empty("people_workbook_logs.json"));
        wb
    }

    #[test]
    fn test_update_cell_changes_value_and_logs_change() {
        let mut wb = people_logged();
        wb.update_cell("Fix", "People", 1, 1, "Beau").unwrap();

        let entry = wb
            .find_entry("People", &row(&[("id", 2.into())]))
            .unwrap()
            .unwrap();
        assert_eq!(entry, row(&[("id", 2.into()), ("name", "Beau".into())]));

        let (_, payload) = wb
            .change_log()
            .unwrap()
            .latest_bucket("People", "Fix")
            .unwrap();
        assert_eq!(
            payload[&Coordinate::new(1, 1)],
            CellChange::new("Bo".into(), "Beau".into())
        );
    }

    #[test]
    fn test_update_cell_rejects_unknown_sheet_and_out_of_bounds() {
        let mut wb = people_logged();

        let err = wb.update_cell("Fix", "Teams", 0, 0, 1).unwrap_err();
        assert!(matches!(err, WorkbookError::UnknownSheet(ref s) if s == "Teams"));

        let err = wb.update_cell("Fix", "People", 2, 0, 1).unwrap_err();
        assert!(matches!(err, WorkbookError::OutOfBounds { row: 2, rows: 2, .. }));

        let err = wb.update_cell("Fix", "People", 0, 2, 1).unwrap_err();
        assert!(matches!(err, WorkbookError::OutOfBounds { col: 2, cols: 2, .. }));

        assert!(wb.change_log().unwrap().is_empty());
    }

    #[test]
    fn test_update_cell_without_change_log() {
        let mut definitions = IndexMap::new();
        definitions.insert("People".to_string(), vec![row(&[("id", 1.into())])]);
        let mut wb = WorkbookManager::from_sheets(definitions);

        wb.update_cell("Fix", "People", 0, 0, 9).unwrap();
        assert!(wb.change_log().is_none());
        assert_eq!(wb.sheet("People").unwrap().cell(0, 0), Some(&CellValue::from(9)));
    }

    #[test]
    fn test_create_sheet_duplicate_leaves_existing_sheet() {
        let mut wb = people();
        let before = wb.sheet("People").unwrap().clone();

        let err = wb
            .create_sheet("People", vec!["other".to_string()])
            .unwrap_err();
        assert!(matches!(err, WorkbookError::DuplicateSheet(_)));
        assert_eq!(wb.sheet("People").unwrap(), &before);
    }

    #[test]
    fn test_create_sheet_from_columns_and_rows() {
        let mut wb = people();
        wb.create_sheet("Audit", vec!["when".to_string(), "who".to_string()])
            .unwrap();
        wb.create_sheet(
            "Teams",
            vec![row(&[("team", "Ops".into())]), row(&[("lead", "Ann".into())])],
        )
        .unwrap();

        assert_eq!(wb.sheet_names().collect::<Vec<_>>(), ["People", "Audit", "Teams"]);
        assert_eq!(wb.sheet("Audit").unwrap().columns(), ["when", "who"]);
        assert!(wb.sheet("Audit").unwrap().is_empty());
        assert_eq!(wb.sheet("Teams").unwrap().columns(), ["team", "lead"]);
        assert_eq!(wb.properties().state_of("Teams"), SheetState::Visible);
        assert!(wb.properties().get("Audit").is_some());
    }

    #[test]
    fn test_append_row_adds_unknown_keys_as_columns() {
        let mut wb = people_logged();
        wb.append_row("People", &row(&[("id", 3.into()), ("team", "Ops".into())]))
            .unwrap();

        let sheet = wb.sheet("People").unwrap();
        assert_eq!(sheet.columns(), ["id", "name", "team"]);
        assert_eq!(
            sheet.row(2).unwrap(),
            row(&[("id", 3.into()), ("name", CellValue::Null), ("team", "Ops".into())])
        );
        assert_eq!(sheet.row(0).unwrap()["team"], CellValue::Null);
        // Row appends are not part of the change log
        assert!(wb.change_log().unwrap().is_empty());

        let err = wb.append_row("Teams", &Row::new()).unwrap_err();
        assert!(matches!(err, WorkbookError::UnknownSheet(_)));
    }

    #[test]
    fn test_get_entries_first_and_all_in_row_order() {
        let mut wb = people();
        wb.append_row("People", &row(&[("id", 3.into()), ("name", "Bo".into())]))
            .unwrap();
        let bo = row(&[("name", "Bo".into())]);

        let first = wb.get_entries("People", &bo, false).unwrap();
        assert_eq!(
            first,
            Some(Entries::One(row(&[("id", 2.into()), ("name", "Bo".into())])))
        );

        let all = wb.get_entries("People", &bo, true).unwrap();
        assert_eq!(
            all,
            Some(Entries::All(vec![
                row(&[("id", 2.into()), ("name", "Bo".into())]),
                row(&[("id", 3.into()), ("name", "Bo".into())]),
            ]))
        );

        assert_eq!(wb.find_entries("People", &Row::new()).unwrap().len(), 3);
    }

    #[test]
    fn test_get_entries_no_match_returns_none() {
        let wb = people();
        let missing = row(&[("id", 3.into())]);
        assert_eq!(wb.get_entries("People", &missing, false).unwrap(), None);
        assert_eq!(wb.get_entries("People", &missing, true).unwrap(), None);
    }

    #[test]
    fn test_get_entries_reports_every_invalid_column() {
        let wb = people();
        let conditions = row(&[("bogus", 1.into()), ("id", 1.into()), ("nope", 2.into())]);

        match wb.get_entries("People", &conditions, false).unwrap_err() {
            WorkbookError::InvalidColumn { columns, .. } => assert_eq!(columns, ["bogus", "nope"]),
            other => panic!("unexpected error: {other}"),
        }

        let err = wb.get_entries("Teams", &Row::new(), false).unwrap_err();
        assert!(matches!(err, WorkbookError::UnknownSheet(_)));
    }

    #[test]
    fn test_open_missing_path() {
        let err = WorkbookManager::open("/definitely/not/here.xlsx").unwrap_err();
        assert!(matches!(err, WorkbookError::InvalidPath(_)));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");

        let when = parse_timestamp("2024-02-29 13:45:10").unwrap();
        let mut definitions = IndexMap::new();
        definitions.insert(
            "People".to_string(),
            vec![
                row(&[("id", 1.into()), ("name", "Ann".into()), ("active", true.into())]),
                row(&[("id", 2.into()), ("name", "Bo".into()), ("joined", when.into())]),
            ],
        );
        definitions.insert("Notes".to_string(), vec![row(&[("text", "hello".into())])]);
        let mut wb = WorkbookManager::from_sheets(definitions);
        wb.properties_mut().set_state("Notes", SheetState::Hidden);

        assert_eq!(wb.save(&path, false).unwrap(), SaveOutcome::Written { sheets: 2 });

        let reloaded = WorkbookManager::open(&path).unwrap();
        assert_eq!(reloaded.sheet_names().collect::<Vec<_>>(), ["People", "Notes"]);
        assert_eq!(reloaded.sheet("People").unwrap(), wb.sheet("People").unwrap());
        assert_eq!(reloaded.sheet("Notes").unwrap(), wb.sheet("Notes").unwrap());
        assert_eq!(reloaded.properties().state_of("Notes"), SheetState::Hidden);
        assert_eq!(reloaded.source(), Some(path.as_path()));
    }

    #[test]
    fn test_save_and_reload_keeps_trailing_null_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.xlsx");

        let mut definitions = IndexMap::new();
        definitions.insert(
            "People".to_string(),
            vec![
                row(&[("id", 1.into()), ("name", "Ann".into())]),
                row(&[("id", CellValue::Null), ("name", CellValue::Null)]),
                row(&[("id", CellValue::Null), ("name", "".into())]),
            ],
        );
        let wb = WorkbookManager::from_sheets(definitions);
        wb.save(&path, false).unwrap();

        let reloaded = WorkbookManager::open(&path).unwrap();
        let sheet = reloaded.sheet("People").unwrap();
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.row(2).unwrap()["name"], CellValue::Null);
    }

    #[test]
    fn test_overwrite_detection_normalizes_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        people().save(&path, false).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let wb = WorkbookManager::open(&path).unwrap();
        assert!(wb.is_source_path(&dir.path().join(".").join("people.xlsx")));
        assert!(wb.is_source_path(&dir.path().join("sub").join("..").join("people.xlsx")));
        assert!(!wb.is_source_path(&dir.path().join("copy.xlsx")));
        assert!(!people().is_source_path(&path));
    }

    #[test]
    fn test_save_with_row_index_adds_leading_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexed.xlsx");

        let wb = people();
        wb.save(&path, true).unwrap();

        let reloaded = WorkbookManager::open(&path).unwrap();
        let sheet = reloaded.sheet("People").unwrap();
        assert_eq!(sheet.columns(), ["Unnamed: 0", "id", "name"]);
        assert_eq!(
            sheet.row(1).unwrap(),
            row(&[("Unnamed: 0", 1.into()), ("id", 2.into()), ("name", "Bo".into())])
        );
    }

    #[test]
    fn test_save_persists_change_log_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        people().save(&path, false).unwrap();

        let mut wb = WorkbookManager::open(&path).unwrap();
        wb.update_cell("Fix", "People", 1, 1, "Beau").unwrap();
        wb.save(&path, false).unwrap();

        let log = ChangeLog::load(dir.path().join("people_workbook_logs.json")).unwrap();
        let (_, payload) = log.latest_bucket("People", "Fix").unwrap();
        assert_eq!(payload[&Coordinate::new(1, 1)].new, CellValue::from("Beau"));

        let reloaded = WorkbookManager::open(&path).unwrap();
        assert_eq!(reloaded.sheet("People").unwrap().cell(1, 1), Some(&CellValue::from("Beau")));
        assert_eq!(reloaded.change_log().unwrap().len(), log.len());
    }

    #[test]
    fn test_save_skips_sheets_when_every_sheet_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty.xlsx");

        let mut wb = WorkbookManager::from_sheets(IndexMap::new());
        wb.create_sheet("Blank", vec!["a".to_string()]).unwrap();
        wb.attach_change_log(ChangeLog::empty(dir.path().join("empty_workbook_logs.json")));

        assert_eq!(wb.save(&target, false).unwrap(), SaveOutcome::SheetsSkipped);
        assert!(!target.exists());
        assert!(dir.path().join("empty_workbook_logs.json").exists());
        assert!(dir.path().join("empty_workbook_properties.json").exists());
    }

    #[test]
    fn test_save_failure_is_wrapped_with_cause() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by a file
        let target = dir.path().join("taken.xlsx");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let err = people().save(&target, false).unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
        match err {
            WorkbookError::SaveFailed { path, .. } => assert_eq!(path, target),
            other => panic!("unexpected error: {other}"),
        }
    }
}
