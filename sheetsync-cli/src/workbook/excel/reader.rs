//! Read every sheet of a workbook into memory

use std::collections::HashMap;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use indexmap::IndexMap;

use crate::workbook::properties::PropertyStore;
use crate::workbook::value::parse_timestamp;
use crate::workbook::{CellValue, Result, Sheet, WorkbookError};

/// Sheets (in workbook order) and their properties as stored in the file
#[derive(Debug)]
pub struct LoadedWorkbook {
    pub sheets: IndexMap<String, Sheet>,
    pub properties: PropertyStore,
}

/// Read all sheets from an `.xlsx`/`.xls`/`.ods` file
///
/// The first row of each sheet is its header. Blank headers become
/// `Unnamed: <idx>` and repeated headers get a `.1`, `.2`, ... suffix so
/// column names stay unique.
pub fn read_workbook(path: &Path) -> Result<LoadedWorkbook> {
    let unreadable = |source| WorkbookError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(unreadable)?;

    let mut properties = PropertyStore::default();
    for meta in workbook.sheets_metadata() {
        properties.set_state(&meta.name, meta.visible.into());
    }

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = IndexMap::new();
    let empty = Data::Empty;

    for sheet_name in sheet_names {
        let range = workbook.worksheet_range(&sheet_name).map_err(unreadable)?;

        // Ranges start at the first used cell; pad back to column A
        let leading_cols = range.start().map(|(_, col)| col as usize).unwrap_or(0);
        let mut rows = range.rows();

        let sheet = match rows.next() {
            None => Sheet::default(),
            Some(header) => {
                let header_cells = std::iter::repeat_n(&empty, leading_cols).chain(header);
                let columns = parse_header(header_cells);
                let data = rows
                    .map(|row| {
                        std::iter::repeat_n(CellValue::Null, leading_cols)
                            .chain(row.iter().map(cell_to_value))
                            .collect::<Vec<_>>()
                    })
                    .collect();
                Sheet::from_parts(columns, data)
            }
        };

        log::debug!(
            "Read sheet '{}' ({} columns, {} rows)",
            sheet_name,
            sheet.column_count(),
            sheet.row_count()
        );
        sheets.insert(sheet_name, sheet);
    }

    Ok(LoadedWorkbook { sheets, properties })
}

fn parse_header<'a>(cells: impl Iterator<Item = &'a Data>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    cells
        .enumerate()
        .map(|(idx, cell)| {
            let name = match cell_to_value(cell) {
                CellValue::Null => format!("Unnamed: {}", idx),
                value => value.to_string(),
            };

            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

/// Convert a calamine cell into a typed cell value
fn cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::from(*i),
        Data::Float(f) => CellValue::from(*f),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::from(dt.as_f64()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(CellValue::Timestamp)
            .unwrap_or_default(),
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(CellValue::Timestamp)
            .unwrap_or_else(|| CellValue::String(s.clone())),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(_) => CellValue::Null,
    }
}

/// Excel serial date (days since 1899-12-30) rounded to the second
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}
