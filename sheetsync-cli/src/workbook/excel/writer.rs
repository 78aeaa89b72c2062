//! Render in-memory sheets into a single `.xlsx` document

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::workbook::properties::{PropertyStore, SheetState};
use crate::workbook::{CellValue, Sheet};

const TIMESTAMP_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Render every sheet, in order, to xlsx bytes
///
/// With `row_index` a leading column with a blank header holds each row's
/// 0-based position.
pub fn render_workbook(
    sheets: &IndexMap<String, Sheet>,
    properties: &PropertyStore,
    row_index: bool,
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let timestamp_format = Format::new().set_num_format(TIMESTAMP_NUM_FORMAT);

    for (name, sheet) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(name)
            .with_context(|| format!("Invalid sheet name: {}", name))?;

        if properties.state_of(name) != SheetState::Visible {
            worksheet.set_hidden(true);
        }

        write_sheet(worksheet, sheet, row_index, &timestamp_format)
            .with_context(|| format!("Failed to write sheet: {}", name))?;
    }

    workbook
        .save_to_buffer()
        .context("Failed to render workbook")
}

fn write_sheet(
    ws: &mut Worksheet,
    sheet: &Sheet,
    row_index: bool,
    ts_format: &Format,
) -> Result<()> {
    let offset = usize::from(row_index);

    for (idx, column) in sheet.columns().iter().enumerate() {
        if !column.is_empty() {
            ws.write_string(0, excel_col(idx + offset)?, column)?;
        }
    }

    for (row_idx, cells) in sheet.cells().enumerate() {
        let row = excel_row(row_idx + 1)?;

        if row_index {
            ws.write_number(row, 0, row_idx as f64)?;
        }

        for (col_idx, value) in cells.iter().enumerate() {
            write_value(ws, row, excel_col(col_idx + offset)?, value, ts_format)?;
        }
    }

    Ok(())
}

fn write_value(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    ts_format: &Format,
) -> Result<()> {
    match value {
        // Empty strings read back as null, so both leave the cell blank
        CellValue::Null => {}
        CellValue::String(s) if s.is_empty() => {}
        CellValue::String(s) => {
            ws.write_string(row, col, s)?;
        }
        CellValue::Number(n) => {
            ws.write_number(row, col, *n)?;
        }
        CellValue::Boolean(b) => {
            ws.write_boolean(row, col, *b)?;
        }
        CellValue::Timestamp(ts) => {
            ws.write_datetime_with_format(row, col, ts, ts_format)?;
        }
    }
    Ok(())
}

fn excel_row(idx: usize) -> Result<u32> {
    u32::try_from(idx).with_context(|| format!("Row {} exceeds the worksheet limit", idx))
}

fn excel_col(idx: usize) -> Result<u16> {
    u16::try_from(idx).with_context(|| format!("Column {} exceeds the worksheet limit", idx))
}
