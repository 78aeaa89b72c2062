//! Workbook inspection and mutation commands

mod handler;

use std::path::PathBuf;

use clap::Args;

use super::parse_assignment;
use crate::workbook::CellValue;

pub use handler::{
    handle_append_command, handle_create_sheet_command, handle_find_command,
    handle_history_command, handle_set_command, handle_sheets_command,
};

#[derive(Args, Debug)]
pub struct SheetsArgs {
    /// Workbook file (.xlsx)
    pub workbook: PathBuf,
}

#[derive(Args, Debug)]
pub struct FindArgs {
    pub workbook: PathBuf,
    pub sheet: String,

    /// Condition as column=value; repeat to require several
    #[arg(short = 'w', long = "where", value_parser = parse_assignment)]
    pub conditions: Vec<(String, CellValue)>,

    /// Return every matching row instead of the first
    #[arg(long)]
    pub all: bool,
}

/// Where a mutated workbook is written
#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Save to this path instead of overwriting the source workbook
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Include the row index column in the saved sheets
    #[arg(long)]
    pub index: bool,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub workbook: PathBuf,
    pub sheet: String,
    /// 0-based row index (header excluded)
    pub row: usize,
    /// 0-based column index
    pub col: usize,
    /// New value; parsed as number, boolean or timestamp when possible
    pub value: String,

    /// Process label recorded in the change log
    #[arg(short, long)]
    pub process: Option<String>,

    #[command(flatten)]
    pub save: SaveArgs,
}

#[derive(Args, Debug)]
pub struct AppendArgs {
    pub workbook: PathBuf,
    pub sheet: String,

    /// Field as column=value; unknown columns are added to the sheet
    #[arg(short, long = "field", value_parser = parse_assignment, required = true)]
    pub fields: Vec<(String, CellValue)>,

    #[command(flatten)]
    pub save: SaveArgs,
}

#[derive(Args, Debug)]
pub struct CreateSheetArgs {
    pub workbook: PathBuf,
    pub name: String,

    /// Column name; repeat for each column
    #[arg(short, long = "column")]
    pub columns: Vec<String>,

    #[command(flatten)]
    pub save: SaveArgs,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    pub workbook: PathBuf,

    /// Only show changes to this sheet
    #[arg(long)]
    pub sheet: Option<String>,

    /// Only show changes made by this process
    #[arg(long)]
    pub process: Option<String>,
}
