//! Command-line interface definition

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::records::{ModifyRecordsArgs, TablesArgs};
use commands::workbook::{AppendArgs, CreateSheetArgs, FindArgs, HistoryArgs, SetArgs, SheetsArgs};

#[derive(Parser, Debug)]
#[command(
    name = "sheetsync",
    version,
    about = "Reconcile spreadsheet workbooks with a database, logging every change"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the sheets of a workbook
    Sheets(SheetsArgs),
    /// Find rows of a sheet matching column=value conditions
    Find(FindArgs),
    /// Update one cell and save the workbook
    Set(SetArgs),
    /// Append a row to a sheet and save the workbook
    Append(AppendArgs),
    /// Add a new empty sheet with the given columns
    CreateSheet(CreateSheetArgs),
    /// Show the change log of a workbook
    History(HistoryArgs),
    /// List database tables and their columns
    Tables(TablesArgs),
    /// Interactively modify database records
    ModifyRecords(ModifyRecordsArgs),
}
