//! Database record commands

mod handler;

use std::path::PathBuf;

use clap::Args;

pub use handler::{handle_modify_records_command, handle_tables_command};

/// Process label used by the interactive record modifier
pub const MODIFY_RECORDS_PROCESS: &str = "Modify Database Records";

#[derive(Args, Debug)]
pub struct TablesArgs {
    /// SQLite database file (overrides the configured one)
    #[arg(short, long)]
    pub database: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ModifyRecordsArgs {
    /// SQLite database file (overrides the configured one)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Process label recorded in the database log
    #[arg(short, long, default_value = MODIFY_RECORDS_PROCESS)]
    pub process: String,
}
