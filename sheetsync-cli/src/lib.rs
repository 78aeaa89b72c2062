//! Workbook editing with a per-cell change log, plus logged updates to SQLite records

pub mod change_log;
pub mod cli;
pub mod config;
pub mod database;
pub mod fs;
pub mod workbook;
