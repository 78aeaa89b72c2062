//! Relational side of the reconciliation: table discovery, filtered selects
//! and logged updates, all with positional parameter binding.

pub mod filter;
pub mod update_log;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::workbook::Row;

pub use filter::Filter;
pub use update_log::DatabaseLog;
pub use sqlite::SqliteStore;

/// Operations the migration flows need from a database
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Names of every user table
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column names of `table` in declaration order; the first one identifies a record
    async fn table_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Rows of `table` matching `filter`, restricted to `columns`
    async fn select(&self, table: &str, columns: &[String], filter: &Filter) -> Result<Vec<Row>>;

    /// Set `changes` on every row matching `filter`, attributed to `process`
    ///
    /// Returns the number of rows affected.
    async fn update(&mut self, process: &str, table: &str, changes: &Row, filter: &Filter)
    -> Result<u64>;
}
