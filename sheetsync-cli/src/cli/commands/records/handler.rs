//! Handlers for the database record commands

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input};
use regex::Regex;

use super::{ModifyRecordsArgs, TablesArgs};
use crate::config::Config;
use crate::database::{Filter, RecordStore, SqliteStore};
use crate::workbook::{CellValue, Row};

/// Values parsed from `"column:value"` input
#[derive(Debug, Default, PartialEq)]
pub struct ColumnValues {
    /// Entries whose column exists, in input order
    pub values: Row,
    /// Column names that do not exist in the table
    pub unknown: Vec<String>,
    /// Entries without a `:` separator
    pub malformed: Vec<String>,
}

/// Every double-quoted substring, without the quotes
pub fn extract_quoted_strings(input: &str) -> Vec<String> {
    let re = Regex::new(r#""([^"]*)""#).unwrap();
    re.captures_iter(input)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Parse `"column:value" "column:value"` against the table's columns
///
/// Unknown columns and malformed entries are collected, not fatal, so the
/// caller can report them and carry on with the rest.
pub fn parse_column_values(input: &str, columns: &[String]) -> ColumnValues {
    let mut parsed = ColumnValues::default();

    for entry in extract_quoted_strings(input) {
        let Some((column, value)) = entry.split_once(':') else {
            parsed.malformed.push(entry);
            continue;
        };

        let column = column.trim();
        if columns.iter().any(|c| c == column) {
            parsed
                .values
                .insert(column.to_string(), CellValue::parse(value));
        } else {
            parsed.unknown.push(column.to_string());
        }
    }

    parsed
}

/// Identifiers (first column) of every record matching `conditions`
pub async fn find_record_ids(
    store: &dyn RecordStore,
    table: &str,
    id_column: &str,
    conditions: &Row,
) -> Result<Vec<CellValue>> {
    let filter = Filter::equals(conditions.iter().map(|(c, v)| (c, v.clone())));
    let rows = store
        .select(table, &[id_column.to_string()], &filter)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|mut row| row.shift_remove(id_column))
        .collect())
}

/// Apply `changes` to the records identified by `ids`
pub async fn apply_record_changes(
    store: &mut dyn RecordStore,
    process: &str,
    table: &str,
    id_column: &str,
    ids: Vec<CellValue>,
    changes: &Row,
) -> Result<u64> {
    let filter = Filter::any_of(id_column, ids);
    store.update(process, table, changes, &filter).await
}

pub async fn handle_tables_command(args: TablesArgs, config: &Config) -> Result<()> {
    let path = config.database_path(args.database.as_deref())?;
    let store = SqliteStore::open(&path).await?;

    for table in store.list_tables().await? {
        let columns = store.table_columns(&table).await?;
        println!("{} ({})", table.cyan().bold(), columns.join(", ").dimmed());
    }

    store.close().await
}

pub async fn handle_modify_records_command(args: ModifyRecordsArgs, config: &Config) -> Result<()> {
    let path = config.database_path(args.database.as_deref())?;
    let mut store = SqliteStore::open(&path).await?;
    let tables = store.list_tables().await?;

    loop {
        let table: String = Input::new()
            .with_prompt("Enter the name of the table whose records you wish to alter")
            .interact_text()?;
        let table = table.trim();

        if tables.iter().any(|t| t == table) {
            modify_table(&mut store, &args.process, table).await?;
            store.flush()?;
        } else {
            println!(
                "{}",
                format!("Table '{}' does not exist in the database.", table).red()
            );
        }

        let again = Confirm::new()
            .with_prompt("Would you like to continue with another update operation?")
            .default(false)
            .interact()?;
        if !again {
            break;
        }
    }

    store.close().await
}

async fn modify_table(store: &mut SqliteStore, process: &str, table: &str) -> Result<()> {
    let columns = store.table_columns(table).await?;
    let id_column = columns
        .first()
        .with_context(|| format!("Table '{}' has no columns", table))?
        .clone();

    let input: String = Input::new()
        .with_prompt(format!(
            "Filter records in '{}' with \"column:value\" pairs, e.g. \"Discipline:Philosophy\"",
            table
        ))
        .allow_empty(true)
        .interact_text()?;
    let conditions = parse_column_values(&input, &columns);
    report_skipped(table, &conditions);

    if conditions.values.is_empty() {
        let everything = Confirm::new()
            .with_prompt(format!(
                "No search conditions given. Select every record in '{}'?",
                table
            ))
            .default(false)
            .interact()?;
        if !everything {
            return Ok(());
        }
    }

    let ids = find_record_ids(&*store, table, &id_column, &conditions.values).await?;
    println!("Search returned {} records.", ids.len().to_string().bold());
    if ids.is_empty() {
        return Ok(());
    }

    let input: String = Input::new()
        .with_prompt(format!(
            "Columns to update in '{}' with \"column:value\" pairs, e.g. \"Discipline:Philosophy\"",
            table
        ))
        .allow_empty(true)
        .interact_text()?;
    let changes = parse_column_values(&input, &columns);
    report_skipped(table, &changes);

    if changes.values.is_empty() {
        println!("{}", "No valid columns to update.".yellow());
        return Ok(());
    }

    let updated =
        apply_record_changes(store, process, table, &id_column, ids, &changes.values).await?;
    println!("Updated {} records.", updated.to_string().green());
    Ok(())
}

fn report_skipped(table: &str, parsed: &ColumnValues) {
    for column in &parsed.unknown {
        println!(
            "{}",
            format!("The column '{}' does not exist in the table '{}'.", column, table).red()
        );
    }
    for entry in &parsed.malformed {
        println!(
            "{}",
            format!("Ignoring '{}': expected \"column:value\".", entry).red()
        );
    }
}
