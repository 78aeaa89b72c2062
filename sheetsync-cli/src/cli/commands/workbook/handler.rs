//! Handlers for the workbook commands

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use super::{AppendArgs, CreateSheetArgs, FindArgs, HistoryArgs, SaveArgs, SetArgs, SheetsArgs};
use crate::change_log::{ChangeLog, log_path_for};
use crate::config::Config;
use crate::workbook::{CellValue, Entries, Row, SaveOutcome, SheetState, WorkbookManager};

pub fn handle_sheets_command(args: SheetsArgs) -> Result<()> {
    let wb = WorkbookManager::open(&args.workbook)?;

    println!("{}", args.workbook.display().to_string().bold());
    for name in wb.sheet_names() {
        let sheet = wb.sheet(name)?;
        let state = wb.properties().state_of(name);
        let mut line = format!(
            "  {} ({} columns, {} rows)",
            name.cyan(),
            sheet.column_count(),
            sheet.row_count()
        );
        if state != SheetState::Visible {
            line.push_str(&format!(" [{}]", state).dimmed().to_string());
        }
        println!("{}", line);
    }

    Ok(())
}

pub fn handle_find_command(args: FindArgs) -> Result<()> {
    let wb = WorkbookManager::open(&args.workbook)?;
    let conditions: Row = args.conditions.into_iter().collect();

    let output = match wb.get_entries(&args.sheet, &conditions, args.all)? {
        None => {
            println!("{}", "No matching rows.".yellow());
            return Ok(());
        }
        Some(Entries::One(row)) => serde_json::to_string_pretty(&row)?,
        Some(Entries::All(rows)) => {
            eprintln!("{} matching rows", rows.len());
            serde_json::to_string_pretty(&rows)?
        }
    };

    println!("{}", output);
    Ok(())
}

pub fn handle_set_command(args: SetArgs, config: &Config) -> Result<()> {
    let mut wb = WorkbookManager::open(&args.workbook)?;
    let process = config.process_label(args.process.as_deref());
    let value = CellValue::parse(&args.value);

    let previous = wb
        .sheet(&args.sheet)?
        .cell(args.row, args.col)
        .cloned()
        .unwrap_or_default();
    wb.update_cell(&process, &args.sheet, args.row, args.col, value.clone())?;

    println!(
        "{}!({}, {}): {} -> {}",
        args.sheet.cyan(),
        args.row,
        args.col,
        previous.to_string().dimmed(),
        value.to_string().green()
    );

    save(&wb, &args.workbook, &args.save, config)
}

pub fn handle_append_command(args: AppendArgs, config: &Config) -> Result<()> {
    let mut wb = WorkbookManager::open(&args.workbook)?;
    let row: Row = args.fields.into_iter().collect();

    wb.append_row(&args.sheet, &row)?;
    println!(
        "Appended row {} to {}",
        wb.sheet(&args.sheet)?.row_count() - 1,
        args.sheet.cyan()
    );

    save(&wb, &args.workbook, &args.save, config)
}

pub fn handle_create_sheet_command(args: CreateSheetArgs, config: &Config) -> Result<()> {
    let mut wb = WorkbookManager::open(&args.workbook)?;

    wb.create_sheet(&args.name, args.columns)?;
    println!("Created sheet {}", args.name.cyan());

    save(&wb, &args.workbook, &args.save, config)
}

pub fn handle_history_command(args: HistoryArgs) -> Result<()> {
    let path = log_path_for(&args.workbook);
    let change_log = ChangeLog::load(&path)
        .with_context(|| format!("Failed to load change log for {}", args.workbook.display()))?;

    let mut shown = 0;
    for (moment, sheets) in change_log.entries() {
        for (sheet, processes) in sheets {
            if args.sheet.as_ref().is_some_and(|s| s != sheet) {
                continue;
            }
            for (process, payload) in processes {
                if args.process.as_ref().is_some_and(|p| p != process) {
                    continue;
                }

                println!("{} {} {}", moment.dimmed(), sheet.cyan(), process.bold());
                for (coordinate, change) in payload {
                    println!(
                        "    ({}) {} -> {}",
                        coordinate,
                        change.previous.to_string().dimmed(),
                        change.new.to_string().green()
                    );
                }
                shown += 1;
            }
        }
    }

    if shown == 0 {
        println!("{}", "No changes recorded.".yellow());
    }
    Ok(())
}

fn save(wb: &WorkbookManager, source: &Path, args: &SaveArgs, config: &Config) -> Result<()> {
    let target = args.out.as_deref().unwrap_or(source);
    let row_index = args.index || config.preserve_row_index;

    match wb.save(target, row_index)? {
        SaveOutcome::Written { sheets } => {
            println!("Saved {} sheets to {}", sheets, target.display().to_string().green());
        }
        SaveOutcome::SheetsSkipped => {
            println!(
                "{}",
                "Workbook is empty, sheets were not written. Change log and properties were saved."
                    .yellow()
            );
        }
    }
    Ok(())
}
