// 💾 Snapshot Writer
// Persists the clean table, replacing any previous snapshot at the same path.

use crate::cleaning::to_excel_serial;
use crate::error::{PipelineError, PipelineResult};
use crate::table::{format_datetime, Cell, Table};
use anyhow::{anyhow, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;
use tracing::info;

pub const SNAPSHOT_TABLE: &str = "clean_transactions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Xlsx,
    Csv,
    Sqlite,
}

pub fn snapshot_format(path: &Path) -> PipelineResult<SnapshotFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" => Ok(SnapshotFormat::Xlsx),
        "csv" => Ok(SnapshotFormat::Csv),
        "db" | "sqlite" | "sqlite3" => Ok(SnapshotFormat::Sqlite),
        other => Err(PipelineError::persistence(
            path,
            format!("unsupported snapshot extension '{}'", other),
        )),
    }
}

/// Write `table` to `path` as an xlsx workbook, CSV or SQLite depending on the extension.
pub fn write_snapshot(table: &Table, path: &Path) -> PipelineResult<()> {
    let format = snapshot_format(path)?;

    let written = match format {
        SnapshotFormat::Xlsx => write_xlsx(table, path),
        SnapshotFormat::Csv => write_csv(table, path),
        SnapshotFormat::Sqlite => write_sqlite(table, path),
    };
    written.map_err(|e| PipelineError::persistence(path, format!("{:#}", e)))?;

    info!(path = %path.display(), rows = table.len(), "snapshot written");
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

// ============================================================================
// XLSX
// ============================================================================

/// Single sheet, header on the first row. Dates are Excel serials with a date
/// number format so spreadsheet readers see them as dates again.
fn write_xlsx(table: &Table, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;

    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let mut workbook = Workbook::new();
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SNAPSHOT_TABLE)?;

        for (col, name) in table.columns.iter().enumerate() {
            let col = u16::try_from(col).context("too many columns for a worksheet")?;
            worksheet.write_string(0, col, name.as_str())?;
        }

        for (r, row) in table.rows.iter().enumerate() {
            let sheet_row = u32::try_from(r + 1).context("too many rows for a worksheet")?;
            for (col, cell) in row.iter().enumerate() {
                let col = u16::try_from(col).context("too many columns for a worksheet")?;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        worksheet.write_string(sheet_row, col, s.as_str())?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(sheet_row, col, *n)?;
                    }
                    Cell::Bool(b) => {
                        worksheet.write_boolean(sheet_row, col, *b)?;
                    }
                    Cell::DateTime(dt) => {
                        let serial = to_excel_serial(*dt)
                            .ok_or_else(|| anyhow!("date {} is outside the Excel range", dt))?;
                        let format = if format_datetime(dt).len() > 10 {
                            &datetime_format
                        } else {
                            &date_format
                        };
                        worksheet.write_number_with_format(sheet_row, col, serial, format)?;
                    }
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save workbook: {}", path.display()))?;
    Ok(())
}

// ============================================================================
// CSV
// ============================================================================

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;

    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::to_field))?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// SQLITE
// ============================================================================

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// REAL when every present cell is a number, TEXT otherwise
fn column_type(table: &Table, idx: usize) -> &'static str {
    let mut present = table.column(idx).filter(|c| !c.is_missing()).peekable();
    if present.peek().is_some() && present.all(|c| matches!(c, Cell::Number(_))) {
        "REAL"
    } else {
        "TEXT"
    }
}

fn sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Empty => Value::Null,
        Cell::Text(s) => Value::Text(s.clone()),
        Cell::Number(n) => Value::Real(*n),
        Cell::Bool(b) => Value::Integer(i64::from(*b)),
        Cell::DateTime(dt) => Value::Text(format_datetime(dt)),
    }
}

fn write_sqlite(table: &Table, path: &Path) -> Result<()> {
    if table.columns.is_empty() {
        return Err(anyhow!("table has no columns"));
    }
    ensure_parent_dir(path)?;

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

    // WAL mode, same as every database we open
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let column_defs: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{} {}", quote_ident(name), column_type(table, idx)))
        .collect();
    let placeholders = vec!["?"; table.width()].join(", ");

    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", SNAPSHOT_TABLE), [])?;
    tx.execute(
        &format!("CREATE TABLE {} ({})", SNAPSHOT_TABLE, column_defs.join(", ")),
        [],
    )?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            SNAPSHOT_TABLE, placeholders
        ))?;
        for row in &table.rows {
            stmt.execute(params_from_iter(row.iter().map(sql_value)))?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Row count of the snapshot table
pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", SNAPSHOT_TABLE),
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================
