// 📥 Source Loader
// Reads the transaction export (spreadsheet or CSV) into an untyped Table.

use crate::error::{PipelineError, PipelineResult};
use crate::table::{Cell, Row, Table};
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

// ============================================================================
// SOURCE FORMATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Spreadsheet,
    Csv,
}

impl SourceFormat {
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Spreadsheet => "spreadsheet",
            SourceFormat::Csv => "CSV",
        }
    }
}

/// Pick the format from the file extension.
///
/// `xlsx`, `xlsm`, `xlsb`, `xls` and `ods` go through calamine; `csv` through the csv crate.
pub fn detect_format(path: &Path) -> PipelineResult<SourceFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Spreadsheet),
        "csv" => Ok(SourceFormat::Csv),
        other => Err(PipelineError::source_unreadable(
            path,
            format!("unsupported file extension '{}'", other),
        )),
    }
}

// ============================================================================
// READERS
// ============================================================================

pub trait TableReader: Send + Sync {
    /// First row is the header, every following row is a record.
    fn read(&self, path: &Path) -> Result<Table>;

    fn format(&self) -> SourceFormat;
}

pub fn get_reader(format: SourceFormat) -> Box<dyn TableReader> {
    match format {
        SourceFormat::Spreadsheet => Box::new(SpreadsheetReader),
        SourceFormat::Csv => Box::new(CsvReader),
    }
}

/// Load the source file at `path`. Any failure is `SourceUnreadable`.
pub fn load_table(path: &Path) -> PipelineResult<Table> {
    if !path.exists() {
        return Err(PipelineError::source_unreadable(path, "file not found"));
    }

    let format = detect_format(path)?;
    let reader = get_reader(format);
    let table = reader
        .read(path)
        .map_err(|e| PipelineError::source_unreadable(path, format!("{:#}", e)))?;

    info!(
        path = %path.display(),
        format = format.name(),
        rows = table.len(),
        columns = table.width(),
        "source loaded"
    );
    Ok(table)
}

/// First worksheet of an Excel/ODS workbook
pub struct SpreadsheetReader;

impl TableReader for SpreadsheetReader {
    fn read(&self, path: &Path) -> Result<Table> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("workbook has no sheets"))?;

        let range = workbook
            .worksheet_range(&sheet)
            .with_context(|| format!("Failed to read sheet '{}'", sheet))?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| anyhow!("sheet '{}' has no header row", sheet))?;

        let columns = header
            .iter()
            .enumerate()
            .map(|(i, data)| header_name(i, data))
            .collect();

        let records: Vec<Row> = rows
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();

        Ok(Table::from_rows(columns, records))
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Spreadsheet
    }
}

fn header_name(position: usize, data: &Data) -> String {
    match data {
        Data::Empty => format!("Unnamed: {}", position),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Spreadsheet value → Cell. Error cells (`#N/A`, `#DIV/0!`) read as empty.
pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(_) => data
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(data.to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Comma-separated export with a header line. Fields stay text.
pub struct CsvReader;

impl TableReader for CsvReader {
    fn read(&self, path: &Path) -> Result<Table> {
        use csv::ReaderBuilder;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let columns: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header in {}", path.display()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(anyhow!("CSV file has no header row"));
        }

        let mut table = Table::new(columns);
        for (line_num, result) in reader.records().enumerate() {
            let record = result
                .with_context(|| format!("Failed to parse CSV line {}", line_num + 2))?;
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::text(field)
                    }
                })
                .collect();
            table.push_row(row);
        }

        Ok(table)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("data/data_kpi.xlsx")).unwrap(), SourceFormat::Spreadsheet);
        assert_eq!(detect_format(Path::new("export.ODS")).unwrap(), SourceFormat::Spreadsheet);
        assert_eq!(detect_format(Path::new("export.csv")).unwrap(), SourceFormat::Csv);
        assert!(detect_format(Path::new("export.json")).is_err());
        assert!(detect_format(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_get_reader() {
        assert_eq!(get_reader(SourceFormat::Csv).format(), SourceFormat::Csv);
        assert_eq!(get_reader(SourceFormat::Spreadsheet).format(), SourceFormat::Spreadsheet);
    }

    #[test]
    fn test_load_csv() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "sales.csv",
            "ID Client,Montant,Date\nA,\"10,50€\",2024-01-01\nB,,2024-01-02\n",
        );

        let table = load_table(&path).unwrap();
        assert_eq!(table.columns, vec!["ID Client", "Montant", "Date"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][1], Cell::text("10,50€"));
        assert_eq!(table.rows[1][1], Cell::Empty);
    }

    #[test]
    fn test_ragged_csv_rows_are_padded_and_truncated() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ragged.csv", "a,b,c\n1\n1,2,3,4\n");

        let table = load_table(&path).unwrap();
        assert_eq!(table.rows[0], vec![Cell::text("1"), Cell::Empty, Cell::Empty]);
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn test_missing_file_is_source_unreadable() {
        let err = load_table(Path::new("/definitely/not/here.xlsx")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnreadable { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_csv_is_source_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "");
        let err = load_table(&path).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_garbage_workbook_is_source_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "broken.xlsx", "this is not a zip archive");
        let err = load_table(&path).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Int(1001)), Cell::Number(1001.0));
        assert_eq!(cell_from_data(&Data::Float(10.5)), Cell::Number(10.5));
        assert_eq!(cell_from_data(&Data::String("Books".into())), Cell::text("Books"));
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2024-01-01T00:00:00".into())),
            Cell::text("2024-01-01T00:00:00")
        );
    }

    #[test]
    fn test_date_cell_from_data() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};
        use chrono::NaiveDate;

        let data = Data::DateTime(ExcelDateTime::new(45296.0, ExcelDateTimeType::DateTime, false));
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(cell_from_data(&data), Cell::DateTime(expected));
    }

    #[test]
    fn test_header_names() {
        assert_eq!(header_name(0, &Data::String("Montant".into())), "Montant");
        assert_eq!(header_name(3, &Data::Empty), "Unnamed: 3");
    }
}
