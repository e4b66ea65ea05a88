// 🧹 Row Cleaner
// Fixed sequence of filtering stages over the normalized table.
//
// Each stage takes the surviving table and returns (table, removed). The report is
// threaded through by value, so a stage can be tested on its own.

use crate::derived::add_calendar_columns;
use crate::schema::CanonicalField;
use crate::table::{Cell, Row, Table};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// STAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    EmptyRows,
    Duplicates,
    ClientId,
    Amount,
    InvalidDate,
    FutureDate,
    Category,
    PaymentMethod,
}

impl CleaningStage {
    pub fn label(&self) -> &'static str {
        match self {
            CleaningStage::EmptyRows => "empty rows",
            CleaningStage::Duplicates => "duplicates",
            CleaningStage::ClientId => "invalid client ids",
            CleaningStage::Amount => "invalid amounts",
            CleaningStage::InvalidDate => "unparseable dates",
            CleaningStage::FutureDate => "future dates",
            CleaningStage::Category => "invalid categories",
            CleaningStage::PaymentMethod => "invalid payment methods",
        }
    }
}

// ============================================================================
// CLEANING REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub initial_rows: usize,
    pub empty_rows: usize,
    pub duplicates: usize,
    pub invalid_client_ids: usize,
    pub invalid_amounts: usize,
    pub invalid_dates: usize,
    pub future_dates: usize,
    pub invalid_categories: usize,
    pub invalid_payment_methods: usize,
    pub final_rows: usize,
    pub removed_rows: usize,
    pub loss_percentage: f64,
}

impl CleaningReport {
    pub fn new(initial_rows: usize) -> Self {
        CleaningReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            initial_rows,
            empty_rows: 0,
            duplicates: 0,
            invalid_client_ids: 0,
            invalid_amounts: 0,
            invalid_dates: 0,
            future_dates: 0,
            invalid_categories: 0,
            invalid_payment_methods: 0,
            final_rows: initial_rows,
            removed_rows: 0,
            loss_percentage: 0.0,
        }
    }

    /// Add a stage's removal count
    pub fn with_removed(mut self, stage: CleaningStage, removed: usize) -> Self {
        let counter = match stage {
            CleaningStage::EmptyRows => &mut self.empty_rows,
            CleaningStage::Duplicates => &mut self.duplicates,
            CleaningStage::ClientId => &mut self.invalid_client_ids,
            CleaningStage::Amount => &mut self.invalid_amounts,
            CleaningStage::InvalidDate => &mut self.invalid_dates,
            CleaningStage::FutureDate => &mut self.future_dates,
            CleaningStage::Category => &mut self.invalid_categories,
            CleaningStage::PaymentMethod => &mut self.invalid_payment_methods,
        };
        *counter += removed;
        self
    }

    pub fn removed_by(&self, stage: CleaningStage) -> usize {
        match stage {
            CleaningStage::EmptyRows => self.empty_rows,
            CleaningStage::Duplicates => self.duplicates,
            CleaningStage::ClientId => self.invalid_client_ids,
            CleaningStage::Amount => self.invalid_amounts,
            CleaningStage::InvalidDate => self.invalid_dates,
            CleaningStage::FutureDate => self.future_dates,
            CleaningStage::Category => self.invalid_categories,
            CleaningStage::PaymentMethod => self.invalid_payment_methods,
        }
    }

    /// Unparseable plus future dates
    pub fn date_rejections(&self) -> usize {
        self.invalid_dates + self.future_dates
    }

    /// Seal the report with the final row count
    pub fn finish(mut self, final_rows: usize) -> Self {
        self.final_rows = final_rows;
        self.removed_rows = self.initial_rows.saturating_sub(final_rows);
        self.loss_percentage = if self.initial_rows > 0 {
            self.removed_rows as f64 / self.initial_rows as f64 * 100.0
        } else {
            0.0
        };
        self
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows in, {} rows out, {} removed ({:.2}%)",
            self.initial_rows, self.final_rows, self.removed_rows, self.loss_percentage
        )
    }
}

// ============================================================================
// VALUE PARSING
// ============================================================================

/// Amount from a raw cell. Text drops `€` and whitespace and reads `,` as the
/// decimal separator. Non-finite values are rejected.
pub fn parse_amount(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => {
            let cleaned: String = s
                .replace(',', ".")
                .replace('€', "")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    value.filter(|n| n.is_finite())
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Excel serial day 0 (the 1900 date system, leap-bug adjusted)
fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Serial numbers between 1900-01-01 and 9999-12-31
fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    excel_epoch()?.checked_add_signed(chrono::Duration::milliseconds(millis))
}

/// Inverse of the serial parsing above, for workbook snapshots
pub fn to_excel_serial(dt: NaiveDateTime) -> Option<f64> {
    let millis = dt.signed_duration_since(excel_epoch()?).num_milliseconds();
    let serial = millis as f64 / 86_400_000.0;
    (1.0..=2_958_466.0).contains(&serial).then_some(serial)
}

/// Text date or date-time. Ambiguous slash dates are read day-first
/// (`05/01/2024` is 5 January).
pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Date from a raw cell: spreadsheet date-times, Excel serial numbers, or text.
pub fn parse_date(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Number(n) => from_excel_serial(*n),
        Cell::Text(s) => parse_date_text(s),
        _ => None,
    }
}

/// Word-initial letters upper-cased, the rest lower-cased. Any non-letter
/// starts a new word ("e-wallet" → "E-Wallet").
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

// ============================================================================
// STAGE FUNCTIONS
// ============================================================================

fn column_of(table: &Table, field: CanonicalField) -> Option<usize> {
    table.column_index(field.column_name())
}

/// Stage 1
pub fn drop_empty_rows(table: Table) -> (Table, usize) {
    table.retain_rows(|row| !row.iter().all(Cell::is_missing))
}

/// SHA-256 over the type-tagged cell keys, length-prefixed
pub fn row_fingerprint(row: &Row) -> String {
    let mut hasher = Sha256::new();
    for cell in row {
        let key = cell.identity_key();
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Stage 2: exact duplicates on raw values, first occurrence kept
pub fn drop_duplicate_rows(table: Table) -> (Table, usize) {
    let mut seen = HashSet::new();
    table.retain_rows(|row| seen.insert(row_fingerprint(row)))
}

/// Stage 3
pub fn clean_client_ids(mut table: Table) -> (Table, usize) {
    let Some(idx) = column_of(&table, CanonicalField::ClientId) else {
        return (table, 0);
    };
    table.map_column(idx, |cell| Cell::Text(cell.coerce_text().trim().to_string()));
    table.retain_rows(|row| matches!(row[idx].as_str(), Some(id) if !id.is_empty() && id != "nan"))
}

/// Stage 4
pub fn clean_amounts(mut table: Table) -> (Table, usize) {
    let Some(idx) = column_of(&table, CanonicalField::Amount) else {
        return (table, 0);
    };
    // Rounded before the sign check: 0.004 rounds to 0 and goes
    table.map_column(idx, |cell| {
        parse_amount(cell)
            .map(|n| Cell::Number(round_cents(n)))
            .unwrap_or(Cell::Empty)
    });
    table.retain_rows(|row| matches!(row[idx].as_number(), Some(n) if n > 0.0))
}

/// Stage 5a
pub fn parse_dates(mut table: Table) -> (Table, usize) {
    let Some(idx) = column_of(&table, CanonicalField::Date) else {
        return (table, 0);
    };
    table.map_column(idx, |cell| parse_date(cell).map(Cell::DateTime).unwrap_or(Cell::Empty));
    table.retain_rows(|row| row[idx].as_datetime().is_some())
}

/// Stage 5b: dates strictly after `now` go
pub fn drop_future_dates(table: Table, now: NaiveDateTime) -> (Table, usize) {
    let Some(idx) = column_of(&table, CanonicalField::Date) else {
        return (table, 0);
    };
    table.retain_rows(|row| matches!(row[idx].as_datetime(), Some(dt) if dt <= now))
}

/// Stages 6 and 7: trim + title-case, then drop empty and "Nan"
pub fn clean_label_column(mut table: Table, field: CanonicalField) -> (Table, usize) {
    let Some(idx) = column_of(&table, field) else {
        return (table, 0);
    };
    table.map_column(idx, |cell| Cell::Text(title_case(cell.coerce_text().trim())));
    table.retain_rows(|row| matches!(row[idx].as_str(), Some(label) if !label.is_empty() && label != "Nan"))
}

fn distinct_labels(table: &Table, field: CanonicalField) -> Vec<String> {
    let Some(idx) = column_of(table, field) else {
        return Vec::new();
    };
    let mut labels: Vec<String> = table
        .column(idx)
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    labels.sort();
    labels
}

// ============================================================================
// ROW CLEANER
// ============================================================================

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: Table,
    pub report: CleaningReport,
}

pub struct RowCleaner {
    /// Anything dated after this is a future date
    reference_time: NaiveDateTime,
}

impl RowCleaner {
    pub fn new() -> Self {
        RowCleaner {
            reference_time: Local::now().naive_local(),
        }
    }

    pub fn with_reference_time(reference_time: NaiveDateTime) -> Self {
        RowCleaner { reference_time }
    }

    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    /// Run every stage in order, then derive the calendar columns.
    pub fn clean(&self, table: Table) -> CleanOutcome {
        let report = CleaningReport::new(table.len());
        let now = self.reference_time;

        let (table, report) = run_stage(table, report, CleaningStage::EmptyRows, drop_empty_rows);
        let (table, report) = run_stage(table, report, CleaningStage::Duplicates, drop_duplicate_rows);
        let (table, report) = run_stage(table, report, CleaningStage::ClientId, clean_client_ids);
        let (table, report) = run_stage(table, report, CleaningStage::Amount, clean_amounts);
        let (table, report) = run_stage(table, report, CleaningStage::InvalidDate, parse_dates);
        let (table, report) =
            run_stage(table, report, CleaningStage::FutureDate, |t| drop_future_dates(t, now));
        let (table, report) = run_stage(table, report, CleaningStage::Category, |t| {
            clean_label_column(t, CanonicalField::Category)
        });
        let (table, report) = run_stage(table, report, CleaningStage::PaymentMethod, |t| {
            clean_label_column(t, CanonicalField::PaymentMethod)
        });

        debug!(categories = ?distinct_labels(&table, CanonicalField::Category), "categories found");
        debug!(payment_methods = ?distinct_labels(&table, CanonicalField::PaymentMethod), "payment methods found");

        let table = add_calendar_columns(table);
        let report = report.finish(table.len());

        info!(
            initial = report.initial_rows,
            final_rows = report.final_rows,
            loss_pct = report.loss_percentage,
            "cleaning complete"
        );

        CleanOutcome { table, report }
    }
}

impl Default for RowCleaner {
    fn default() -> Self {
        Self::new()
    }
}

fn run_stage<F>(
    table: Table,
    report: CleaningReport,
    stage: CleaningStage,
    f: F,
) -> (Table, CleaningReport)
where
    F: FnOnce(Table) -> (Table, usize),
{
    let (table, removed) = f(table);
    info!(stage = stage.label(), removed, remaining = table.len(), "stage done");
    (table, report.with_removed(stage, removed))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::transactions_from_table;

    const HEADER: [&str; 5] = ["ID_Client", "Montant", "Date", "Categorie", "Mode_Paiement"];

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn text_row(values: [&str; 5]) -> Row {
        values
            .iter()
            .map(|v| if v.is_empty() { Cell::Empty } else { Cell::text(*v) })
            .collect()
    }

    fn table(rows: Vec<Row>) -> Table {
        Table::from_rows(HEADER.iter().map(|h| h.to_string()).collect(), rows)
    }

    fn clean(rows: Vec<Row>) -> CleanOutcome {
        RowCleaner::with_reference_time(now()).clean(table(rows))
    }

    #[test]
    fn test_negative_amount_row_dropped_at_amount_stage() {
        let outcome = clean(vec![
            text_row(["A", "10,50€", "2024-01-01", "books", "card"]),
            text_row(["A", "-5", "2024-01-02", "books", "card"]),
        ]);

        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.report.invalid_amounts, 1);
        assert_eq!(outcome.report.removed_rows, 1);

        let txs = transactions_from_table(&outcome.table);
        assert_eq!(txs[0].client_id.as_deref(), Some("A"));
        assert_eq!(txs[0].amount, Some(10.50));
        assert_eq!(txs[0].category.as_deref(), Some("Books"));
        assert_eq!(txs[0].payment_method.as_deref(), Some("Card"));
    }

    #[test]
    fn test_empty_rows_and_duplicates() {
        let outcome = clean(vec![
            text_row(["", "", "", "", ""]),
            text_row(["A", "5", "2024-01-01", "x", "y"]),
            text_row(["A", "5", "2024-01-01", "x", "y"]),
        ]);
        assert_eq!(outcome.report.empty_rows, 1);
        assert_eq!(outcome.report.duplicates, 1);
        assert_eq!(outcome.report.final_rows, 1);
    }

    #[test]
    fn test_near_duplicates_differing_in_format_are_kept() {
        let outcome = clean(vec![
            text_row(["A", "10,50€", "2024-01-01", "x", "y"]),
            text_row(["A", "10.50", "2024-01-01", "x", "y"]),
        ]);
        assert_eq!(outcome.report.duplicates, 0);
        assert_eq!(outcome.table.len(), 2);
    }

    #[test]
    fn test_client_id_rules() {
        let outcome = clean(vec![
            text_row(["  C7 ", "5", "2024-01-01", "x", "y"]),
            text_row(["nan", "5", "2024-01-02", "x", "y"]),
            text_row(["   ", "5", "2024-01-03", "x", "y"]),
            text_row(["", "5", "2024-01-04", "x", "y"]),
        ]);
        assert_eq!(outcome.report.invalid_client_ids, 3);
        assert_eq!(outcome.table.rows[0][0], Cell::text("C7"));
    }

    #[test]
    fn test_numeric_client_id_has_no_decimal_suffix() {
        let mut row = text_row(["", "5", "2024-01-01", "x", "y"]);
        row[0] = Cell::Number(1001.0);
        let outcome = clean(vec![row]);
        assert_eq!(outcome.table.rows[0][0], Cell::text("1001"));
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!(parse_amount(&Cell::text("1 234,56 €")), Some(1234.56));
        assert_eq!(parse_amount(&Cell::text("12.5")), Some(12.5));
        assert_eq!(parse_amount(&Cell::Number(3.0)), Some(3.0));
        assert_eq!(parse_amount(&Cell::text("abc")), None);
        assert_eq!(parse_amount(&Cell::text("NaN")), None);
        assert_eq!(parse_amount(&Cell::Empty), None);
        assert_eq!(round_cents(10.456), 10.46);
    }

    #[test]
    fn test_amount_stage_zero_unparseable_and_rounding() {
        let outcome = clean(vec![
            text_row(["A", "0", "2024-01-01", "x", "y"]),
            text_row(["B", "n/a", "2024-01-01", "x", "y"]),
            text_row(["C", "19.999", "2024-01-01", "x", "y"]),
        ]);
        assert_eq!(outcome.report.invalid_amounts, 2);
        assert_eq!(outcome.table.rows[0][1], Cell::Number(20.0));
    }

    #[test]
    fn test_amount_rounding_to_zero_is_rejected() {
        let outcome = clean(vec![
            text_row(["A", "0,004", "2024-01-01", "x", "y"]),
            text_row(["B", "0,006", "2024-01-01", "x", "y"]),
        ]);
        assert_eq!(outcome.report.invalid_amounts, 1);
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.rows[0][1], Cell::Number(0.01));
    }

    #[test]
    fn test_spreadsheet_date_cell_is_kept() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let mut row = text_row(["A", "5", "", "x", "y"]);
        row[2] = Cell::DateTime(dt);
        let outcome = clean(vec![row]);

        assert_eq!(outcome.report.date_rejections(), 0);
        let txs = transactions_from_table(&outcome.table);
        assert_eq!(txs[0].date, Some(dt.date()));
        assert_eq!(outcome.table.rows[0][8], Cell::text("Friday"));
    }

    #[test]
    fn test_date_parsing_variants() {
        let jan5 = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(parse_date(&Cell::text("2024-01-05")).map(|d| d.date()), Some(jan5));
        assert_eq!(parse_date(&Cell::text("05/01/2024")).map(|d| d.date()), Some(jan5));
        assert_eq!(parse_date(&Cell::text("2024-01-05 13:45:00")).map(|d| d.date()), Some(jan5));
        assert_eq!(parse_date(&Cell::text("2024-01-05T13:45:00Z")).map(|d| d.date()), Some(jan5));
        assert_eq!(parse_date(&Cell::Number(45296.0)).map(|d| d.date()), Some(jan5));
        assert_eq!(parse_date(&Cell::text("yesterday")), None);
        assert_eq!(parse_date(&Cell::Bool(true)), None);
    }

    #[test]
    fn test_excel_serial_conversion() {
        let noon = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(to_excel_serial(noon), Some(45296.5));
        assert_eq!(from_excel_serial(45296.5), Some(noon));

        let too_early = NaiveDate::from_ymd_opt(1800, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(to_excel_serial(too_early), None);
    }

    #[test]
    fn test_invalid_and_future_dates_counted_separately() {
        let outcome = clean(vec![
            text_row(["A", "5", "not a date", "x", "y"]),
            text_row(["B", "5", "2099-01-01", "x", "y"]),
            text_row(["C", "5", "2025-06-01 12:00:00", "x", "y"]),
        ]);
        assert_eq!(outcome.report.invalid_dates, 1);
        assert_eq!(outcome.report.future_dates, 1);
        assert_eq!(outcome.report.date_rejections(), 2);
        assert_eq!(outcome.table.len(), 1);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("credit card"), "Credit Card");
        assert_eq!(title_case("E-WALLET"), "E-Wallet");
        assert_eq!(title_case("nan"), "Nan");
        assert_eq!(title_case("électronique"), "Électronique");
    }

    #[test]
    fn test_label_stages() {
        let outcome = clean(vec![
            text_row(["A", "5", "2024-01-01", "", "card"]),
            text_row(["B", "5", "2024-01-01", "NaN", "card"]),
            text_row(["C", "5", "2024-01-01", " home ", "   "]),
            text_row(["D", "5", "2024-01-01", "home", "cash"]),
        ]);
        assert_eq!(outcome.report.invalid_categories, 2);
        assert_eq!(outcome.report.invalid_payment_methods, 1);
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.rows[0][3], Cell::text("Home"));
    }

    #[test]
    fn test_first_failing_stage_claims_the_row() {
        // Invalid client id, amount and date all at once: only the client stage counts it
        let outcome = clean(vec![text_row(["", "-1", "garbage", "x", "y"])]);
        assert_eq!(outcome.report.invalid_client_ids, 1);
        assert_eq!(outcome.report.invalid_amounts, 0);
        assert_eq!(outcome.report.invalid_dates, 0);
    }

    #[test]
    fn test_missing_columns_count_zero() {
        let t = Table::from_rows(
            vec!["ID_Client".to_string(), "Notes".to_string()],
            vec![vec![Cell::text("A"), Cell::text("hello")]],
        );
        let outcome = RowCleaner::with_reference_time(now()).clean(t);
        assert_eq!(outcome.report.invalid_amounts, 0);
        assert_eq!(outcome.report.date_rejections(), 0);
        assert_eq!(outcome.report.invalid_categories, 0);
        assert_eq!(outcome.table.columns, vec!["ID_Client", "Notes"]);
    }

    #[test]
    fn test_calendar_columns_added() {
        let outcome = clean(vec![text_row(["A", "5", "2024-01-01", "x", "y"])]);
        assert_eq!(outcome.table.width(), 9);
        assert_eq!(outcome.table.rows[0][8], Cell::text("Monday"));
    }

    #[test]
    fn test_every_clean_row_satisfies_invariants() {
        let outcome = clean(vec![
            text_row(["A", "10", "2024-01-01", "a", "b"]),
            text_row(["", "10", "2024-01-01", "a", "b"]),
            text_row(["B", "-3", "2024-01-01", "a", "b"]),
            text_row(["C", "7,25", "01/02/2024", "a", "b"]),
            text_row(["D", "7", "2031-01-01", "a", "b"]),
            text_row(["E", "7", "2024-03-03", "", "b"]),
            text_row(["F", "8", "2024-03-03", "c", "nan"]),
        ]);

        for tx in transactions_from_table(&outcome.table) {
            assert!(tx.client_id.as_deref().map_or(false, |c| !c.is_empty()));
            assert!(tx.amount.map_or(false, |a| a > 0.0));
            assert!(tx.date.map_or(false, |d| d <= now().date()));
            assert!(tx.category.as_deref().map_or(false, |c| !c.is_empty() && c != "Nan"));
            assert!(tx.payment_method.as_deref().map_or(false, |p| !p.is_empty() && p != "Nan"));
        }
        assert_eq!(outcome.table.len(), 2);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let first = clean(vec![
            text_row(["A", "10,50€", "2024-01-01", "books", "card"]),
            text_row(["B", "3", "15/03/2024", "toys", "cash"]),
            text_row(["B", "-3", "15/03/2024", "toys", "cash"]),
            text_row(["C", "0,004", "16/03/2024", "toys", "cash"]),
        ]);
        assert_eq!(first.report.invalid_amounts, 2);
        let second = RowCleaner::with_reference_time(now()).clean(first.table.clone());

        assert_eq!(second.report.removed_rows, 0);
        assert_eq!(second.table, first.table);
    }

    #[test]
    fn test_loss_percentage() {
        let report = CleaningReport::new(4)
            .with_removed(CleaningStage::Duplicates, 1)
            .finish(3);
        assert_eq!(report.loss_percentage, 25.0);
        assert_eq!(CleaningReport::new(0).finish(0).loss_percentage, 0.0);
        assert!(report.summary().contains("25.00%"));
    }
}
