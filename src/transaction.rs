// 🧾 Canonical Transaction
// Typed view over one row of the clean table.

use crate::derived::{calendar_for, CalendarAttributes};
use crate::schema::CanonicalField;
use crate::table::{Cell, Table};
use chrono::NaiveDate;
use serde::Serialize;

/// A cleaned transaction.
///
/// A field is `None` only when its column was absent from the source
/// (see `SchemaIncomplete`). When the column exists the cleaner guarantees
/// the value is present and valid for every row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub client_id: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    #[serde(flatten)]
    pub calendar: Option<CalendarAttributes>,
}

impl Transaction {
    /// Create a transaction with every canonical field present
    pub fn new(
        client_id: impl Into<String>,
        amount: f64,
        date: NaiveDate,
        category: impl Into<String>,
        payment_method: impl Into<String>,
    ) -> Self {
        Transaction {
            client_id: Some(client_id.into()),
            amount: Some(amount),
            date: Some(date),
            category: Some(category.into()),
            payment_method: Some(payment_method.into()),
            calendar: Some(calendar_for(date)),
        }
    }

    pub fn amount_or_zero(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }
}

/// Column positions of the canonical fields in a clean table
#[derive(Debug, Clone, Copy, Default)]
struct FieldIndex {
    client_id: Option<usize>,
    amount: Option<usize>,
    date: Option<usize>,
    category: Option<usize>,
    payment_method: Option<usize>,
}

impl FieldIndex {
    fn of(table: &Table) -> Self {
        let idx = |f: CanonicalField| table.column_index(f.column_name());
        FieldIndex {
            client_id: idx(CanonicalField::ClientId),
            amount: idx(CanonicalField::Amount),
            date: idx(CanonicalField::Date),
            category: idx(CanonicalField::Category),
            payment_method: idx(CanonicalField::PaymentMethod),
        }
    }
}

fn text_at(row: &[Cell], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row[i].as_str()).map(|s| s.to_string())
}

/// Extract typed transactions from a cleaned table.
///
/// Expects the cell types the cleaner produces (text ids and labels,
/// numeric amounts, date-time dates); anything else reads as `None`.
pub fn transactions_from_table(table: &Table) -> Vec<Transaction> {
    let index = FieldIndex::of(table);

    table
        .rows
        .iter()
        .map(|row| {
            let date = index
                .date
                .and_then(|i| row[i].as_datetime())
                .map(|dt| dt.date());

            Transaction {
                client_id: text_at(row, index.client_id),
                amount: index.amount.and_then(|i| row[i].as_number()),
                date,
                category: text_at(row, index.category),
                payment_method: text_at(row, index.payment_method),
                calendar: date.map(calendar_for),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_fills_calendar() {
        let tx = Transaction::new("A", 10.5, ymd(2024, 1, 1), "Books", "Card");
        let calendar = tx.calendar.unwrap();
        assert_eq!(calendar.year, 2024);
        assert_eq!(calendar.weekday_name, "Monday");
    }

    #[test]
    fn test_extract_from_clean_table() {
        let table = Table::from_rows(
            vec![
                "ID_Client".to_string(),
                "Montant".to_string(),
                "Date".to_string(),
                "Notes".to_string(),
            ],
            vec![vec![
                Cell::text("C1"),
                Cell::Number(12.5),
                Cell::DateTime(ymd(2024, 3, 2).and_hms_opt(9, 0, 0).unwrap()),
                Cell::text("gift"),
            ]],
        );

        let txs = transactions_from_table(&table);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].client_id.as_deref(), Some("C1"));
        assert_eq!(txs[0].amount, Some(12.5));
        assert_eq!(txs[0].date, Some(ymd(2024, 3, 2)));
        assert_eq!(txs[0].category, None);
        assert_eq!(txs[0].payment_method, None);
    }

    #[test]
    fn test_serializes_flat() {
        let tx = Transaction::new("A", 10.5, ymd(2024, 1, 1), "Books", "Card");
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["client_id"], "A");
        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["weekday_name"], "Monday");
    }
}
