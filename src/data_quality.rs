// ✅ Data Quality - profiling and dataset summary
// Raw preview of a loaded table, and descriptive statistics over clean transactions.

use crate::kpi::median;
use crate::table::Table;
use crate::transaction::Transaction;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

// ============================================================================
// TABLE PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub missing: usize,
    pub distinct: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: usize,
    pub column_profiles: Vec<ColumnProfile>,
}

impl TableProfile {
    pub fn missing_cells(&self) -> usize {
        self.column_profiles.iter().map(|c| c.missing).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows x {} columns, {} missing cells",
            self.rows,
            self.columns,
            self.missing_cells()
        )
    }
}

/// Per-column missing and distinct counts. Missing cells are not counted as a distinct value.
pub fn profile_table(table: &Table) -> TableProfile {
    let column_profiles = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut missing = 0;
            let mut distinct = HashSet::new();
            for cell in table.column(idx) {
                if cell.is_missing() {
                    missing += 1;
                } else {
                    distinct.insert(cell.identity_key());
                }
            }
            ColumnProfile {
                name: name.clone(),
                missing,
                distinct: distinct.len(),
            }
        })
        .collect();

    TableProfile {
        rows: table.len(),
        columns: table.width(),
        column_profiles,
    }
}

// ============================================================================
// DATASET SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AmountStats {
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation (n - 1); 0 below two values
    pub std_dev: f64,
}

impl AmountStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return AmountStats::default();
        }
        let n = values.len() as f64;
        let total: f64 = values.iter().sum();
        let mean = total / n;
        let std_dev = if values.len() > 1 {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        AmountStats {
            total,
            mean,
            median: median(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
    /// Percent of all transactions
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub transactions: usize,
    pub unique_clients: usize,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub categories: usize,
    pub payment_methods: usize,
    pub amounts: AmountStats,
    pub per_category: Vec<LabelCount>,
    pub per_payment_method: Vec<LabelCount>,
}

impl DatasetSummary {
    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.period_start.zip(self.period_end)
    }
}

/// Counts by label, most frequent first; ties in first-seen order
fn label_counts<'a>(labels: impl Iterator<Item = &'a str>, total: usize) -> Vec<LabelCount> {
    let mut counts: Vec<LabelCount> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|c| c.label == label) {
            Some(existing) => existing.count += 1,
            None => counts.push(LabelCount {
                label: label.to_string(),
                count: 1,
                percentage: 0.0,
            }),
        }
    }
    for c in counts.iter_mut() {
        c.percentage = if total == 0 {
            0.0
        } else {
            c.count as f64 / total as f64 * 100.0
        };
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

pub fn summarize(transactions: &[Transaction]) -> DatasetSummary {
    let total = transactions.len();
    let clients: HashSet<&str> = transactions
        .iter()
        .filter_map(|t| t.client_id.as_deref())
        .collect();
    let dates: Vec<NaiveDate> = transactions.iter().filter_map(|t| t.date).collect();
    let amounts: Vec<f64> = transactions.iter().filter_map(|t| t.amount).collect();

    let per_category = label_counts(
        transactions.iter().filter_map(|t| t.category.as_deref()),
        total,
    );
    let per_payment_method = label_counts(
        transactions.iter().filter_map(|t| t.payment_method.as_deref()),
        total,
    );

    DatasetSummary {
        transactions: total,
        unique_clients: clients.len(),
        period_start: dates.iter().min().copied(),
        period_end: dates.iter().max().copied(),
        categories: per_category.len(),
        payment_methods: per_payment_method.len(),
        amounts: AmountStats::from_values(&amounts),
        per_category,
        per_payment_method,
    }
}

// ============================================================================
// TESTS
// ============================================================================
