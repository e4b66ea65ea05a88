// 📊 KPI Aggregator
// Pure functions from a slice of transactions to business indicators.
// Degenerate inputs (empty slice, filter matching nothing) give zeros and `None`, never errors.

use crate::transaction::Transaction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// KPI SET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub total: f64,
    /// Percent of the summed category totals
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentShare {
    pub method: String,
    pub count: usize,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCategory {
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientValue {
    pub client_id: String,
    pub transactions: usize,
    pub lifetime_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClvStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiSet {
    pub nb_transactions: usize,
    pub nb_clients: usize,
    pub total_amount: f64,
    pub mean_amount: f64,
    /// First-seen order
    pub category_totals: Vec<CategoryShare>,
    pub top_category: Option<TopCategory>,
    pub recurring_clients: usize,
    pub recurrence_rate: f64,
    /// Most used first
    pub payment_methods: Vec<PaymentShare>,
    pub client_values: Vec<ClientValue>,
    pub clv: ClvStats,
}

impl KpiSet {
    pub fn is_empty(&self) -> bool {
        self.nb_transactions == 0
    }
}

/// Insertion-ordered grouping
struct OrderedGroups<V> {
    index: HashMap<String, usize>,
    groups: Vec<(String, V)>,
}

impl<V: Default> OrderedGroups<V> {
    fn new() -> Self {
        OrderedGroups {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn entry(&mut self, key: &str) -> &mut V {
        let pos = match self.index.get(key) {
            Some(&pos) => pos,
            None => {
                self.groups.push((key.to_string(), V::default()));
                self.index.insert(key.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[pos].1
    }

    fn into_vec(self) -> Vec<(String, V)> {
        self.groups
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Median of the values; 0 when there are none
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn clv_stats(values: &[f64]) -> ClvStats {
    if values.is_empty() {
        return ClvStats::default();
    }
    ClvStats {
        mean: mean(values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        median: median(values),
    }
}

/// Compute the full KPI set. Transactions lacking a field are skipped by the
/// indicators that need it.
pub fn compute_kpis(transactions: &[Transaction]) -> KpiSet {
    let amounts: Vec<f64> = transactions.iter().filter_map(|t| t.amount).collect();
    let total_amount: f64 = amounts.iter().sum();

    // Categories
    let mut categories: OrderedGroups<f64> = OrderedGroups::new();
    for tx in transactions {
        if let Some(category) = &tx.category {
            *categories.entry(category) += tx.amount_or_zero();
        }
    }
    let categories = categories.into_vec();
    let category_sum: f64 = categories.iter().map(|(_, total)| total).sum();

    let mut top_category: Option<TopCategory> = None;
    for (name, total) in &categories {
        if top_category.as_ref().map_or(true, |top| *total > top.total) {
            top_category = Some(TopCategory {
                name: name.clone(),
                total: *total,
            });
        }
    }

    let category_totals = categories
        .into_iter()
        .map(|(category, total)| CategoryShare {
            share: percent(total, category_sum),
            category,
            total,
        })
        .collect();

    // Clients
    let mut clients: OrderedGroups<(usize, f64)> = OrderedGroups::new();
    for tx in transactions {
        if let Some(client) = &tx.client_id {
            let entry = clients.entry(client);
            entry.0 += 1;
            entry.1 += tx.amount_or_zero();
        }
    }
    let client_values: Vec<ClientValue> = clients
        .into_vec()
        .into_iter()
        .map(|(client_id, (transactions, lifetime_value))| ClientValue {
            client_id,
            transactions,
            lifetime_value,
        })
        .collect();

    let recurring_clients = client_values.iter().filter(|c| c.transactions > 1).count();
    let lifetime_values: Vec<f64> = client_values.iter().map(|c| c.lifetime_value).collect();

    KpiSet {
        nb_transactions: transactions.len(),
        nb_clients: client_values.len(),
        total_amount,
        mean_amount: mean(&amounts),
        category_totals,
        top_category,
        recurring_clients,
        recurrence_rate: percent(recurring_clients as f64, client_values.len() as f64),
        payment_methods: payment_shares(transactions),
        clv: clv_stats(&lifetime_values),
        client_values,
    }
}

fn payment_shares(transactions: &[Transaction]) -> Vec<PaymentShare> {
    payment_groups(transactions)
        .into_iter()
        .map(|(method, agg)| PaymentShare {
            method,
            count: agg.count,
            share: agg.share,
        })
        .collect()
}

// ============================================================================
// FILTERS
// ============================================================================

pub const ALL_CATEGORIES: &str = "ALL";

/// Date range (inclusive) and category filter applied before recomputing KPIs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// `None` or "ALL" keeps every category
    pub category: Option<String>,
}

impl KpiFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .filter(|c| !c.eq_ignore_ascii_case(ALL_CATEGORIES))
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.start.is_some() || self.end.is_some() {
            let Some(date) = tx.date else {
                return false;
            };
            if self.start.map_or(false, |start| date < start) {
                return false;
            }
            if self.end.map_or(false, |end| date > end) {
                return false;
            }
        }

        match self.category_filter() {
            Some(wanted) => tx.category.as_deref() == Some(wanted),
            None => true,
        }
    }

    /// Filtered copy, input order kept
    pub fn apply(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        transactions
            .iter()
            .filter(|tx| self.matches(tx))
            .cloned()
            .collect()
    }
}

// ============================================================================
// BREAKDOWNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub total: f64,
    pub mean: f64,
    pub count: usize,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentBreakdown {
    pub method: String,
    pub count: usize,
    pub share: f64,
    pub total: f64,
}

/// Amount summed per day, oldest first
pub fn daily_totals(transactions: &[Transaction]) -> Vec<DailyTotal> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for tx in transactions {
        if let Some(date) = tx.date {
            *days.entry(date).or_insert(0.0) += tx.amount_or_zero();
        }
    }
    days.into_iter()
        .map(|(date, total)| DailyTotal { date, total })
        .collect()
}

pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryBreakdown> {
    let mut groups: OrderedGroups<(usize, f64)> = OrderedGroups::new();
    for tx in transactions {
        if let Some(category) = &tx.category {
            let entry = groups.entry(category);
            entry.0 += 1;
            entry.1 += tx.amount_or_zero();
        }
    }
    let groups = groups.into_vec();
    let grand_total: f64 = groups.iter().map(|(_, (_, total))| total).sum();

    groups
        .into_iter()
        .map(|(category, (count, total))| CategoryBreakdown {
            category,
            total,
            mean: total / count as f64,
            count,
            share: percent(total, grand_total),
        })
        .collect()
}

#[derive(Default)]
struct PaymentAgg {
    count: usize,
    total: f64,
    share: f64,
}

/// Grouped by method, sorted by count descending; ties keep first-seen order
fn payment_groups(transactions: &[Transaction]) -> Vec<(String, PaymentAgg)> {
    let mut groups: OrderedGroups<PaymentAgg> = OrderedGroups::new();
    for tx in transactions {
        if let Some(method) = &tx.payment_method {
            let entry = groups.entry(method);
            entry.count += 1;
            entry.total += tx.amount_or_zero();
        }
    }
    let mut groups = groups.into_vec();
    let counted: usize = groups.iter().map(|(_, agg)| agg.count).sum();
    for (_, agg) in groups.iter_mut() {
        agg.share = percent(agg.count as f64, counted as f64);
    }
    groups.sort_by(|a, b| b.1.count.cmp(&a.1.count));
    groups
}

pub fn payment_breakdown(transactions: &[Transaction]) -> Vec<PaymentBreakdown> {
    payment_groups(transactions)
        .into_iter()
        .map(|(method, agg)| PaymentBreakdown {
            method,
            count: agg.count,
            share: agg.share,
            total: agg.total,
        })
        .collect()
}

/// The `n` most recent transactions, newest first. Undated ones come last.
pub fn latest_transactions(transactions: &[Transaction], n: usize) -> Vec<Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted.into_iter().take(n).cloned().collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(client: &str, amount: f64, day: u32, category: &str, payment: &str) -> Transaction {
        Transaction::new(client, amount, ymd(2024, 1, day), category, payment)
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("X", 10.0, 1, "Books", "Card"),
            tx("X", 30.0, 2, "Toys", "Cash"),
            tx("Y", 20.0, 3, "Books", "Card"),
        ]
    }

    #[test]
    fn test_recurrence_two_clients_one_recurring() {
        let kpis = compute_kpis(&sample());
        assert_eq!(kpis.nb_transactions, 3);
        assert_eq!(kpis.nb_clients, 2);
        assert_eq!(kpis.recurring_clients, 1);
        assert_eq!(kpis.recurrence_rate, 50.0);
    }

    #[test]
    fn test_recurrence_bounds() {
        let single = vec![tx("A", 1.0, 1, "B", "C"), tx("B", 1.0, 1, "B", "C")];
        assert_eq!(compute_kpis(&single).recurrence_rate, 0.0);

        let repeat = vec![
            tx("A", 1.0, 1, "B", "C"),
            tx("A", 1.0, 2, "B", "C"),
            tx("B", 1.0, 1, "B", "C"),
            tx("B", 1.0, 3, "B", "C"),
        ];
        assert_eq!(compute_kpis(&repeat).recurrence_rate, 100.0);
    }

    #[test]
    fn test_amount_and_category_kpis() {
        let kpis = compute_kpis(&sample());
        assert_eq!(kpis.total_amount, 60.0);
        assert_eq!(kpis.mean_amount, 20.0);

        let books = &kpis.category_totals[0];
        assert_eq!(books.category, "Books");
        assert_eq!(books.total, 30.0);
        assert_eq!(books.share, 50.0);

        let share_sum: f64 = kpis.category_totals.iter().map(|c| c.share).sum();
        assert!((share_sum - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_top_category_tie_goes_to_first_seen() {
        let kpis = compute_kpis(&sample());
        let top = kpis.top_category.unwrap();
        assert_eq!(top.name, "Books");
        assert_eq!(top.total, 30.0);
    }

    #[test]
    fn test_payment_shares_sorted_by_count() {
        let kpis = compute_kpis(&sample());
        assert_eq!(kpis.payment_methods[0].method, "Card");
        assert_eq!(kpis.payment_methods[0].count, 2);
        let share_sum: f64 = kpis.payment_methods.iter().map(|p| p.share).sum();
        assert!((share_sum - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_clv_stats() {
        let kpis = compute_kpis(&sample());
        assert_eq!(kpis.client_values[0].lifetime_value, 40.0);
        assert_eq!(kpis.clv.mean, 30.0);
        assert_eq!(kpis.clv.min, 20.0);
        assert_eq!(kpis.clv.max, 40.0);
        assert_eq!(kpis.clv.median, 30.0);
    }

    #[test]
    fn test_empty_input_is_zeroed() {
        let kpis = compute_kpis(&[]);
        assert!(kpis.is_empty());
        assert_eq!(kpis.nb_clients, 0);
        assert_eq!(kpis.mean_amount, 0.0);
        assert_eq!(kpis.recurrence_rate, 0.0);
        assert!(kpis.top_category.is_none());
        assert!(kpis.category_totals.is_empty());
        assert_eq!(kpis.clv, ClvStats::default());
    }

    #[test]
    fn test_filter_to_empty_range_gives_zeroed_kpis() {
        let filter = KpiFilter::new().with_range(Some(ymd(2030, 1, 1)), Some(ymd(2030, 12, 31)));
        let kpis = compute_kpis(&filter.apply(&sample()));
        assert_eq!(kpis.nb_transactions, 0);
        assert_eq!(kpis.recurrence_rate, 0.0);
    }

    #[test]
    fn test_filter_range_is_inclusive() {
        let filter = KpiFilter::new().with_range(Some(ymd(2024, 1, 2)), Some(ymd(2024, 1, 3)));
        let filtered = filter.apply(&sample());
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_filter_category() {
        let books = KpiFilter::new().with_category("Books").apply(&sample());
        assert_eq!(books.len(), 2);

        let all = KpiFilter::new().with_category("ALL").apply(&sample());
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_undated_rows_never_match_a_range() {
        let mut undated = tx("Z", 5.0, 1, "Books", "Card");
        undated.date = None;
        let filter = KpiFilter::new().with_range(Some(ymd(2000, 1, 1)), None);
        assert!(!filter.matches(&undated));
        assert!(KpiFilter::new().matches(&undated));
    }

    #[test]
    fn test_missing_fields_are_skipped() {
        let mut no_client = tx("X", 10.0, 1, "Books", "Card");
        no_client.client_id = None;
        no_client.payment_method = None;
        let kpis = compute_kpis(&[no_client]);
        assert_eq!(kpis.nb_transactions, 1);
        assert_eq!(kpis.nb_clients, 0);
        assert_eq!(kpis.recurrence_rate, 0.0);
        assert!(kpis.payment_methods.is_empty());
        assert_eq!(kpis.total_amount, 10.0);
    }

    #[test]
    fn test_daily_totals() {
        let mut txs = sample();
        txs.push(tx("Z", 5.0, 1, "Books", "Card"));
        let days = daily_totals(&txs);
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], DailyTotal { date: ymd(2024, 1, 1), total: 15.0 });
    }

    #[test]
    fn test_category_breakdown() {
        let breakdown = category_breakdown(&sample());
        assert_eq!(breakdown[0].category, "Books");
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[0].mean, 15.0);
        assert_eq!(breakdown[1].share, 50.0);
    }

    #[test]
    fn test_payment_breakdown() {
        let breakdown = payment_breakdown(&sample());
        assert_eq!(breakdown[0].method, "Card");
        assert_eq!(breakdown[0].total, 30.0);
        assert_eq!(breakdown[1].method, "Cash");
        assert!((breakdown[1].share - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_latest_transactions() {
        let latest = latest_transactions(&sample(), 2);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].date, Some(ymd(2024, 1, 3)));
        assert_eq!(latest[1].date, Some(ymd(2024, 1, 2)));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }
}
