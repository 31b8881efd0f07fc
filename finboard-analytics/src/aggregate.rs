//! Chart aggregations over transactions: spending by category, monthly
//! totals, per-category trends and month-over-month comparison.
//!
//! Every figure goes through one [`CurrencyNormalizer`], so totals are in a
//! single currency and rounded once, at the end.

use finboard_core::{Currency, Month, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::convert::{CurrencyNormalizer, round_display};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow<K> {
    pub key: K,
    /// Full precision total in the breakdown currency
    pub total: Decimal,
    pub count: usize,
}

/// Grouped totals in one currency. Amounts that could not be converted are
/// listed in `excluded` and are not part of any row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown<K> {
    pub currency: Currency,
    pub rows: Vec<BreakdownRow<K>>,
    pub excluded: BTreeMap<Currency, Decimal>,
}

impl<K> Breakdown<K> {
    pub fn grand_total(&self) -> Decimal {
        self.rows.iter().map(|r| r.total).sum()
    }

    /// Share of the grand total, as a percentage rounded for display.
    pub fn share(&self, row: &BreakdownRow<K>) -> Decimal {
        let grand = self.grand_total();
        if grand.is_zero() {
            return Decimal::ZERO;
        }
        round_display(row.total / grand * Decimal::ONE_HUNDRED)
    }

    pub fn is_complete(&self) -> bool {
        self.excluded.is_empty()
    }
}

fn group_by<K, F>(txns: &[Transaction], normalizer: &CurrencyNormalizer, key: F) -> Breakdown<K>
where
    K: std::hash::Hash + Eq,
    F: Fn(&Transaction) -> K,
{
    let mut groups: HashMap<K, (Decimal, usize)> = HashMap::new();
    let mut excluded: BTreeMap<Currency, Decimal> = BTreeMap::new();

    for t in txns {
        match normalizer.convert(t.amount, &t.currency) {
            Ok(v) => {
                let slot = groups.entry(key(t)).or_default();
                slot.0 += v;
                slot.1 += 1;
            }
            Err(e) => {
                tracing::debug!(transaction = %t.id, error = %e, "left out of breakdown");
                *excluded.entry(t.currency.clone()).or_default() += t.amount;
            }
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, (total, count))| BreakdownRow { key, total, count })
        .collect();

    Breakdown {
        currency: normalizer.target().clone(),
        rows,
        excluded,
    }
}

fn category_of(t: &Transaction) -> String {
    t.category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_string()
}

/// Spending per category, largest first.
pub fn spending_by_category(
    txns: &[Transaction],
    normalizer: &CurrencyNormalizer,
) -> Breakdown<String> {
    let mut b = group_by(txns, normalizer, category_of);
    b.rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
    b
}

/// Spending per calendar month, oldest first.
pub fn monthly_spending(txns: &[Transaction], normalizer: &CurrencyNormalizer) -> Breakdown<Month> {
    let mut b = group_by(txns, normalizer, |t| Month::of(t.transaction_date));
    b.rows.sort_by(|a, b| a.key.cmp(&b.key));
    b
}

/// Per-category series over consecutive months, zero-filled so every series
/// has one point per month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTrends {
    pub currency: Currency,
    pub months: Vec<Month>,
    pub series: BTreeMap<String, Vec<Decimal>>,
    pub excluded: BTreeMap<Currency, Decimal>,
}

/// Trends for the `window` months ending at `last`.
pub fn category_trends(
    txns: &[Transaction],
    normalizer: &CurrencyNormalizer,
    last: Month,
    window: usize,
) -> CategoryTrends {
    let mut months = Vec::with_capacity(window);
    let mut m = last;
    for _ in 0..window {
        months.push(m);
        m = m.previous();
    }
    months.reverse();

    let in_window: Vec<Transaction> = txns
        .iter()
        .filter(|t| months.iter().any(|m| m.contains(t.transaction_date)))
        .cloned()
        .collect();

    let grouped = group_by(&in_window, normalizer, |t| {
        (category_of(t), Month::of(t.transaction_date))
    });

    let mut series: BTreeMap<String, Vec<Decimal>> = BTreeMap::new();
    for row in grouped.rows {
        let (category, month) = row.key;
        let points = series
            .entry(category)
            .or_insert_with(|| vec![Decimal::ZERO; months.len()]);
        if let Some(idx) = months.iter().position(|m| *m == month) {
            points[idx] += row.total;
        }
    }

    CategoryTrends {
        currency: grouped.currency,
        months,
        series,
        excluded: grouped.excluded,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthComparison {
    pub currency: Currency,
    pub current_month: Month,
    pub current: Decimal,
    pub previous: Decimal,
    /// Percent change from the previous month, `None` when it had no spend.
    pub change_percent: Option<Decimal>,
}

pub fn compare_with_previous_month(
    txns: &[Transaction],
    normalizer: &CurrencyNormalizer,
    month: Month,
) -> MonthComparison {
    let prev = month.previous();
    let current = normalizer
        .total(txns.iter().filter(|t| month.contains(t.transaction_date)))
        .total;
    let previous = normalizer
        .total(txns.iter().filter(|t| prev.contains(t.transaction_date)))
        .total;

    let change_percent = (!previous.is_zero())
        .then(|| round_display((current - previous) / previous * Decimal::ONE_HUNDRED));

    MonthComparison {
        currency: normalizer.target().clone(),
        current_month: month,
        current,
        previous,
        change_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ExchangeRate;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn txn(id: &str, amount: &str, currency: Currency, category: Option<&str>, date: &str) -> Transaction {
        Transaction {
            id: id.into(),
            merchant: "m".into(),
            amount: dec(amount),
            currency,
            category: category.map(Into::into),
            transaction_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            card_id: None,
            description: None,
        }
    }

    fn usd_normalizer() -> CurrencyNormalizer {
        CurrencyNormalizer::new(Currency::USD, Some(ExchangeRate::live(dec("3.5"))))
    }

    #[test]
    fn test_by_category_sorted_desc() {
        let txns = vec![
            txn("1", "10.00", Currency::USD, Some("Food"), "2025-05-01"),
            txn("2", "70.00", Currency::PEN, Some("Transport"), "2025-05-02"),
            txn("3", "5.00", Currency::USD, Some("Food"), "2025-05-03"),
            txn("4", "1.00", Currency::USD, None, "2025-05-03"),
        ];
        let b = spending_by_category(&txns, &usd_normalizer());
        let keys: Vec<_> = b.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Transport", "Food", UNCATEGORIZED]);
        assert_eq!(b.rows[0].total, dec("20"));
        assert_eq!(b.rows[1].count, 2);
        assert_eq!(b.grand_total(), dec("36"));
        assert_eq!(b.share(&b.rows[0]), dec("55.56"));
    }

    #[test]
    fn test_monthly_chronological_and_excluded() {
        let txns = vec![
            txn("1", "10.00", Currency::USD, None, "2025-06-10"),
            txn("2", "20.00", Currency::USD, None, "2025-04-10"),
            txn("3", "9.00", Currency::EUR, None, "2025-04-11"),
        ];
        let b = monthly_spending(&txns, &usd_normalizer());
        let months: Vec<_> = b.rows.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(months, vec!["2025-04", "2025-06"]);
        assert_eq!(b.excluded.get(&Currency::EUR), Some(&dec("9.00")));
        assert!(!b.is_complete());
    }

    #[test]
    fn test_trends_zero_fill() {
        let txns = vec![
            txn("1", "10.00", Currency::USD, Some("Food"), "2025-01-10"),
            txn("2", "35.00", Currency::PEN, Some("Food"), "2025-03-10"),
            txn("3", "4.00", Currency::USD, Some("Fun"), "2025-03-11"),
            txn("4", "99.00", Currency::USD, Some("Food"), "2024-10-01"),
        ];
        let last = Month::new(2025, 3).unwrap();
        let t = category_trends(&txns, &usd_normalizer(), last, 3);
        assert_eq!(t.months.len(), 3);
        assert_eq!(t.months[0].to_string(), "2025-01");
        assert_eq!(t.series["Food"], vec![dec("10"), dec("0"), dec("10")]);
        assert_eq!(t.series["Fun"], vec![dec("0"), dec("0"), dec("4")]);
    }

    #[test]
    fn test_month_comparison() {
        let txns = vec![
            txn("1", "100.00", Currency::USD, None, "2025-02-10"),
            txn("2", "150.00", Currency::USD, None, "2025-03-10"),
        ];
        let c = compare_with_previous_month(&txns, &usd_normalizer(), Month::new(2025, 3).unwrap());
        assert_eq!(c.change_percent, Some(dec("50.00")));

        let c = compare_with_previous_month(&txns, &usd_normalizer(), Month::new(2025, 2).unwrap());
        assert_eq!(c.change_percent, None);
    }
}
