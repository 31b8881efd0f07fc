//! Terminal rendering and CSV export.

use anyhow::{Context, Result};
use finboard_analytics::{CurrencyNormalizer, NormalizedTotal, round_display};
use finboard_api::{LOGIN_ROUTE, Navigator, Notification};
use finboard_core::{Currency, Transaction};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::Write;

/// On session loss there is no page to redirect to; tell the user how to
/// log back in instead.
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: &str) {
        if route == LOGIN_ROUTE {
            eprintln!("Session expired or invalid. Run: finboard auth login");
        } else {
            eprintln!("-> {route}");
        }
    }
}

pub fn notify(n: &Notification) {
    if n.is_error() {
        eprintln!("{n}");
    } else {
        println!("{n}");
    }
}

pub fn money(amount: Decimal, currency: &Currency) -> String {
    format!("{} {:.2}", currency, round_display(amount))
}

/// Amounts left out of a total because no rate could convert them.
pub fn excluded_note(excluded: &BTreeMap<Currency, Decimal>) -> Option<String> {
    if excluded.is_empty() {
        return None;
    }
    let parts: Vec<String> = excluded.iter().map(|(c, a)| money(*a, c)).collect();
    Some(format!("not included (no exchange rate): {}", parts.join(", ")))
}

pub fn print_total(label: &str, total: &NormalizedTotal) {
    println!("{label}: {}", money(total.total, &total.currency));
    if let Some(note) = excluded_note(&total.excluded) {
        println!("  {note}");
    }
}

pub fn print_transactions(txns: &[Transaction]) {
    for t in txns {
        println!(
            "{} | {:<28} | {:>12} | {} | {}",
            t.transaction_date,
            truncate(&t.merchant, 28),
            money(t.amount, &t.currency),
            t.category.as_deref().unwrap_or("-"),
            t.id
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Write transactions as CSV. With a normalizer, an extra column carries the
/// amount in its target currency (blank when it cannot be converted).
pub fn write_transactions_csv<W: Write>(
    out: W,
    txns: &[Transaction],
    normalizer: Option<&CurrencyNormalizer>,
) -> Result<usize> {
    let mut w = csv::Writer::from_writer(out);

    let mut header = vec![
        "id".to_string(),
        "date".into(),
        "merchant".into(),
        "category".into(),
        "amount".into(),
        "currency".into(),
        "card_id".into(),
        "description".into(),
    ];
    if let Some(n) = normalizer {
        header.push(format!("amount_{}", n.target().as_str().to_lowercase()));
    }
    w.write_record(&header).context("write csv header")?;

    for t in txns {
        let mut row = vec![
            t.id.clone(),
            t.transaction_date.to_string(),
            t.merchant.clone(),
            t.category.clone().unwrap_or_default(),
            t.amount.to_string(),
            t.currency.to_string(),
            t.card_id.clone().unwrap_or_default(),
            t.description.clone().unwrap_or_default(),
        ];
        if let Some(n) = normalizer {
            row.push(
                n.convert(t.amount, &t.currency)
                    .map(|v| format!("{:.2}", round_display(v)))
                    .unwrap_or_default(),
            );
        }
        w.write_record(&row)
            .with_context(|| format!("write csv row {}", t.id))?;
    }
    w.flush().context("flush csv")?;
    Ok(txns.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finboard_analytics::ExchangeRate;
    use std::str::FromStr;

    fn txn(id: &str, merchant: &str, amount: &str, currency: Currency) -> Transaction {
        Transaction {
            id: id.into(),
            merchant: merchant.into(),
            amount: Decimal::from_str(amount).unwrap(),
            currency,
            category: Some("Food".into()),
            transaction_date: chrono::NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            card_id: None,
            description: None,
        }
    }

    #[test]
    fn test_csv_export_with_converted_column() {
        let txns = vec![
            txn("t1", "Wong, Miraflores", "35.00", Currency::PEN),
            txn("t2", "Spotify", "9.99", Currency::USD),
            txn("t3", "Fnac", "20.00", Currency::EUR),
        ];
        let rate = ExchangeRate::live(Decimal::from_str("3.5").unwrap());
        let normalizer = CurrencyNormalizer::new(Currency::USD, Some(rate));

        let mut buf = Vec::new();
        let n = write_transactions_csv(&mut buf, &txns, Some(&normalizer)).unwrap();
        assert_eq!(n, 3);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "id,date,merchant,category,amount,currency,card_id,description,amount_usd"
        );
        assert_eq!(lines[1], "t1,2025-05-03,\"Wong, Miraflores\",Food,35.00,PEN,,,10.00");
        assert_eq!(lines[2], "t2,2025-05-03,Spotify,Food,9.99,USD,,,9.99");
        assert!(lines[3].ends_with("EUR,,,"));
    }

    #[test]
    fn test_excluded_note() {
        let mut excluded = BTreeMap::new();
        assert!(excluded_note(&excluded).is_none());
        excluded.insert(Currency::EUR, Decimal::from_str("240").unwrap());
        assert_eq!(
            excluded_note(&excluded).unwrap(),
            "not included (no exchange rate): EUR 240.00"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long merchant", 6), "a ver…");
    }
}
