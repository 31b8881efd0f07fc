use finboard_analytics::{
    AlertLevel, CurrencyNormalizer, ExchangeRate, budget_progress, category_trends,
    monthly_spending, spending_by_category,
};
use finboard_core::{Budget, Currency, Month, Transaction};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

fn fixture() -> Vec<Transaction> {
    let p = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("transactions.json");
    let raw = std::fs::read_to_string(&p).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Dashboard in USD: PEN spend converts at the live rate, EUR spend is listed
/// separately because no EUR rate exists.
#[test]
fn test_usd_dashboard_from_backend_payload() {
    let txns = fixture();
    assert_eq!(txns.len(), 7);

    let usd = CurrencyNormalizer::new(Currency::USD, Some(ExchangeRate::live(dec("3.5"))));
    let may: Vec<Transaction> = txns
        .iter()
        .filter(|t| Month::new(2025, 5).unwrap().contains(t.transaction_date))
        .cloned()
        .collect();

    let total = usd.total(&may);
    // 100 + 15.49 + (200 + 18.40 + 7.50) / 3.5 = 180.032857...
    assert_eq!(total.display_total(), dec("180.03"));
    assert_eq!(total.excluded.get(&Currency::EUR), Some(&dec("240.00")));

    let by_cat = spending_by_category(&may, &usd);
    assert_eq!(by_cat.rows[0].key, "Shopping");
    assert_eq!(by_cat.rows[1].key, "Groceries");
    assert!(by_cat.rows.iter().all(|r| r.key != "Travel"));
}

#[test]
fn test_monthly_and_trends_agree() {
    let txns = fixture();
    let pen = CurrencyNormalizer::new(Currency::PEN, Some(ExchangeRate::fallback()));
    assert!(pen.uses_fallback_rate());

    let monthly = monthly_spending(&txns, &pen);
    let trends = category_trends(&txns, &pen, Month::new(2025, 5).unwrap(), 2);

    for (i, month) in trends.months.iter().enumerate() {
        let from_series: Decimal = trends.series.values().map(|s| s[i]).sum();
        let from_monthly = monthly
            .rows
            .iter()
            .find(|r| r.key == *month)
            .map(|r| r.total)
            .unwrap_or_default();
        assert_eq!(from_series, from_monthly, "month {month}");
    }
}

#[test]
fn test_groceries_budget_in_pen() {
    let txns = fixture();
    let budget = Budget {
        id: "b-1".into(),
        category: "groceries".into(),
        limit_amount: dec("250.00"),
        month: Month::new(2025, 5).unwrap(),
        currency: Currency::PEN,
    };
    let p = budget_progress(&budget, &txns, None);
    assert_eq!(p.spent, dec("200.00"));
    assert_eq!(p.percent_used, dec("80.00"));
    assert_eq!(p.level, AlertLevel::Warning);
}
