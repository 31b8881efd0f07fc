//! Dashboard views computed locally from the transaction list, in one
//! display currency.

use anyhow::{Context, Result};
use chrono::Utc;
use finboard_analytics::{
    CurrencyNormalizer, ExchangeRate, all_budget_progress, category_trends,
    compare_with_previous_month, round_display, spending_by_category,
};
use finboard_api::{Budgets, Queries, TransactionFilter};
use finboard_core::{Currency, Month, Transaction};
use rust_decimal::Decimal;

use crate::output::{excluded_note, money, print_total};

async fn normalizer(queries: &Queries, currency: Currency) -> CurrencyNormalizer {
    let rate = queries.exchange_rate().await;
    if rate.using_fixed_fallback {
        eprintln!(
            "note: live exchange rate unavailable, using fixed {} PEN per USD",
            rate.rate
        );
    }
    CurrencyNormalizer::new(currency, Some(rate))
}

async fn transactions_between(
    queries: &Queries,
    first: Month,
    last: Month,
) -> Result<Vec<Transaction>> {
    let (start, _) = first.date_range().context("invalid start month")?;
    let (_, end) = last.date_range().context("invalid end month")?;
    let filter = TransactionFilter {
        start_date: Some(start),
        end_date: Some(end),
        ..Default::default()
    };
    Ok(queries.transactions(&filter).await?)
}

pub fn current_month() -> Month {
    Month::of(Utc::now().date_naive())
}

pub async fn summary(queries: &Queries, currency: Currency, month: Month) -> Result<()> {
    let n = normalizer(queries, currency).await;
    let txns = transactions_between(queries, month.previous(), month).await?;

    let this_month = n.total(txns.iter().filter(|t| month.contains(t.transaction_date)));
    print_total(&format!("Spent in {month}"), &this_month);
    println!("Transactions: {}", this_month.item_count);

    let cmp = compare_with_previous_month(&txns, &n, month);
    println!("Previous month: {}", money(cmp.previous, &cmp.currency));
    match cmp.change_percent {
        Some(p) if p >= Decimal::ZERO => println!("Change: +{p}%"),
        Some(p) => println!("Change: {p}%"),
        None => println!("Change: n/a"),
    }
    Ok(())
}

pub async fn by_category(queries: &Queries, currency: Currency, month: Month) -> Result<()> {
    let n = normalizer(queries, currency).await;
    let txns = transactions_between(queries, month, month).await?;
    let breakdown = spending_by_category(&txns, &n);

    println!("Spending by category, {month}");
    for row in &breakdown.rows {
        println!(
            "  {:<22} {:>14} {:>6}%  ({} txns)",
            row.key,
            money(row.total, &breakdown.currency),
            breakdown.share(row),
            row.count
        );
    }
    println!(
        "  {:<22} {:>14}",
        "Total",
        money(breakdown.grand_total(), &breakdown.currency)
    );
    if let Some(note) = excluded_note(&breakdown.excluded) {
        println!("  {note}");
    }
    Ok(())
}

pub async fn trends(queries: &Queries, currency: Currency, last: Month, window: usize) -> Result<()> {
    let window = window.max(1);
    let mut first = last;
    for _ in 1..window {
        first = first.previous();
    }
    let n = normalizer(queries, currency).await;
    let txns = transactions_between(queries, first, last).await?;
    let trends = category_trends(&txns, &n, last, window);

    let header: Vec<String> = trends.months.iter().map(|m| format!("{m:>10}")).collect();
    println!("{:<22}{}", format!("({})", trends.currency), header.join(""));
    for (category, points) in &trends.series {
        let cells: Vec<String> = points
            .iter()
            .map(|p| format!("{:>10.2}", round_display(*p)))
            .collect();
        println!("{:<22}{}", category, cells.join(""));
    }
    if let Some(note) = excluded_note(&trends.excluded) {
        println!("{note}");
    }
    Ok(())
}

pub async fn budgets(queries: &Queries, month: Option<Month>) -> Result<()> {
    let budgets = queries.list::<Budgets>().await?;
    let budgets: Vec<_> = budgets
        .into_iter()
        .filter(|b| month.is_none_or(|m| b.month == m))
        .collect();
    if budgets.is_empty() {
        println!("No budgets");
        return Ok(());
    }

    let first = budgets.iter().map(|b| b.month).min().unwrap_or_else(current_month);
    let last = budgets.iter().map(|b| b.month).max().unwrap_or_else(current_month);
    let txns = transactions_between(queries, first, last).await?;
    let rate: ExchangeRate = queries.exchange_rate().await;

    for p in all_budget_progress(&budgets, &txns, Some(&rate)) {
        println!(
            "{} {:<20} {} of {} ({}%) [{:?}]",
            p.month,
            p.category,
            money(p.spent, &p.currency),
            money(p.limit, &p.currency),
            p.percent_used,
            p.level
        );
        if let Some(note) = excluded_note(&p.excluded) {
            println!("    {note}");
        }
    }
    Ok(())
}
