//! Budget progress computed on the client from the month's transactions.

use finboard_core::{Budget, Currency, Month, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::convert::{CurrencyNormalizer, ExchangeRate, round_display};

/// Percent of the limit at which a budget turns to `Warning`.
pub const WARNING_PERCENT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Ok,
    Warning,
    Exceeded,
}

impl AlertLevel {
    /// Level for an unrounded percentage.
    pub fn for_percent(percent: Decimal) -> Self {
        if percent >= Decimal::ONE_HUNDRED {
            Self::Exceeded
        } else if percent >= WARNING_PERCENT {
            Self::Warning
        } else {
            Self::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetProgress {
    pub budget_id: String,
    pub category: String,
    pub month: Month,
    pub currency: Currency,
    pub limit: Decimal,
    /// Full precision spend in the budget's currency
    pub spent: Decimal,
    pub remaining: Decimal,
    /// Rounded for display
    pub percent_used: Decimal,
    pub level: AlertLevel,
    pub excluded: BTreeMap<Currency, Decimal>,
}

impl BudgetProgress {
    pub fn is_over(&self) -> bool {
        self.spent > self.limit
    }
}

fn same_category(budget: &Budget, t: &Transaction) -> bool {
    t.category
        .as_deref()
        .is_some_and(|c| c.trim().eq_ignore_ascii_case(budget.category.trim()))
}

pub fn budget_progress(
    budget: &Budget,
    txns: &[Transaction],
    rate: Option<&ExchangeRate>,
) -> BudgetProgress {
    let normalizer = CurrencyNormalizer::new(budget.currency.clone(), rate.copied());
    let total = normalizer.total(
        txns.iter()
            .filter(|t| budget.month.contains(t.transaction_date) && same_category(budget, t)),
    );

    let percent = if budget.limit_amount.is_zero() {
        Decimal::ZERO
    } else {
        total.total / budget.limit_amount * Decimal::ONE_HUNDRED
    };

    BudgetProgress {
        budget_id: budget.id.clone(),
        category: budget.category.clone(),
        month: budget.month,
        currency: budget.currency.clone(),
        limit: budget.limit_amount,
        spent: total.total,
        remaining: budget.limit_amount - total.total,
        percent_used: round_display(percent),
        level: AlertLevel::for_percent(percent),
        excluded: total.excluded,
    }
}

/// Progress for every budget, most consumed first.
pub fn all_budget_progress(
    budgets: &[Budget],
    txns: &[Transaction],
    rate: Option<&ExchangeRate>,
) -> Vec<BudgetProgress> {
    let mut out: Vec<_> = budgets.iter().map(|b| budget_progress(b, txns, rate)).collect();
    out.sort_by(|a, b| b.percent_used.cmp(&a.percent_used));
    out
}
