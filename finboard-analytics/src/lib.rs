//! finboard-analytics: currency normalization, chart aggregation and budget
//! progress over finboard transactions.

pub mod aggregate;
pub mod budget;
pub mod convert;

pub use aggregate::{
    Breakdown, BreakdownRow, CategoryTrends, MonthComparison, category_trends,
    compare_with_previous_month, monthly_spending, spending_by_category,
};
pub use budget::{AlertLevel, BudgetProgress, all_budget_progress, budget_progress};
pub use convert::{
    ConversionError, CurrencyNormalizer, ExchangeRate, FALLBACK_PEN_PER_USD, Monetary,
    NormalizedTotal, convert, round_display,
};
