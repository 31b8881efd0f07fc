//! Currency normalization for aggregated views.
//!
//! Rounding policy: amounts are converted and summed at full `Decimal`
//! precision, and only the final figure is rounded to cents for display.
//! Converted amounts are display values and are never sent back to the API.

use finboard_core::{Currency, Income, RecurringService, Transaction};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// PEN per USD used when the live rate cannot be fetched.
pub const FALLBACK_PEN_PER_USD: Decimal = Decimal::from_parts(350, 0, 0, false, 2);

/// PEN-per-USD rate as served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub rate: Decimal,
    #[serde(default)]
    pub using_fixed_fallback: bool,
}

impl ExchangeRate {
    pub fn live(rate: Decimal) -> Self {
        Self {
            rate,
            using_fixed_fallback: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            rate: FALLBACK_PEN_PER_USD,
            using_fixed_fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("no exchange rate available to convert {from} to {to}")]
    RateUnavailable { from: Currency, to: Currency },
    #[error("cannot convert {from} to {to}: only USD/PEN rates are known")]
    UnsupportedPair { from: Currency, to: Currency },
    #[error("exchange rate must be positive, got {0}")]
    InvalidRate(Decimal),
}

/// Round a figure to cents for presentation. Midpoints round away from zero.
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert `amount` from one currency to another.
///
/// Same-currency conversion never needs a rate. USD/PEN in either direction
/// needs one, and its absence is an error rather than a silent pass-through.
pub fn convert(
    amount: Decimal,
    from: &Currency,
    to: &Currency,
    rate: Option<&ExchangeRate>,
) -> Result<Decimal, ConversionError> {
    if from == to {
        return Ok(amount);
    }

    let pair_known = (*from == Currency::USD && *to == Currency::PEN)
        || (*from == Currency::PEN && *to == Currency::USD);
    if !pair_known {
        return Err(ConversionError::UnsupportedPair {
            from: from.clone(),
            to: to.clone(),
        });
    }

    let rate = rate.ok_or_else(|| ConversionError::RateUnavailable {
        from: from.clone(),
        to: to.clone(),
    })?;
    if rate.rate <= Decimal::ZERO {
        return Err(ConversionError::InvalidRate(rate.rate));
    }

    if *from == Currency::USD {
        Ok(amount * rate.rate)
    } else {
        Ok(amount / rate.rate)
    }
}

/// Anything carrying an amount in a currency.
pub trait Monetary {
    fn amount(&self) -> Decimal;
    fn currency(&self) -> &Currency;
}

impl Monetary for Transaction {
    fn amount(&self) -> Decimal {
        self.amount
    }
    fn currency(&self) -> &Currency {
        &self.currency
    }
}

impl Monetary for Income {
    fn amount(&self) -> Decimal {
        self.amount
    }
    fn currency(&self) -> &Currency {
        &self.currency
    }
}

impl Monetary for RecurringService {
    fn amount(&self) -> Decimal {
        self.amount
    }
    fn currency(&self) -> &Currency {
        &self.currency
    }
}

impl Monetary for (Decimal, Currency) {
    fn amount(&self) -> Decimal {
        self.0
    }
    fn currency(&self) -> &Currency {
        &self.1
    }
}

/// Sum of convertible amounts, plus whatever could not be converted, kept
/// apart per source currency instead of being mixed into the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTotal {
    pub currency: Currency,
    /// Full precision; use [`NormalizedTotal::display_total`] for output.
    pub total: Decimal,
    pub item_count: usize,
    pub excluded: BTreeMap<Currency, Decimal>,
}

impl NormalizedTotal {
    pub fn empty(currency: Currency) -> Self {
        Self {
            currency,
            total: Decimal::ZERO,
            item_count: 0,
            excluded: BTreeMap::new(),
        }
    }

    pub fn display_total(&self) -> Decimal {
        round_display(self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.excluded.is_empty()
    }

    pub(crate) fn exclude(&mut self, currency: &Currency, amount: Decimal) {
        *self.excluded.entry(currency.clone()).or_default() += amount;
    }
}

/// Converts into one display currency with an optional rate.
#[derive(Debug, Clone)]
pub struct CurrencyNormalizer {
    target: Currency,
    rate: Option<ExchangeRate>,
}

impl CurrencyNormalizer {
    pub fn new(target: Currency, rate: Option<ExchangeRate>) -> Self {
        Self { target, rate }
    }

    pub fn target(&self) -> &Currency {
        &self.target
    }

    pub fn rate(&self) -> Option<&ExchangeRate> {
        self.rate.as_ref()
    }

    pub fn uses_fallback_rate(&self) -> bool {
        self.rate.is_some_and(|r| r.using_fixed_fallback)
    }

    pub fn convert(&self, amount: Decimal, from: &Currency) -> Result<Decimal, ConversionError> {
        convert(amount, from, &self.target, self.rate.as_ref())
    }

    pub fn total<'a, M, I>(&self, items: I) -> NormalizedTotal
    where
        M: Monetary + 'a,
        I: IntoIterator<Item = &'a M>,
    {
        let mut out = NormalizedTotal::empty(self.target.clone());
        for item in items {
            match self.convert(item.amount(), item.currency()) {
                Ok(v) => {
                    out.total += v;
                    out.item_count += 1;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "excluding amount from total");
                    out.exclude(item.currency(), item.amount());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_mixed_currency_total_rounds_once() {
        let items = vec![
            (dec("100.00"), Currency::USD),
            (dec("200.00"), Currency::PEN),
        ];
        let n = CurrencyNormalizer::new(Currency::USD, Some(ExchangeRate::live(dec("3.5"))));
        let total = n.total(&items);
        assert_eq!(total.display_total(), dec("157.14"));
        assert!(total.is_complete());
        assert_eq!(total.item_count, 2);
    }

    #[test]
    fn test_sum_then_round_beats_round_then_sum() {
        let items: Vec<_> = (0..3).map(|_| (dec("1.00"), Currency::PEN)).collect();
        let n = CurrencyNormalizer::new(Currency::USD, Some(ExchangeRate::live(dec("3"))));

        let per_item: Decimal = items
            .iter()
            .map(|(a, c)| round_display(n.convert(*a, c).unwrap()))
            .sum();
        assert_eq!(per_item, dec("0.99"));
        assert_eq!(n.total(&items).display_total(), dec("1.00"));
    }

    #[test]
    fn test_usd_to_pen_multiplies() {
        let r = ExchangeRate::live(dec("3.75"));
        let v = convert(dec("10"), &Currency::USD, &Currency::PEN, Some(&r)).unwrap();
        assert_eq!(v, dec("37.50"));
    }

    #[test]
    fn test_missing_rate_is_surfaced() {
        let items = vec![
            (dec("10.00"), Currency::USD),
            (dec("35.00"), Currency::PEN),
            (dec("5.00"), Currency::PEN),
        ];
        let n = CurrencyNormalizer::new(Currency::USD, None);
        let total = n.total(&items);
        assert_eq!(total.display_total(), dec("10.00"));
        assert!(!total.is_complete());
        assert_eq!(total.excluded.get(&Currency::PEN), Some(&dec("40.00")));

        let err = n.convert(dec("1"), &Currency::PEN).unwrap_err();
        assert!(matches!(err, ConversionError::RateUnavailable { .. }));
    }

    #[test]
    fn test_same_currency_needs_no_rate() {
        let v = convert(dec("12.345"), &Currency::EUR, &Currency::EUR, None).unwrap();
        assert_eq!(v, dec("12.345"));
    }

    #[test]
    fn test_unsupported_pair() {
        let r = ExchangeRate::live(dec("3.5"));
        let err = convert(dec("1"), &Currency::EUR, &Currency::USD, Some(&r)).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedPair { .. }));
    }

    #[test]
    fn test_fallback_rate_is_flagged() {
        let fb = ExchangeRate::fallback();
        assert_eq!(fb.rate, dec("3.50"));
        let n = CurrencyNormalizer::new(Currency::PEN, Some(fb));
        assert!(n.uses_fallback_rate());
    }

    #[test]
    fn test_round_display_midpoint() {
        assert_eq!(round_display(dec("2.345")), dec("2.35"));
        assert_eq!(round_display(dec("-2.345")), dec("-2.35"));
    }
}
