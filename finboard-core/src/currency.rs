//! ISO currency codes as they travel over the wire.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// An upper-case ISO 4217 code such as `USD` or `PEN`.
///
/// Deserialization is tolerant (trims and upper-cases whatever the backend
/// sends); `FromStr` is strict and is what user input goes through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(Cow<'static, str>);

impl Currency {
    pub const USD: Currency = Currency(Cow::Borrowed("USD"));
    pub const PEN: Currency = Currency(Cow::Borrowed("PEN"));
    pub const EUR: Currency = Currency(Cow::Borrowed("EUR"));
    pub const GBP: Currency = Currency(Cow::Borrowed("GBP"));

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        let trimmed = s.trim();
        if trimmed.len() == s.len() && !trimmed.chars().any(|c| c.is_ascii_lowercase()) {
            return Currency(Cow::Owned(s));
        }
        Currency(Cow::Owned(trimmed.to_ascii_uppercase()))
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0.into_owned()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid currency code '{0}' (expected three letters, e.g. USD)")]
pub struct InvalidCurrency(pub String);

impl FromStr for Currency {
    type Err = InvalidCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.len() != 3 || !t.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(InvalidCurrency(s.to_string()));
        }
        Ok(Currency(Cow::Owned(t.to_ascii_uppercase())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_normalizes_case() {
        let c: Currency = serde_json::from_str("\" pen \"").unwrap();
        assert_eq!(c, Currency::PEN);
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"PEN\"");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert!("US".parse::<Currency>().is_err());
        assert!("U$D".parse::<Currency>().is_err());
    }
}
