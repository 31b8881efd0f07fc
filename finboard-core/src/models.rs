//! Entities served by the finance backend, consumed as-is.
//!
//! Money is `Decimal` end to end. The backend sends amounts as decimal
//! strings and they are serialized back the same way, so nothing the client
//! writes has been through a float.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::month::Month;

/// A card or account transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub merchant: String,
    /// Charge amount in `currency`
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(with = "date_prefix")]
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: String,
    pub card_name: String,
    #[serde(default)]
    pub bank_provider_id: Option<String>,
    #[serde(default)]
    pub network_provider_id: Option<String>,
    #[serde(default)]
    pub card_type_id: Option<String>,
    #[serde(default)]
    pub last_four_digits: Option<String>,
    #[serde(default)]
    pub credit_limit: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Income {
    pub id: String,
    pub source: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(with = "date_prefix")]
    pub income_date: NaiveDate,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Monthly spending ceiling for one category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: String,
    pub category: String,
    pub limit_amount: Decimal,
    pub month: Month,
    pub currency: Currency,
}

/// Backend-computed alert for a budget approaching or past its limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetAlert {
    #[serde(default)]
    pub budget_id: Option<String>,
    pub category: String,
    pub limit_amount: Decimal,
    pub spent_amount: Decimal,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BillingFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// A subscription or other recurring charge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringService {
    pub id: String,
    pub name: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub billing_day: Option<u32>,
    #[serde(default)]
    pub frequency: Option<BillingFrequency>,
    #[serde(default)]
    pub next_due_date: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Keyword rule the backend uses when categorizing statement lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Keyword {
    pub id: String,
    pub keyword: String,
    pub category_id: String,
    #[serde(default)]
    pub category_name: Option<String>,
}

/// Lookup row shared by bank providers, network providers and card types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Dates arrive either as `YYYY-MM-DD` or as a full timestamp; only the date
/// part is kept. Serialization always writes `YYYY-MM-DD`.
pub mod date_prefix {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        let head = raw.get(..10).unwrap_or(&raw);
        NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_transaction_keeps_decimal_string() {
        let json = r#"{
            "id": "t-1",
            "merchant": "Tottus",
            "amount": "200.10",
            "currency": "pen",
            "category": "Groceries",
            "transaction_date": "2025-04-02T13:45:00",
            "card_id": "c-9",
            "description": null
        }"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.amount, Decimal::from_str("200.10").unwrap());
        assert_eq!(t.currency, Currency::PEN);
        assert_eq!(t.transaction_date, NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());

        let back = serde_json::to_value(&t).unwrap();
        assert_eq!(back["amount"], "200.10");
        assert_eq!(back["transaction_date"], "2025-04-02");
    }

    #[test]
    fn test_budget_month_from_date() {
        let json = r#"{"id":"b1","category":"Food","limit_amount":"500","month":"2025-06-01","currency":"USD"}"#;
        let b: Budget = serde_json::from_str(json).unwrap();
        assert_eq!(b.month.to_string(), "2025-06");
    }

    #[test]
    fn test_card_defaults() {
        let c: Card = serde_json::from_str(r#"{"id":"c1","card_name":"Visa Oro"}"#).unwrap();
        assert!(c.is_active);
        assert!(c.credit_limit.is_none());
    }
}
