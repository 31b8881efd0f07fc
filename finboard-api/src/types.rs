//! Request and response payloads that only exist on the wire.

use chrono::NaiveDate;
use finboard_core::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Filters for the transaction list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub card_id: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        if let Some(v) = self.skip {
            q.push(("skip".to_string(), v.to_string()));
        }
        if let Some(v) = self.limit {
            q.push(("limit".to_string(), v.to_string()));
        }
        if let Some(v) = &self.card_id {
            q.push(("card_id".to_string(), v.clone()));
        }
        if let Some(v) = &self.category {
            q.push(("category".to_string(), v.clone()));
        }
        if let Some(v) = self.start_date {
            q.push(("start_date".to_string(), v.to_string()));
        }
        if let Some(v) = self.end_date {
            q.push(("end_date".to_string(), v.to_string()));
        }
        q
    }

    /// Stable cache-key segment for this filter.
    pub fn cache_tag(&self) -> String {
        let parts: Vec<String> = self
            .to_query()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join("&")
        }
    }
}

/// Date range and display currency for analytics endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub currency: Option<Currency>,
}

impl AnalyticsQuery {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        if let Some(v) = self.start_date {
            q.push(("start_date".to_string(), v.to_string()));
        }
        if let Some(v) = self.end_date {
            q.push(("end_date".to_string(), v.to_string()));
        }
        if let Some(v) = &self.currency {
            q.push(("currency".to_string(), v.to_string()));
        }
        q
    }

    pub fn cache_tag(&self) -> String {
        let parts: Vec<String> = self
            .to_query()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if parts.is_empty() { "all".to_string() } else { parts.join("&") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSummary {
    #[serde(default)]
    pub total_spent: Decimal,
    #[serde(default)]
    pub total_income: Decimal,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySpending {
    pub category: String,
    #[serde(alias = "amount")]
    pub total: Decimal,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    #[serde(alias = "month")]
    pub period: String,
    #[serde(alias = "amount")]
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodComparison {
    pub current_period: Decimal,
    pub previous_period: Decimal,
    #[serde(default)]
    pub change_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub title: String,
    #[serde(alias = "description")]
    pub message: String,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Optional form fields sent alongside a statement upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub card_id: Option<String>,
    pub bank: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_and_tag() {
        let f = TransactionFilter {
            limit: Some(50),
            category: Some("Food".into()),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..Default::default()
        };
        assert_eq!(f.cache_tag(), "limit=50&category=Food&start_date=2025-01-01");
        assert_eq!(TransactionFilter::default().cache_tag(), "all");
    }

    #[test]
    fn test_category_spending_alias() {
        let c: CategorySpending =
            serde_json::from_str(r#"{"category":"Food","amount":"12.50"}"#).unwrap();
        assert_eq!(c.total.to_string(), "12.50");
    }
}
