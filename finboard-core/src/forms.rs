//! Create/update payloads and their client-side validation.
//!
//! Validation runs before any request is sent; a failing form never reaches
//! the backend, and every problem is reported against the field it belongs to.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::currency::Currency;
use crate::models::BillingFrequency;
use crate::month::Month;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));
static LAST_FOUR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("last-four regex"));
static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("color regex"));

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 100;

/// Per-field validation failures, keyed by the payload's field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("invalid input: {}", describe(.fields))]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first message recorded for a field.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    fn require_text(&mut self, field: &'static str, value: &str) {
        let v = value.trim();
        if v.is_empty() {
            self.add(field, "is required");
        } else if v.chars().count() > MAX_NAME_LEN {
            self.add(field, format!("must be at most {MAX_NAME_LEN} characters"));
        }
    }

    fn require_positive(&mut self, field: &'static str, value: Decimal) {
        if value <= Decimal::ZERO {
            self.add(field, "must be greater than zero");
        }
    }

    fn check_money_scale(&mut self, field: &'static str, value: Decimal) {
        if value.normalize().scale() > 2 {
            self.add(field, "must have at most two decimal places");
        }
    }
}

fn describe(fields: &BTreeMap<&'static str, String>) -> String {
    let parts: Vec<String> = fields.iter().map(|(k, v)| format!("{k} {v}")).collect();
    parts.join("; ")
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionCreate {
    pub merchant: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub transaction_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Validate for TransactionCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        e.require_text("merchant", &self.merchant);
        if self.amount.is_zero() {
            e.add("amount", "must not be zero");
        }
        e.check_money_scale("amount", self.amount);
        e.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Validate for TransactionUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        if let Some(m) = &self.merchant {
            e.require_text("merchant", m);
        }
        if let Some(a) = self.amount {
            if a.is_zero() {
                e.add("amount", "must not be zero");
            }
            e.check_money_scale("amount", a);
        }
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardCreate {
    pub card_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_four_digits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl Validate for CardCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        e.require_text("card_name", &self.card_name);
        if let Some(d) = &self.last_four_digits {
            if !LAST_FOUR_RE.is_match(d) {
                e.add("last_four_digits", "must be exactly four digits");
            }
        }
        if let Some(limit) = self.credit_limit {
            e.require_positive("credit_limit", limit);
        }
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Validate for CategoryCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        e.require_text("name", &self.name);
        if let Some(c) = &self.color {
            if !HEX_COLOR_RE.is_match(c) {
                e.add("color", "must be a hex color like #22c55e");
            }
        }
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomeCreate {
    pub source: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub income_date: NaiveDate,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Validate for IncomeCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        e.require_text("source", &self.source);
        e.require_positive("amount", self.amount);
        e.check_money_scale("amount", self.amount);
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetCreate {
    pub category: String,
    pub limit_amount: Decimal,
    pub month: Month,
    pub currency: Currency,
}

impl Validate for BudgetCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        e.require_text("category", &self.category);
        e.require_positive("limit_amount", self.limit_amount);
        e.check_money_scale("limit_amount", self.limit_amount);
        e.into_result()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BudgetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl Validate for BudgetUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        if let Some(limit) = self.limit_amount {
            e.require_positive("limit_amount", limit);
            e.check_money_scale("limit_amount", limit);
        }
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringServiceCreate {
    pub name: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<BillingFrequency>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for RecurringServiceCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        e.require_text("name", &self.name);
        e.require_positive("amount", self.amount);
        if let Some(day) = self.billing_day {
            if !(1..=31).contains(&day) {
                e.add("billing_day", "must be between 1 and 31");
            }
        }
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordCreate {
    pub keyword: String,
    pub category_id: String,
}

impl Validate for KeywordCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        e.require_text("keyword", &self.keyword);
        e.require_text("category_id", &self.category_id);
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for Credentials {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        if !EMAIL_RE.is_match(self.email.trim()) {
            e.add("email", "must be a valid email address");
        }
        if self.password.is_empty() {
            e.add("password", "is required");
        }
        e.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl Validate for Registration {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut e = ValidationErrors::new();
        if !EMAIL_RE.is_match(self.email.trim()) {
            e.add("email", "must be a valid email address");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            e.add("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
        }
        e.into_result()
    }
}

fn default_true() -> bool {
    true
}
