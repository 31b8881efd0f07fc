//! Endpoints that are not plain CRUD: auth, bulk operations, statements,
//! analytics, lookups and the exchange rate.

use chrono::Utc;
use finboard_analytics::ExchangeRate;
use finboard_core::{
    BudgetAlert, BulkDeleteOutcome, Credentials, Keyword, KeywordCreate, ProcessingAction,
    Provider, Registration, Statement, Transaction, Validate,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::client::ApiClient;
use crate::error::{ApiError, Result};
use crate::token::StoredToken;
use crate::transport::{ApiRequest, Body, FilePart, Method};
use crate::types::{
    AnalyticsQuery, AnalyticsSummary, CategorySpending, Insight, PeriodComparison, TokenResponse,
    TransactionFilter, TrendPoint, UploadOptions, User,
};

#[derive(Serialize)]
struct BulkDeleteRequest<'a> {
    transaction_ids: &'a [String],
}

#[derive(Serialize)]
struct KeywordBulkRequest<'a> {
    keywords: &'a [KeywordCreate],
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

impl ApiClient {
    // --- auth ---

    pub async fn register(&self, registration: &Registration) -> Result<User> {
        registration.validate()?;
        self.post_json("/auth/register", registration).await
    }

    /// Log in and store the returned token.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenResponse> {
        credentials.validate()?;
        let token: TokenResponse = self.post_json("/auth/login", credentials).await?;
        self.store_token(&token)?;
        tracing::info!(email = %credentials.email, "logged in");
        Ok(token)
    }

    pub async fn refresh(&self) -> Result<TokenResponse> {
        let refresh_token = self.tokens().load().and_then(|t| t.refresh_token);
        let token: TokenResponse = match refresh_token.as_deref() {
            Some(rt) => {
                self.post_json("/auth/refresh", &RefreshRequest { refresh_token: rt })
                    .await?
            }
            None => self.post_empty("/auth/refresh").await?,
        };
        self.store_token(&token)?;
        Ok(token)
    }

    pub fn logout(&self) {
        self.tokens().clear();
    }

    fn store_token(&self, token: &TokenResponse) -> Result<()> {
        let stored = StoredToken::issue(
            token.access_token.clone(),
            token.refresh_token.clone(),
            Utc::now(),
        );
        self.tokens().save(&stored)?;
        Ok(())
    }

    // --- transactions ---

    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        self.get_json("/transactions", filter.to_query()).await
    }

    pub async fn bulk_delete_transactions(&self, ids: &[String]) -> Result<BulkDeleteOutcome> {
        if ids.is_empty() {
            return Ok(BulkDeleteOutcome::default());
        }
        self.delete_json("/transactions/bulk", &BulkDeleteRequest { transaction_ids: ids })
            .await
    }

    // --- budgets ---

    pub async fn budget_alerts(&self) -> Result<Vec<BudgetAlert>> {
        self.get_json("/budgets/alerts", Vec::new()).await
    }

    // --- statements ---

    pub async fn statements(&self) -> Result<Vec<Statement>> {
        self.get_json("/statements", Vec::new()).await
    }

    pub async fn statement(&self, id: &str) -> Result<Statement> {
        self.get_json(&format!("/statements/{id}"), Vec::new()).await
    }

    pub async fn statement_status(&self, id: &str) -> Result<Statement> {
        self.get_json(&format!("/statements/{id}/status"), Vec::new())
            .await
    }

    /// Upload a statement file for the full extract/categorize pipeline.
    pub async fn upload_statement(&self, file: &Path, options: &UploadOptions) -> Result<Statement> {
        self.upload("/statements/upload", file, options).await
    }

    /// Upload that only stores the file; processing is triggered separately.
    pub async fn upload_statement_simple(&self, file: &Path) -> Result<Statement> {
        self.upload("/statements/upload-simple", file, &UploadOptions::default())
            .await
    }

    async fn upload(&self, path: &str, file: &Path, options: &UploadOptions) -> Result<Statement> {
        let bytes = tokio::fs::read(file).await.map_err(|e| ApiError::File {
            path: file.display().to_string(),
            source: e,
        })?;
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("statement")
            .to_string();

        let mut fields = Vec::new();
        if let Some(card) = &options.card_id {
            fields.push(("card_id".to_string(), card.clone()));
        }
        if let Some(bank) = &options.bank {
            fields.push(("bank".to_string(), bank.clone()));
        }

        tracing::info!(file = %filename, size = bytes.len(), "uploading statement");
        let mut request = ApiRequest::new(Method::Post, path);
        request.body = Body::Multipart {
            file: FilePart {
                field: "file".to_string(),
                filename,
                mime: mime_for(file).to_string(),
                bytes,
            },
            fields,
        };
        let resp = self.send(request).await?;
        crate::client::decode(path, &resp)
    }

    /// Kick off a processing step. Progress is observed by polling
    /// [`ApiClient::statement_status`].
    pub async fn start_processing(&self, id: &str, action: ProcessingAction) -> Result<()> {
        let path = format!("/statements/{id}/{}", action.endpoint());
        let _: Value = self.post_empty(&path).await?;
        tracing::info!(statement = id, %action, "processing requested");
        Ok(())
    }

    pub async fn delete_statement(&self, id: &str) -> Result<()> {
        self.delete(&format!("/statements/{id}")).await
    }

    // --- analytics ---

    pub async fn analytics_summary(&self, q: &AnalyticsQuery) -> Result<AnalyticsSummary> {
        self.get_json("/analytics", q.to_query()).await
    }

    pub async fn analytics_by_category(&self, q: &AnalyticsQuery) -> Result<Vec<CategorySpending>> {
        self.get_json("/analytics/category", q.to_query()).await
    }

    pub async fn analytics_trends(&self, q: &AnalyticsQuery) -> Result<Vec<TrendPoint>> {
        self.get_json("/analytics/trends", q.to_query()).await
    }

    pub async fn analytics_comparison(&self, q: &AnalyticsQuery) -> Result<PeriodComparison> {
        self.get_json("/analytics/comparison", q.to_query()).await
    }

    pub async fn analytics_insights(&self, q: &AnalyticsQuery) -> Result<Vec<Insight>> {
        self.get_json("/analytics/insights", q.to_query()).await
    }

    // --- keywords ---

    pub async fn create_keywords(&self, keywords: &[KeywordCreate]) -> Result<Vec<Keyword>> {
        for k in keywords {
            k.validate()?;
        }
        self.post_json("/keywords/bulk", &KeywordBulkRequest { keywords })
            .await
    }

    pub async fn seed_default_keywords(&self) -> Result<Value> {
        self.post_empty("/keywords/seed-defaults").await
    }

    // --- lookups ---

    pub async fn bank_providers(&self) -> Result<Vec<Provider>> {
        self.get_json("/bank-providers", Vec::new()).await
    }

    pub async fn network_providers(&self) -> Result<Vec<Provider>> {
        self.get_json("/network-providers", Vec::new()).await
    }

    pub async fn card_types(&self) -> Result<Vec<Provider>> {
        self.get_json("/card-types", Vec::new()).await
    }

    // --- exchange rate ---

    pub async fn exchange_rate(&self) -> Result<ExchangeRate> {
        let rate: ExchangeRate = self.get_json("/exchange-rate", Vec::new()).await?;
        Ok(ExchangeRate::live(rate.rate))
    }

    /// Live rate, or the fixed fallback (flagged as such) when the fetch fails.
    pub async fn exchange_rate_or_fallback(&self) -> ExchangeRate {
        match self.exchange_rate().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "exchange rate unavailable; using fixed fallback");
                ExchangeRate::fallback()
            }
        }
    }
}
