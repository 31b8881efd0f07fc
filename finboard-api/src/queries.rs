//! Cached reads and cache-invalidating writes on top of [`ApiClient`].

use finboard_analytics::ExchangeRate;
use finboard_core::{BudgetAlert, BulkDeleteOutcome, SelectionSet, Statement, Transaction};
use std::sync::Arc;

use crate::cache::{QueryCache, QueryKey};
use crate::client::ApiClient;
use crate::error::Result;
use crate::notify::Notification;
use crate::resource::{Mutation, MutationOutcome, Resource, Transactions};
use crate::types::{AnalyticsQuery, AnalyticsSummary, TransactionFilter};

#[derive(Clone)]
pub struct Queries {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
}

impl Queries {
    pub fn new(client: Arc<ApiClient>, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub async fn list<R: Resource>(&self) -> Result<Vec<R::Model>> {
        let key = QueryKey::new([R::PATH, "list"]);
        self.cache
            .get_or_fetch(key, || self.client.list::<R>())
            .await
    }

    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let key = QueryKey::new(["transactions".to_string(), "list".into(), filter.cache_tag()]);
        self.cache
            .get_or_fetch(key, || self.client.transactions(filter))
            .await
    }

    pub async fn statements(&self) -> Result<Vec<Statement>> {
        let key = QueryKey::new(["statements", "list"]);
        self.cache
            .get_or_fetch(key, || self.client.statements())
            .await
    }

    pub async fn budget_alerts(&self) -> Result<Vec<BudgetAlert>> {
        let key = QueryKey::new(["budgets", "alerts"]);
        self.cache
            .get_or_fetch(key, || self.client.budget_alerts())
            .await
    }

    pub async fn analytics_summary(&self, q: &AnalyticsQuery) -> Result<AnalyticsSummary> {
        let key = QueryKey::new(["analytics".to_string(), "summary".into(), q.cache_tag()]);
        self.cache
            .get_or_fetch(key, || self.client.analytics_summary(q))
            .await
    }

    /// Live rate when reachable (cached), otherwise the flagged fallback.
    /// The fallback itself is never cached.
    pub async fn exchange_rate(&self) -> ExchangeRate {
        let key = QueryKey::from("exchange-rate");
        match self
            .cache
            .get_or_fetch(key, || self.client.exchange_rate())
            .await
        {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(error = %e, "exchange rate unavailable; using fixed fallback");
                ExchangeRate::fallback()
            }
        }
    }

    /// Run a create/update/delete and invalidate the resource's dependent
    /// queries on success.
    pub async fn mutate<R: Resource>(&self, mutation: Mutation<R>) -> Result<MutationOutcome<R>> {
        let outcome = self.client.mutate(mutation).await?;
        self.cache.invalidate_all(R::INVALIDATES.iter().copied());
        Ok(outcome)
    }

    /// Bulk delete the selected transactions. Deleted ids leave the
    /// selection; ids the backend failed to delete stay selected.
    pub async fn bulk_delete_transactions(
        &self,
        selection: &mut SelectionSet,
    ) -> Result<BulkDeleteOutcome> {
        let ids = selection.ids();
        let outcome = self.client.bulk_delete_transactions(&ids).await?;
        selection.apply_bulk_delete(&outcome);
        if !outcome.deleted.is_empty() {
            self.cache
                .invalidate_all(Transactions::INVALIDATES.iter().copied());
        }
        tracing::info!(
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "bulk delete"
        );
        Ok(outcome)
    }

    pub fn invalidate_statement_views(&self) {
        self.cache
            .invalidate_all(["statements", "transactions", "analytics"]);
    }
}

/// Toast for the result of a mutation.
pub fn mutation_notification<R: Resource>(
    verb: &str,
    result: &Result<MutationOutcome<R>>,
) -> Notification {
    match result {
        Ok(_) => Notification::success(format!("{} {verb}", R::LABEL), "Changes saved"),
        Err(e) => Notification::from_error(format!("Could not save {}", R::LABEL.to_lowercase()), e),
    }
}

/// Toast for a bulk delete, mentioning partial failures.
pub fn bulk_delete_notification(outcome: &BulkDeleteOutcome) -> Notification {
    let deleted = outcome.deleted.len();
    if outcome.failed.is_empty() {
        Notification::success(
            "Transactions deleted",
            format!("{deleted} transaction(s) deleted"),
        )
    } else {
        Notification::error(
            "Some transactions were not deleted",
            format!(
                "{deleted} deleted, {} failed and are still selected",
                outcome.failed.len()
            ),
        )
    }
}
