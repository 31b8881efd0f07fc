//! CRUD resources and the single create/edit/delete flow they share.
//!
//! Each resource names its collection path, its payload types and the cache
//! keys a successful mutation makes stale.

use finboard_core::{
    Budget, BudgetCreate, BudgetUpdate, Card, CardCreate, Category, CategoryCreate, Income,
    IncomeCreate, Keyword, KeywordCreate, RecurringService, RecurringServiceCreate, Transaction,
    TransactionCreate, TransactionUpdate, Validate, ValidationErrors,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::ApiClient;
use crate::error::Result;

pub trait Resource: Send + Sync + 'static {
    /// Collection path under `/api/v1`, without slashes
    const PATH: &'static str;
    /// Human name for notifications ("Card", "Budget", ...)
    const LABEL: &'static str;
    /// Cache prefixes to invalidate after a successful mutation
    const INVALIDATES: &'static [&'static str];

    type Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
    type Create: Serialize + Validate + Send + Sync;
    type Update: Serialize + Validate + Send + Sync;
}

pub struct Cards;
pub struct Categories;
pub struct Transactions;
pub struct Incomes;
pub struct Budgets;
pub struct RecurringServices;
pub struct Keywords;

impl Resource for Cards {
    const PATH: &'static str = "cards";
    const LABEL: &'static str = "Card";
    const INVALIDATES: &'static [&'static str] = &["cards"];
    type Model = Card;
    type Create = CardCreate;
    type Update = CardCreate;
}

impl Resource for Categories {
    const PATH: &'static str = "categories";
    const LABEL: &'static str = "Category";
    const INVALIDATES: &'static [&'static str] = &["categories", "transactions", "analytics"];
    type Model = Category;
    type Create = CategoryCreate;
    type Update = CategoryCreate;
}

impl Resource for Transactions {
    const PATH: &'static str = "transactions";
    const LABEL: &'static str = "Transaction";
    const INVALIDATES: &'static [&'static str] = &["transactions", "analytics", "budgets"];
    type Model = Transaction;
    type Create = TransactionCreate;
    type Update = TransactionUpdate;
}

impl Resource for Incomes {
    const PATH: &'static str = "incomes";
    const LABEL: &'static str = "Income";
    const INVALIDATES: &'static [&'static str] = &["incomes", "analytics"];
    type Model = Income;
    type Create = IncomeCreate;
    type Update = IncomeCreate;
}

impl Resource for Budgets {
    const PATH: &'static str = "budgets";
    const LABEL: &'static str = "Budget";
    const INVALIDATES: &'static [&'static str] = &["budgets"];
    type Model = Budget;
    type Create = BudgetCreate;
    type Update = BudgetUpdate;
}

impl Resource for RecurringServices {
    const PATH: &'static str = "recurring-services";
    const LABEL: &'static str = "Recurring service";
    const INVALIDATES: &'static [&'static str] = &["recurring-services", "analytics"];
    type Model = RecurringService;
    type Create = RecurringServiceCreate;
    type Update = RecurringServiceCreate;
}

impl Resource for Keywords {
    const PATH: &'static str = "keywords";
    const LABEL: &'static str = "Keyword";
    const INVALIDATES: &'static [&'static str] = &["keywords"];
    type Model = Keyword;
    type Create = KeywordCreate;
    type Update = KeywordCreate;
}

pub enum Mutation<R: Resource> {
    Create(R::Create),
    Update { id: String, changes: R::Update },
    Delete { id: String },
}

impl<R: Resource> Mutation<R> {
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        match self {
            Mutation::Create(c) => c.validate(),
            Mutation::Update { changes, .. } => changes.validate(),
            Mutation::Delete { .. } => Ok(()),
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Mutation::Create(_) => "created",
            Mutation::Update { .. } => "updated",
            Mutation::Delete { .. } => "deleted",
        }
    }
}

pub enum MutationOutcome<R: Resource> {
    Saved(R::Model),
    Deleted { id: String },
}

fn collection<R: Resource>() -> String {
    format!("/{}", R::PATH)
}

fn member<R: Resource>(id: &str) -> String {
    format!("/{}/{}", R::PATH, id)
}

impl ApiClient {
    pub async fn list<R: Resource>(&self) -> Result<Vec<R::Model>> {
        self.get_json(&collection::<R>(), Vec::new()).await
    }

    pub async fn fetch<R: Resource>(&self, id: &str) -> Result<R::Model> {
        self.get_json(&member::<R>(id), Vec::new()).await
    }

    /// Validate and run a create, update or delete. Invalid input never
    /// reaches the network.
    pub async fn mutate<R: Resource>(&self, mutation: Mutation<R>) -> Result<MutationOutcome<R>> {
        mutation.validate()?;
        match mutation {
            Mutation::Create(body) => {
                let saved = self.post_json(&collection::<R>(), &body).await?;
                Ok(MutationOutcome::Saved(saved))
            }
            Mutation::Update { id, changes } => {
                let saved = self.put_json(&member::<R>(&id), &changes).await?;
                Ok(MutationOutcome::Saved(saved))
            }
            Mutation::Delete { id } => {
                self.delete(&member::<R>(&id)).await?;
                Ok(MutationOutcome::Deleted { id })
            }
        }
    }
}
