//! finboard-core: entities, currency codes and statement status logic shared
//! by the finboard client crates.

pub mod currency;
pub mod forms;
pub mod models;
pub mod month;
pub mod selection;
pub mod statement;

pub use currency::{Currency, InvalidCurrency};
pub use forms::{
    BudgetCreate, BudgetUpdate, CardCreate, CategoryCreate, Credentials, IncomeCreate,
    KeywordCreate, RecurringServiceCreate, Registration, TransactionCreate, TransactionUpdate,
    Validate, ValidationErrors,
};
pub use models::{
    BillingFrequency, Budget, BudgetAlert, Card, Category, Income, Keyword, Provider,
    RecurringService, Transaction,
};
pub use month::Month;
pub use selection::{BulkDeleteOutcome, SelectionSet};
pub use statement::{ProcessingAction, ProcessingStatus, Statement, StatementBadge};
