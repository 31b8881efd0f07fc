//! Client side of the finance API: transport, session, cache, typed
//! resources and the statement processing poller.

pub mod cache;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod notify;
pub mod poller;
pub mod queries;
pub mod resource;
pub mod token;
pub mod transport;
pub mod types;

pub use cache::{QueryCache, QueryKey};
pub use client::{ApiClient, ClientConfig, DEFAULT_BASE_URL, LOGIN_ROUTE, Navigator, NoNavigation};
pub use error::{ApiError, Result};
pub use notify::{Notification, NotificationKind};
pub use poller::{PollEvent, PollerConfig, StatementPoller};
pub use queries::{Queries, bulk_delete_notification, mutation_notification};
pub use resource::{
    Budgets, Cards, Categories, Incomes, Keywords, Mutation, MutationOutcome, RecurringServices,
    Resource, Transactions,
};
pub use token::{FileTokenStore, MemoryTokenStore, StoredToken, TokenStore};
pub use transport::{ApiRequest, ApiResponse, Body, Method, ReqwestTransport, Transport};
pub use types::{
    AnalyticsQuery, AnalyticsSummary, CategorySpending, Insight, PeriodComparison, TokenResponse,
    TransactionFilter, TrendPoint, UploadOptions, User,
};
