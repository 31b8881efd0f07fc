use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use finboard_analytics::CurrencyNormalizer;
use finboard_api::{
    AnalyticsQuery, ApiClient, Budgets, Cards, Categories, FileTokenStore, Incomes, Keywords,
    Mutation, Queries, QueryCache, RecurringServices, TransactionFilter, Transactions,
    UploadOptions, bulk_delete_notification, mutation_notification,
};
use finboard_core::{
    BudgetCreate, CategoryCreate, Currency, Month, ProcessingAction, SelectionSet,
    TransactionUpdate,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod dashboard;
mod output;
mod state;
mod statements;

use output::notify;

#[derive(Parser, Debug)]
#[command(
    name = "finboard",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("FINBOARD_BUILD_SHA"), ")"),
    about = "Personal finance dashboard in the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage ~/.finboard/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Register, log in and manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    Cards {
        #[command(subcommand)]
        command: ListCommand,
    },

    Categories {
        #[command(subcommand)]
        command: CategoryCommand,
    },

    Incomes {
        #[command(subcommand)]
        command: ListCommand,
    },

    /// Recurring services (subscriptions, utilities)
    Recurring {
        #[command(subcommand)]
        command: ListCommand,
    },

    /// Categorization keywords
    Keywords {
        #[command(subcommand)]
        command: KeywordCommand,
    },

    /// Bank providers, card networks and card types
    Providers {
        #[command(subcommand)]
        command: ListCommand,
    },

    Transactions {
        #[command(subcommand)]
        command: TransactionCommand,
    },

    Budgets {
        #[command(subcommand)]
        command: BudgetCommand,
    },

    /// Upload bank statements and drive extraction/categorization
    Statements {
        #[command(subcommand)]
        command: StatementCommand,
    },

    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommand,
    },

    /// Show the current PEN per USD exchange rate
    Rate,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init {
        /// Replace an existing (possibly broken) config
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config (file plus environment overrides)
    Show,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    Register {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    Refresh,
    Logout,
    Status,
}

#[derive(Subcommand, Debug)]
enum ListCommand {
    List,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    List,
    Add {
        name: String,
        /// Hex color such as #4f46e5
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum KeywordCommand {
    List,
    /// Install the backend's default keyword set
    Seed,
}

#[derive(clap::Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    skip: Option<u32>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    card: Option<String>,
    /// Start date, YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,
    /// End date, YYYY-MM-DD
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl From<FilterArgs> for TransactionFilter {
    fn from(a: FilterArgs) -> Self {
        TransactionFilter {
            skip: a.skip,
            limit: a.limit,
            card_id: a.card,
            category: a.category,
            start_date: a.from,
            end_date: a.to,
        }
    }
}

#[derive(Subcommand, Debug)]
enum TransactionCommand {
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print the raw records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the category of one transaction
    Categorize { id: String, category: String },
    /// Delete one or more transactions in a single bulk request
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Write transactions as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Add a column converted into this currency
        #[arg(long)]
        currency: Option<Currency>,
    },
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    /// Budgets with spend computed from transactions
    List {
        #[arg(long)]
        month: Option<Month>,
    },
    /// Backend budget alerts
    Alerts,
    /// Create a monthly budget for a category
    Set {
        category: String,
        amount: Decimal,
        #[arg(long)]
        month: Option<Month>,
        #[arg(long, default_value = "PEN")]
        currency: Currency,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    Extract,
    Categorize,
    All,
    Recategorize,
}

impl From<ActionArg> for ProcessingAction {
    fn from(a: ActionArg) -> Self {
        match a {
            ActionArg::Extract => ProcessingAction::Extract,
            ActionArg::Categorize => ProcessingAction::Categorize,
            ActionArg::All => ProcessingAction::ProcessAll,
            ActionArg::Recategorize => ProcessingAction::Recategorize,
        }
    }
}

#[derive(Subcommand, Debug)]
enum StatementCommand {
    List,
    Upload {
        file: PathBuf,
        #[arg(long)]
        card: Option<String>,
        #[arg(long)]
        bank: Option<String>,
        /// Store the file only; process later
        #[arg(long)]
        simple: bool,
        /// Extract and categorize right after upload, waiting for the result
        #[arg(long)]
        process: bool,
    },
    Status { id: String },
    /// Start processing and wait for it to finish
    Process {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, value_enum, default_value = "all")]
        action: ActionArg,
    },
    /// Retry failed processing
    Retry {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Follow statements already being processed
    Watch {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Delete { id: String },
}

#[derive(clap::Args, Debug)]
struct DisplayArgs {
    /// Display currency (defaults to display.currency from config)
    #[arg(long)]
    currency: Option<Currency>,
    /// Month as YYYY-MM (defaults to the current month)
    #[arg(long)]
    month: Option<Month>,
}

#[derive(Subcommand, Debug)]
enum AnalyticsCommand {
    Summary {
        #[command(flatten)]
        display: DisplayArgs,
        /// Use the backend's summary instead of computing locally
        #[arg(long)]
        remote: bool,
    },
    Category {
        #[command(flatten)]
        display: DisplayArgs,
    },
    Trends {
        #[command(flatten)]
        display: DisplayArgs,
        #[arg(long, default_value_t = 6)]
        months: usize,
    },
    Insights,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FINBOARD_LOG").unwrap_or_else(|_| {
                "finboard=info,finboard_api=info,finboard_analytics=warn".into()
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::Config { command } = &cli.command {
        match command {
            ConfigCommand::Init { force } => config::init_config(*force)?,
            ConfigCommand::Show => {
                let path = config::config_path()?;
                let cfg = config::load_config().with_context(|| {
                    format!(
                        "{} is not usable; fix it or run `finboard config init --force`",
                        path.display()
                    )
                })?;
                println!("# {}", path.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        }
        return Ok(());
    }

    let cfg = config::load_config()?;

    let tokens = Arc::new(FileTokenStore::new(state::auth_path()?));
    let api = Arc::new(
        ApiClient::from_config(&cfg.client_config(), tokens)?
            .with_navigator(Arc::new(output::ConsoleNavigator)),
    );
    let queries = Queries::new(api.clone(), Arc::new(QueryCache::default()));
    let display_currency = cfg.display_currency()?;

    match cli.command {
        Command::Config { .. } => {}

        Command::Auth { command } => match command {
            AuthCommand::Register { email, name } => auth::register(&api, email, name).await?,
            AuthCommand::Login { email } => auth::login(&api, email).await?,
            AuthCommand::Refresh => auth::refresh(&api).await?,
            AuthCommand::Logout => auth::logout(&api),
            AuthCommand::Status => auth::status(&api),
        },

        Command::Cards { command: ListCommand::List } => {
            for c in queries.list::<Cards>().await? {
                println!(
                    "{} | {:<24} | ****{} | {}{}",
                    c.id,
                    c.card_name,
                    c.last_four_digits.as_deref().unwrap_or("----"),
                    c.currency.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                    if c.is_active { "" } else { " | inactive" }
                );
            }
        }

        Command::Categories { command } => match command {
            CategoryCommand::List => {
                for c in queries.list::<Categories>().await? {
                    println!("{} | {:<24} | {}", c.id, c.name, c.color.as_deref().unwrap_or("-"));
                }
            }
            CategoryCommand::Add { name, color, icon } => {
                let mutation = Mutation::<Categories>::Create(CategoryCreate { name, color, icon });
                let verb = mutation.past_tense();
                let result = queries.mutate(mutation).await;
                notify(&mutation_notification(verb, &result));
                result?;
            }
        },

        Command::Incomes { command: ListCommand::List } => {
            for i in queries.list::<Incomes>().await? {
                println!(
                    "{} | {:<24} | {:>14} | {}{}",
                    i.income_date,
                    i.source,
                    output::money(i.amount, &i.currency),
                    i.id,
                    if i.is_recurring { " | recurring" } else { "" }
                );
            }
        }

        Command::Recurring { command: ListCommand::List } => {
            for r in queries.list::<RecurringServices>().await? {
                println!(
                    "{} | {:<24} | {:>14} | day {} | {}",
                    r.id,
                    r.name,
                    output::money(r.amount, &r.currency),
                    r.billing_day.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                    if r.is_active { "active" } else { "paused" }
                );
            }
        }

        Command::Keywords { command } => match command {
            KeywordCommand::List => {
                for k in queries.list::<Keywords>().await? {
                    println!(
                        "{:<24} -> {}",
                        k.keyword,
                        k.category_name.as_deref().unwrap_or(&k.category_id)
                    );
                }
            }
            KeywordCommand::Seed => {
                api.seed_default_keywords().await?;
                queries.cache().invalidate("keywords");
                println!("Default keywords installed");
            }
        },

        Command::Providers { command: ListCommand::List } => {
            for (label, rows) in [
                ("Banks", api.bank_providers().await?),
                ("Networks", api.network_providers().await?),
                ("Card types", api.card_types().await?),
            ] {
                println!("{label}:");
                for p in rows {
                    println!("  {} | {}", p.id, p.name);
                }
            }
        }

        Command::Transactions { command } => match command {
            TransactionCommand::List { filter, json } => {
                let txns = queries.transactions(&filter.into()).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&txns)?);
                } else {
                    output::print_transactions(&txns);
                    println!("{} transaction(s)", txns.len());
                }
            }
            TransactionCommand::Categorize { id, category } => {
                let mutation = Mutation::<Transactions>::Update {
                    id,
                    changes: TransactionUpdate {
                        category: Some(category),
                        ..Default::default()
                    },
                };
                let verb = mutation.past_tense();
                let result = queries.mutate(mutation).await;
                notify(&mutation_notification(verb, &result));
                result?;
            }
            TransactionCommand::Delete { ids } => {
                let mut selection = SelectionSet::new();
                selection.select_all(ids);
                let outcome = queries.bulk_delete_transactions(&mut selection).await?;
                notify(&bulk_delete_notification(&outcome));
                if !selection.is_empty() {
                    bail!("not deleted: {}", selection.ids().join(", "));
                }
            }
            TransactionCommand::Export { filter, out, currency } => {
                let txns = queries.transactions(&filter.into()).await?;
                let normalizer = match &currency {
                    Some(c) => Some(CurrencyNormalizer::new(
                        c.clone(),
                        Some(queries.exchange_rate().await),
                    )),
                    None => None,
                };
                let n = match &out {
                    Some(path) => {
                        let f = std::fs::File::create(path)
                            .with_context(|| format!("create {}", path.display()))?;
                        output::write_transactions_csv(f, &txns, normalizer.as_ref())?
                    }
                    None => output::write_transactions_csv(std::io::stdout().lock(), &txns, normalizer.as_ref())?,
                };
                tracing::info!(count = n, converted = currency.is_some(), "transactions exported");
                if let Some(path) = out {
                    eprintln!("Exported {n} transaction(s) to {}", path.display());
                }
            }
        },

        Command::Budgets { command } => match command {
            BudgetCommand::List { month } => dashboard::budgets(&queries, month).await?,
            BudgetCommand::Alerts => {
                let alerts = queries.budget_alerts().await?;
                if alerts.is_empty() {
                    println!("No budget alerts");
                }
                for a in alerts {
                    let currency = a.currency.clone().unwrap_or(Currency::PEN);
                    println!(
                        "{:<20} {} of {}{}",
                        a.category,
                        output::money(a.spent_amount, &currency),
                        output::money(a.limit_amount, &currency),
                        a.message.map(|m| format!(" | {m}")).unwrap_or_default()
                    );
                }
            }
            BudgetCommand::Set { category, amount, month, currency } => {
                let mutation = Mutation::<Budgets>::Create(BudgetCreate {
                    category,
                    limit_amount: amount,
                    month: month.unwrap_or_else(dashboard::current_month),
                    currency,
                });
                let verb = mutation.past_tense();
                let result = queries.mutate(mutation).await;
                notify(&mutation_notification(verb, &result));
                result?;
            }
        },

        Command::Statements { command } => {
            let poll = cfg.poller_config();
            match command {
                StatementCommand::List => statements::list(&queries).await?,
                StatementCommand::Upload { file, card, bank, simple, process } => {
                    let options = UploadOptions { card_id: card, bank };
                    statements::upload(&queries, poll, &file, options, simple, process).await?
                }
                StatementCommand::Status { id } => statements::status(&queries, &id).await?,
                StatementCommand::Process { ids, action } => {
                    statements::run(&queries, poll, &ids, Some(action.into())).await?
                }
                StatementCommand::Retry { ids } => {
                    statements::run(&queries, poll, &ids, Some(ProcessingAction::Retry)).await?
                }
                StatementCommand::Watch { ids } => statements::run(&queries, poll, &ids, None).await?,
                StatementCommand::Delete { id } => {
                    api.delete_statement(&id).await?;
                    queries.invalidate_statement_views();
                    println!("Deleted statement {id}");
                }
            }
        }

        Command::Analytics { command } => match command {
            AnalyticsCommand::Summary { display, remote } => {
                let currency = display.currency.unwrap_or_else(|| display_currency.clone());
                let month = display.month.unwrap_or_else(dashboard::current_month);
                if remote {
                    let (start, end) = month.date_range().context("invalid month")?;
                    let q = AnalyticsQuery {
                        start_date: Some(start),
                        end_date: Some(end),
                        currency: Some(currency),
                    };
                    let s = queries.analytics_summary(&q).await?;
                    let c = s.currency.clone().unwrap_or_else(|| display_currency.clone());
                    println!("Spent: {}", output::money(s.total_spent, &c));
                    println!("Income: {}", output::money(s.total_income, &c));
                    println!("Transactions: {}", s.transaction_count);
                } else {
                    dashboard::summary(&queries, currency, month).await?;
                }
            }
            AnalyticsCommand::Category { display } => {
                let currency = display.currency.unwrap_or_else(|| display_currency.clone());
                let month = display.month.unwrap_or_else(dashboard::current_month);
                dashboard::by_category(&queries, currency, month).await?;
            }
            AnalyticsCommand::Trends { display, months } => {
                let currency = display.currency.unwrap_or_else(|| display_currency.clone());
                let month = display.month.unwrap_or_else(dashboard::current_month);
                dashboard::trends(&queries, currency, month, months).await?;
            }
            AnalyticsCommand::Insights => {
                let insights = api.analytics_insights(&AnalyticsQuery::default()).await?;
                if insights.is_empty() {
                    println!("No insights yet");
                }
                for i in insights {
                    println!("- {}: {}", i.title, i.message);
                }
            }
        },

        Command::Rate => {
            let rate = queries.exchange_rate().await;
            let source = if rate.using_fixed_fallback { "fixed fallback" } else { "live" };
            println!("1 USD = {} PEN ({source})", rate.rate);
        }
    }

    Ok(())
}
