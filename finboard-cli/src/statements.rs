use anyhow::{Result, bail};
use finboard_api::{
    Notification, PollEvent, PollerConfig, Queries, StatementPoller, UploadOptions,
};
use finboard_core::{ProcessingAction, Statement};
use std::path::Path;

use crate::output::notify;

pub fn print_statement(s: &Statement) {
    let badge = s.badge();
    let marker = if badge.is_busy() { "…" } else { "" };
    println!(
        "{} | {:<32} | {}{} | retries={}{}",
        s.id,
        s.filename,
        badge,
        marker,
        s.retry_count,
        s.error_message
            .as_deref()
            .map(|e| format!(" | {e}"))
            .unwrap_or_default()
    );
}

pub async fn list(queries: &Queries) -> Result<()> {
    let statements = queries.statements().await?;
    if statements.is_empty() {
        println!("No statements uploaded yet");
    }
    for s in &statements {
        print_statement(s);
    }
    Ok(())
}

pub async fn upload(
    queries: &Queries,
    poll: PollerConfig,
    file: &Path,
    options: UploadOptions,
    simple: bool,
    process: bool,
) -> Result<()> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }
    let api = queries.client();
    let statement = if simple {
        api.upload_statement_simple(file).await?
    } else {
        api.upload_statement(file, &options).await?
    };
    queries.invalidate_statement_views();
    notify(&Notification::success("Statement uploaded", &statement.filename));
    print_statement(&statement);

    if process {
        run(queries, poll, &[statement.id], Some(ProcessingAction::ProcessAll)).await?;
    }
    Ok(())
}

pub async fn status(queries: &Queries, id: &str) -> Result<()> {
    let s = queries.client().statement_status(id).await?;
    print_statement(&s);
    Ok(())
}

/// Trigger `action` (or just watch, when `None`) for each id and print
/// progress until every statement is finished. Ctrl-C stops polling.
pub async fn run(
    queries: &Queries,
    poll: PollerConfig,
    ids: &[String],
    action: Option<ProcessingAction>,
) -> Result<()> {
    let (poller, mut events) =
        StatementPoller::new(queries.client().clone(), queries.cache().clone(), poll);

    let mut pending = 0usize;
    let mut failures = 0usize;
    for id in ids {
        let started = match action {
            Some(a) => match poller.trigger(id, a).await {
                Ok(started) => started,
                Err(e) => {
                    notify(&Notification::from_error(
                        format!("Could not start {a} for {id}"),
                        &e,
                    ));
                    failures += 1;
                    false
                }
            },
            None => poller.watch(id),
        };
        if started {
            pending += 1;
        }
    }

    while pending > 0 {
        tokio::select! {
            ev = events.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    PollEvent::Started { statement_id, action: Some(action) } => {
                        println!("{statement_id}: {action} started");
                    }
                    PollEvent::Started { statement_id, action: None } => {
                        println!("{statement_id}: watching");
                    }
                    PollEvent::Progress { statement_id, badge } => {
                        println!("{statement_id}: {badge}");
                    }
                    PollEvent::PollFailed { statement_id, message, consecutive } => {
                        eprintln!("{statement_id}: status check failed ({consecutive}): {message}");
                    }
                    PollEvent::Finished { notification, .. } => {
                        if notification.is_error() {
                            failures += 1;
                        }
                        notify(&notification);
                        pending -= 1;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                poller.cancel_all();
                eprintln!("Stopped polling {} statement(s)", pending);
                break;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} statement(s) did not finish processing");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finboard_api::{
        ApiClient, ApiRequest, ApiResponse, MemoryTokenStore, QueryCache, Transport,
    };
    use std::sync::Arc;

    struct NotFound;

    #[async_trait]
    impl Transport for NotFound {
        async fn send(&self, _request: ApiRequest) -> finboard_api::Result<ApiResponse> {
            Ok(ApiResponse {
                status: 404,
                body: br#"{"detail":"Statement not found"}"#.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn test_process_fails_when_nothing_starts() {
        let client = ApiClient::new(Arc::new(NotFound), Arc::new(MemoryTokenStore::new()));
        let queries = Queries::new(Arc::new(client), Arc::new(QueryCache::default()));

        let err = run(
            &queries,
            PollerConfig::default(),
            &["st-1".to_string(), "st-2".to_string()],
            Some(ProcessingAction::Extract),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "2 statement(s) did not finish processing");
    }
}
