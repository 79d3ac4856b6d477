//! Sync loops that connect the engine to storage.
//!
//! Each loop records a `sync_runs` row, re-issues failed steps as the
//! [`Recovery`] policy allows, and stores drained posts:
//!
//! - `backfill_thread` stores after every page.
//! - `catch_up_thread` stores once a catch-up has settled, so an interrupted
//!   catch-up never leaves a gap below the stored most-recent post.

use serde::Serialize;
use tracing::{info, warn};

use super::engine::ThreadSyncEngine;
use super::recovery::{CredentialSource, Recovery, RecoveryAction, RecoveryPolicy};
use crate::error::{Error, Result};
use crate::graph::GraphTransport;
use crate::storage::{SqliteStorage, SyncMode};

/// One engine operation the loop can re-issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Initialize,
    Backfill,
    CatchUp,
    Participants,
}

/// Outcome of a `pull` or `update`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub thread_id: String,
    /// Pages that yielded a step (backfill pages, catch-up pages).
    pub pages: usize,
    pub posts_fetched: usize,
    /// Posts that were new to storage.
    pub posts_stored: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_water_mark: Option<String>,
}

/// Run one engine step, cooling down or rotating the credential on
/// recoverable failures until it succeeds or recovery gives up.
///
/// # Errors
///
/// The step's error once it is not recoverable or attempts are exhausted,
/// or the credential source's error.
pub async fn run_step<T, C>(
    engine: &mut ThreadSyncEngine<T>,
    step: SyncStep,
    recovery: &mut Recovery,
    credentials: &mut C,
) -> Result<bool>
where
    T: GraphTransport,
    C: CredentialSource + ?Sized,
{
    loop {
        let outcome = match step {
            SyncStep::Initialize => engine.initialize().await.map(|()| true),
            SyncStep::Backfill => engine.advance_page().await,
            SyncStep::CatchUp => engine.sync_incremental().await,
            SyncStep::Participants => engine.update_participants().await.map(|()| true),
        };

        match outcome {
            Ok(more) => {
                recovery.on_success();
                return Ok(more);
            }
            Err(err) => match recovery.on_error(err)? {
                RecoveryAction::Cooldown(cooldown) => {
                    info!(?step, cooldown_secs = cooldown.as_secs(), "Cooling down before retry");
                    tokio::time::sleep(cooldown).await;
                }
                RecoveryAction::RotateCredential => {
                    let token = credentials.next_credential()?;
                    engine.change_credential(token);
                    info!(?step, "Retrying with a new access token");
                }
            },
        }
    }
}

/// Initialize the engine, store the roster and the newest page, then
/// backfill to the beginning of the thread.
///
/// # Errors
///
/// Propagates unrecovered remote errors and storage errors. Pages stored
/// before the failure stay stored; the run is recorded as failed.
pub async fn backfill_thread<T, C>(
    engine: &mut ThreadSyncEngine<T>,
    storage: &mut SqliteStorage,
    policy: RecoveryPolicy,
    credentials: &mut C,
) -> Result<SyncReport>
where
    T: GraphTransport,
    C: CredentialSource + ?Sized,
{
    let mut report = start_run(engine, storage, SyncMode::Pull)?;
    let mut recovery = Recovery::new(policy);

    let outcome = async {
        run_step(engine, SyncStep::Initialize, &mut recovery, credentials).await?;
        store_participants(engine, storage, &mut report)?;
        report.pages += 1;
        store_posts(engine, storage, &mut report)?;

        while run_step(engine, SyncStep::Backfill, &mut recovery, credentials).await? {
            report.pages += 1;
            store_posts(engine, storage, &mut report)?;
        }
        Ok::<(), Error>(())
    }
    .await;

    finish_run(engine, storage, report, outcome)
}

/// Catch up from the engine's high-water-mark, optionally refreshing the
/// roster first.
///
/// # Errors
///
/// Propagates unrecovered remote errors and storage errors. Posts of an
/// unfinished catch-up are discarded; the run is recorded as failed.
pub async fn catch_up_thread<T, C>(
    engine: &mut ThreadSyncEngine<T>,
    storage: &mut SqliteStorage,
    policy: RecoveryPolicy,
    credentials: &mut C,
    refresh_participants: bool,
) -> Result<SyncReport>
where
    T: GraphTransport,
    C: CredentialSource + ?Sized,
{
    let mut report = start_run(engine, storage, SyncMode::Update)?;
    let mut recovery = Recovery::new(policy);

    let outcome = async {
        if refresh_participants {
            run_step(engine, SyncStep::Participants, &mut recovery, credentials).await?;
            store_participants(engine, storage, &mut report)?;
        }

        while run_step(engine, SyncStep::CatchUp, &mut recovery, credentials).await? {
            report.pages += 1;
            if !engine.state().is_catching_up() {
                store_posts(engine, storage, &mut report)?;
            }
        }
        Ok::<(), Error>(())
    }
    .await;

    if outcome.is_err() {
        let discarded = engine.drain_posts().len();
        if discarded > 0 {
            warn!(discarded, "Discarding posts of an unfinished catch-up");
        }
    }
    finish_run(engine, storage, report, outcome)
}

fn start_run<T: GraphTransport>(
    engine: &ThreadSyncEngine<T>,
    storage: &mut SqliteStorage,
    mode: SyncMode,
) -> Result<SyncReport> {
    let thread_id = engine.state().thread_id().to_string();
    let run_id = storage.begin_sync_run(&thread_id, mode)?;
    info!(%run_id, %thread_id, mode = mode.as_str(), "Sync started");
    Ok(SyncReport {
        run_id,
        thread_id,
        ..SyncReport::default()
    })
}

fn store_posts<T: GraphTransport>(
    engine: &mut ThreadSyncEngine<T>,
    storage: &mut SqliteStorage,
    report: &mut SyncReport,
) -> Result<()> {
    let batch = engine.drain_posts();
    if batch.is_empty() {
        return Ok(());
    }
    let stored = storage.add_posts(&report.thread_id, &batch)?;
    report.posts_fetched += batch.len();
    report.posts_stored += stored;
    info!(fetched = batch.len(), stored, total = report.posts_stored, "Stored batch");
    Ok(())
}

fn store_participants<T: GraphTransport>(
    engine: &ThreadSyncEngine<T>,
    storage: &mut SqliteStorage,
    report: &mut SyncReport,
) -> Result<()> {
    let roster = engine.state().participants();
    storage.replace_participants(&report.thread_id, roster)?;
    report.participants = Some(roster.len());
    Ok(())
}

fn finish_run<T: GraphTransport>(
    engine: &ThreadSyncEngine<T>,
    storage: &mut SqliteStorage,
    mut report: SyncReport,
    outcome: Result<()>,
) -> Result<SyncReport> {
    report.high_water_mark = engine.state().high_water_mark().map(|id| id.as_str().to_string());

    match outcome {
        Ok(()) => {
            storage.finish_sync_run(&report.run_id, report.pages, report.posts_stored, None)?;
            info!(
                run_id = %report.run_id,
                pages = report.pages,
                stored = report.posts_stored,
                "Sync finished"
            );
            Ok(report)
        }
        Err(err) => {
            let message = err.to_string();
            if let Err(record_err) =
                storage.finish_sync_run(&report.run_id, report.pages, report.posts_stored, Some(&message))
            {
                warn!(run_id = %report.run_id, error = %record_err, "Could not record failed run");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteFetchKind;
    use crate::graph::mock::{MockGraph, THREAD_ID};
    use crate::model::PostIdentity;
    use std::time::Duration;

    fn instant(max_attempts: u32) -> RecoveryPolicy {
        RecoveryPolicy {
            initial_cooldown: Duration::ZERO,
            max_cooldown: Duration::ZERO,
            max_attempts,
        }
    }

    /// Hands out tokens from a list; errors once it runs dry.
    struct Tokens(Vec<&'static str>);

    impl CredentialSource for Tokens {
        fn next_credential(&mut self) -> Result<String> {
            self.0.pop().map(str::to_string).ok_or_else(|| Error::NotConfigured {
                setting: "access_token".to_string(),
            })
        }
    }

    async fn pulled(storage: &mut SqliteStorage) -> ThreadSyncEngine<MockGraph> {
        let mut engine = ThreadSyncEngine::new(MockGraph::new(), THREAD_ID);
        backfill_thread(&mut engine, storage, instant(3), &mut Tokens(vec![]))
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_backfill_stores_thread() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut engine = ThreadSyncEngine::new(MockGraph::new(), THREAD_ID);

        let report = backfill_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec![]))
            .await
            .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.posts_stored, 36);
        assert_eq!(report.participants, Some(8));
        assert_eq!(report.high_water_mark.as_deref(), Some("36"));
        assert_eq!(storage.count_posts(THREAD_ID).unwrap(), 36);
        assert_eq!(storage.list_participants(THREAD_ID).unwrap().len(), 8);
        assert!(engine.state().posts().is_empty());

        let runs = storage.recent_sync_runs(Some(THREAD_ID), 1).unwrap();
        assert_eq!(runs[0].status, "completed");
        assert_eq!(runs[0].posts_stored, 36);
    }

    #[tokio::test]
    async fn test_repeated_pull_stores_nothing_new() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        pulled(&mut storage).await;

        let mut engine = ThreadSyncEngine::new(MockGraph::new(), THREAD_ID);
        let report = backfill_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec![]))
            .await
            .unwrap();
        assert_eq!(report.posts_fetched, 36);
        assert_eq!(report.posts_stored, 0);
    }

    #[tokio::test]
    async fn test_catch_up_from_stored_mark() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        pulled(&mut storage).await;

        let mark = storage.most_recent_post_id(THREAD_ID).unwrap().unwrap();
        let mut mock = MockGraph::new();
        mock.use_full_update_order();
        let mut engine = ThreadSyncEngine::resume(mock, THREAD_ID, mark);

        let report = catch_up_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec![]), true)
            .await
            .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.posts_stored, 25);
        assert_eq!(report.participants, Some(9));
        assert_eq!(storage.count_posts(THREAD_ID).unwrap(), 61);
        assert_eq!(
            storage.most_recent_post_id(THREAD_ID).unwrap(),
            Some(PostIdentity::parse("61").unwrap())
        );
        assert_eq!(storage.list_participants(THREAD_ID).unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_catch_up_without_changes() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        pulled(&mut storage).await;

        let mark = storage.most_recent_post_id(THREAD_ID).unwrap().unwrap();
        let mut engine = ThreadSyncEngine::resume(MockGraph::new(), THREAD_ID, mark);
        let report = catch_up_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec![]), false)
            .await
            .unwrap();

        assert_eq!(report.pages, 0);
        assert_eq!(report.posts_stored, 0);
        assert_eq!(report.participants, None);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mock = MockGraph::new();
        mock.fail_next_with(RemoteFetchKind::RateLimited);
        mock.fail_next_with(RemoteFetchKind::RateLimited);
        let mut engine = ThreadSyncEngine::new(mock, THREAD_ID);

        let report = backfill_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec![]))
            .await
            .unwrap();
        assert_eq!(report.posts_stored, 36);
        // Two failed attempts, the root, the older page.
        assert_eq!(engine.transport().request_count(), 4);
    }

    #[tokio::test]
    async fn test_expired_credential_is_rotated() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mock = MockGraph::new();
        mock.fail_next_with(RemoteFetchKind::CredentialExpired);
        let mut engine = ThreadSyncEngine::new(mock, THREAD_ID);

        backfill_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec!["fresh"]))
            .await
            .unwrap();
        assert_eq!(engine.transport().token(), "fresh");
        assert_eq!(storage.count_posts(THREAD_ID).unwrap(), 36);
    }

    #[tokio::test]
    async fn test_missing_credential_aborts() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mock = MockGraph::new();
        mock.fail_next_with(RemoteFetchKind::CredentialExpired);
        let mut engine = ThreadSyncEngine::new(mock, THREAD_ID);

        let err = backfill_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured { .. }));
        assert_eq!(storage.recent_sync_runs(None, 1).unwrap()[0].status, "failed");
    }

    #[tokio::test]
    async fn test_fatal_error_records_failed_run() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mock = MockGraph::new();
        mock.fail_next_with(RemoteFetchKind::Other);
        let mut engine = ThreadSyncEngine::new(mock, THREAD_ID);

        let err = backfill_thread(&mut engine, &mut storage, instant(3), &mut Tokens(vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteFetchKind::Other));

        let run = &storage.recent_sync_runs(Some(THREAD_ID), 1).unwrap()[0];
        assert_eq!(run.status, "failed");
        assert!(run.error.as_deref().is_some_and(|e| e.contains("remote error")));
        assert_eq!(storage.count_posts(THREAD_ID).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_interrupted_catch_up_stores_nothing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        pulled(&mut storage).await;

        let mark = storage.most_recent_post_id(THREAD_ID).unwrap().unwrap();
        let mut mock = MockGraph::new();
        mock.use_large_update_order();
        let mut engine = ThreadSyncEngine::resume(mock, THREAD_ID, mark);

        // Newest page succeeds, then the gap page keeps hitting the rate limit.
        engine.sync_incremental().await.unwrap();
        assert_eq!(engine.state().posts().len(), 25);
        engine.transport().fail_next_with(RemoteFetchKind::RateLimited);
        engine.transport().fail_next_with(RemoteFetchKind::RateLimited);

        let err = catch_up_thread(&mut engine, &mut storage, instant(1), &mut Tokens(vec![]), false)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(storage.count_posts(THREAD_ID).unwrap(), 36);
        assert!(engine.state().posts().is_empty());
    }
}
