//! Update command implementation.

use crate::cli::shared::{CommandContext, PromptCredentials, print_sync_report, runtime};
use crate::error::{Error, Result};
use crate::thread::{ThreadSyncEngine, catch_up_thread};
use std::path::Path;
use tracing::info;

/// Catch up from the most recently stored post.
///
/// # Errors
///
/// Returns `NothingSynced` if the thread has never been pulled, plus
/// configuration, remote and storage errors.
pub fn execute(
    db: Option<&Path>,
    thread: Option<&str>,
    token: Option<&str>,
    participants: bool,
    json: bool,
) -> Result<()> {
    let ctx = CommandContext::load(thread)?;
    let mut storage = ctx.open_storage(db)?;
    let mark = storage
        .most_recent_post_id(&ctx.thread_id)?
        .ok_or_else(|| Error::NothingSynced {
            thread_id: ctx.thread_id.clone(),
        })?;
    info!(thread_id = %ctx.thread_id, high_water_mark = %mark, "Resuming");

    let client = ctx.graph_client(token)?;
    let policy = ctx.settings.recovery_policy();

    let report = runtime()?.block_on(async {
        let mut engine = ThreadSyncEngine::resume(client, ctx.thread_id.clone(), mark);
        catch_up_thread(&mut engine, &mut storage, policy, &mut PromptCredentials, participants).await
    })?;

    print_sync_report("Updated", &report, json)
}
