//! Pull command implementation.

use crate::cli::shared::{CommandContext, PromptCredentials, print_sync_report, runtime};
use crate::error::Result;
use crate::thread::{ThreadSyncEngine, backfill_thread};
use std::path::Path;

/// Fetch the roster and every post of the thread into storage.
///
/// # Errors
///
/// Returns configuration errors, unrecovered remote errors and storage errors.
pub fn execute(db: Option<&Path>, thread: Option<&str>, token: Option<&str>, json: bool) -> Result<()> {
    let ctx = CommandContext::load(thread)?;
    let client = ctx.graph_client(token)?;
    let mut storage = ctx.open_storage(db)?;
    let policy = ctx.settings.recovery_policy();

    let report = runtime()?.block_on(async {
        let mut engine = ThreadSyncEngine::new(client, ctx.thread_id.clone());
        backfill_thread(&mut engine, &mut storage, policy, &mut PromptCredentials).await
    })?;

    print_sync_report("Pulled", &report, json)
}
