//! Participants command implementation.

use crate::cli::shared::{CommandContext, PromptCredentials, print_json, runtime};
use crate::error::Result;
use crate::model::Participant;
use crate::thread::{Recovery, SyncStep, ThreadSyncEngine, run_step};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ParticipantsOutput<'a> {
    thread_id: &'a str,
    count: usize,
    participants: &'a [Participant],
}

/// Refresh the roster, store it and print it.
///
/// # Errors
///
/// Returns configuration errors, unrecovered remote errors and storage errors.
pub fn execute(db: Option<&Path>, thread: Option<&str>, token: Option<&str>, json: bool) -> Result<()> {
    let ctx = CommandContext::load(thread)?;
    let client = ctx.graph_client(token)?;
    let mut storage = ctx.open_storage(db)?;
    let mut recovery = Recovery::new(ctx.settings.recovery_policy());

    let mut engine = ThreadSyncEngine::new(client, ctx.thread_id.clone());
    runtime()?.block_on(run_step(
        &mut engine,
        SyncStep::Participants,
        &mut recovery,
        &mut PromptCredentials,
    ))?;

    let roster = engine.state().participants();
    storage.replace_participants(&ctx.thread_id, roster)?;

    if json {
        return print_json(&ParticipantsOutput {
            thread_id: &ctx.thread_id,
            count: roster.len(),
            participants: roster,
        });
    }

    println!(
        "{} ({})",
        format!("Participants of thread {}", ctx.thread_id).bold().underline(),
        roster.len()
    );
    for p in roster {
        println!("  {}  {}", p.display_name(), p.id.dimmed());
    }
    Ok(())
}
