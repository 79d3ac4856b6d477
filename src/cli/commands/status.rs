//! Status command implementation.

use crate::cli::shared::{format_millis, open_storage, print_json};
use crate::config::{self, Settings};
use crate::error::{Error, Result};
use crate::storage::{SyncRun, ThreadSummary};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

const RECENT_RUNS: usize = 5;

#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    configured_thread: Option<String>,
    token_configured: bool,
    threads: Vec<ThreadSummary>,
    recent_runs: Vec<SyncRun>,
}

/// Show stored threads and recent sync runs.
///
/// Scoped to the configured thread when one is set, otherwise covers all.
///
/// # Errors
///
/// Returns an error if settings or the database cannot be read.
pub fn execute(db: Option<&Path>, thread: Option<&str>, token: Option<&str>, json: bool) -> Result<()> {
    let settings = Settings::load()?;
    let database = config::resolve_db_path(db, &settings)
        .ok_or_else(|| Error::Config("Could not determine database location".to_string()))?;
    let storage = open_storage(Some(&database), &settings)?;

    let configured_thread = config::resolve_thread_id(thread, &settings).ok();
    let token_configured = config::resolve_access_token(token, &settings).is_ok();

    let mut threads = storage.thread_summaries()?;
    if let Some(id) = &configured_thread {
        threads.retain(|t| &t.thread_id == id);
    }
    let recent_runs = storage.recent_sync_runs(configured_thread.as_deref(), RECENT_RUNS)?;

    let output = StatusOutput {
        database,
        configured_thread,
        token_configured,
        threads,
        recent_runs,
    };

    if json {
        return print_json(&output);
    }

    println!("{}", "threadsync status".bold().underline());
    println!("  Database: {}", output.database.display());
    println!(
        "  Token:    {}",
        if output.token_configured {
            "configured".green()
        } else {
            "not set".yellow()
        }
    );
    println!();

    if output.threads.is_empty() {
        println!("Nothing stored yet. Run 'threadsync pull' to fetch a thread.");
        return Ok(());
    }

    for t in &output.threads {
        println!("{}", format!("Thread {}", t.thread_id).cyan().bold());
        println!("  Posts:        {}", t.posts);
        println!("  Participants: {}", t.participants);
        if let Some(id) = &t.most_recent_post_id {
            println!("  Newest post:  {id}");
        }
        if let Some(at) = t.last_synced_at {
            println!("  Last synced:  {}", format_millis(at));
        }
    }

    if !output.recent_runs.is_empty() {
        println!();
        println!("{}", "Recent runs".bold());
        for run in &output.recent_runs {
            let status = match run.status.as_str() {
                "completed" => run.status.green(),
                "failed" => run.status.red(),
                _ => run.status.yellow(),
            };
            println!(
                "  {} {:<6} {:<9} {:>5} stored  {}",
                format_millis(run.started_at).dimmed(),
                run.mode,
                status,
                run.posts_stored,
                run.error.as_deref().unwrap_or_default().red()
            );
        }
    }
    Ok(())
}
