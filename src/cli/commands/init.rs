//! Initialize threadsync.
//!
//! Writes the token, thread and database location given on the command line
//! (or via `THREADSYNC_*`) into `~/.threadsync/config.json`, then creates the
//! database. Values already in the settings file are kept unless `--force`.

use crate::cli::shared::{open_storage, print_json};
use crate::config::{self, Settings};
use crate::error::{Error, Result};
use crate::validate::{validate_access_token, validate_thread_id};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    settings: PathBuf,
    database: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
    token_configured: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if a value is invalid, the settings file cannot be
/// written, or the database cannot be created.
pub fn execute(
    db: Option<&Path>,
    token: Option<&str>,
    thread: Option<&str>,
    force: bool,
    json: bool,
) -> Result<()> {
    let settings_path = config::settings_path()
        .ok_or_else(|| Error::Config("Could not determine the settings location".to_string()))?;
    let existing = Settings::load_from(&settings_path)?;

    let mut given = Settings::default();
    given.graph.access_token = token.map(validate_access_token).transpose()?;
    given.graph.thread_id = thread.map(validate_thread_id).transpose()?;
    given.db_path = db.map(Path::to_path_buf);

    let settings = if force {
        let mut merged = existing;
        merged.merge(given);
        merged
    } else {
        given.merge(existing);
        given
    };
    settings.save_to(&settings_path)?;

    let database = config::resolve_db_path(None, &settings)
        .ok_or_else(|| Error::Config("Could not determine database location".to_string()))?;
    open_storage(Some(&database), &settings)?;

    let output = InitOutput {
        settings: settings_path,
        database,
        thread_id: settings.graph.thread_id.clone(),
        token_configured: settings.graph.access_token.is_some(),
    };

    if json {
        return print_json(&output);
    }

    println!("{}", "Initialized threadsync".green().bold());
    println!("  Settings: {}", output.settings.display());
    println!("  Database: {}", output.database.display());
    match &output.thread_id {
        Some(id) => println!("  Thread:   {id}"),
        None => println!("  Thread:   {}", "not set (use --thread)".yellow()),
    }
    if !output.token_configured {
        println!("  Token:    {}", "not set (use --token)".yellow());
    }
    println!();
    println!("Next: run 'threadsync pull' to fetch the thread.");
    Ok(())
}
