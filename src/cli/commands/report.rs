//! Report command implementation.

use crate::cli::shared::{CommandContext, format_millis, print_json};
use crate::error::{Error, Result};
use crate::validate::normalize_report;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ReportOutput<'a, T> {
    thread_id: &'a str,
    report: &'a str,
    total_posts: i64,
    rows: &'a [T],
}

/// Run an aggregation over the stored posts of a thread.
///
/// # Errors
///
/// Returns `InvalidArgument` for an unknown report, `NothingSynced` if the
/// thread has no stored posts, or a storage error.
pub fn execute(db: Option<&Path>, thread: Option<&str>, kind: &str, limit: usize, json: bool) -> Result<()> {
    let report = normalize_report(kind).map_err(|(input, suggestion)| {
        let hint = suggestion.map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default();
        Error::InvalidArgument(format!("unknown report '{input}'{hint}"))
    })?;

    let ctx = CommandContext::load(thread)?;
    let storage = ctx.open_storage(db)?;
    let total_posts = storage.count_posts(&ctx.thread_id)?;
    if total_posts == 0 {
        return Err(Error::NothingSynced {
            thread_id: ctx.thread_id,
        });
    }

    match report.as_str() {
        "authors" => {
            let mut rows = storage.posts_by_author(&ctx.thread_id)?;
            rows.truncate(limit);
            if json {
                return print_json(&ReportOutput {
                    thread_id: &ctx.thread_id,
                    report: &report,
                    total_posts,
                    rows: &rows,
                });
            }

            println!("{}", "Posts by author".bold().underline());
            for row in &rows {
                let name = row.author_name.as_deref().unwrap_or(&row.author_id);
                println!("  {:>6}  {name}", row.posts);
            }
            println!("  {}", format!("{total_posts} posts in thread {}", ctx.thread_id).dimmed());
        }
        _ => {
            let rows = storage.link_posts(&ctx.thread_id, limit)?;
            if json {
                return print_json(&ReportOutput {
                    thread_id: &ctx.thread_id,
                    report: &report,
                    total_posts,
                    rows: &rows,
                });
            }

            println!("{}", "Posts with links".bold().underline());
            for row in &rows {
                let when = row.created_at.map(format_millis).unwrap_or_default();
                let who = row.author_name.as_deref().unwrap_or("unknown");
                println!("  {} {} {}", row.post_id.cyan(), who, when.dimmed());
                for link in &row.links {
                    println!("      {link}");
                }
            }
            if rows.is_empty() {
                println!("  No links found.");
            }
        }
    }
    Ok(())
}
