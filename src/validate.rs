//! Input validation for command arguments.
//!
//! Report names resolve in three tiers: exact match → synonym lookup →
//! error with the closest suggestion.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::{Error, Result};

// ── Valid value sets ─────────────────────────────────────────

pub static VALID_REPORTS: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["authors", "links"].into_iter().collect());

pub static REPORT_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("users", "authors"),
        ("user", "authors"),
        ("author", "authors"),
        ("people", "authors"),
        ("posters", "authors"),
        ("urls", "links"),
        ("url", "links"),
        ("link", "links"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a report name via exact match or synonym lookup.
///
/// Returns the canonical name, or an error with the original input and an
/// optional suggestion.
pub fn normalize_report(input: &str) -> std::result::Result<String, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    if VALID_REPORTS.contains(lower.as_str()) {
        return Ok(lower);
    }

    if let Some(&canonical) = REPORT_SYNONYMS.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    let suggestion = find_closest_match(&lower, &VALID_REPORTS, &REPORT_SYNONYMS);
    Err((input.to_string(), suggestion))
}

/// A thread id is the numeric id of the conversation.
///
/// # Errors
///
/// Returns `InvalidArgument` for anything but ASCII digits.
pub fn validate_thread_id(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidArgument(format!(
            "thread id must be numeric, got '{input}'"
        )));
    }
    Ok(trimmed.to_string())
}

/// Tokens go into a query string verbatim; reject ones that cannot.
///
/// # Errors
///
/// Returns `InvalidArgument` for a blank token or one containing whitespace.
pub fn validate_access_token(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("access token is empty".to_string()));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(Error::InvalidArgument(
            "access token must not contain whitespace".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
