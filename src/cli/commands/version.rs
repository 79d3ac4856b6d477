//! Version command implementation.

use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    api_version: &'a str,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };
    let api_version = crate::graph::DEFAULT_API_VERSION;

    if json {
        let output = VersionOutput {
            version,
            build,
            api_version,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("threadsync version {version} ({build}, Graph API {api_version})");
    Ok(())
}
