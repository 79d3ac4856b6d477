//! Command implementations.

pub mod completions;
pub mod init;
pub mod participants;
pub mod pull;
pub mod report;
pub mod status;
pub mod update;
pub mod version;
