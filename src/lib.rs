//! threadsync - mirror a Graph API comment thread into SQLite
//!
//! This crate provides the core functionality for the `threadsync` CLI tool.
//!
//! # Architecture
//!
//! - [`model`] - Post identities and posts
//! - [`graph`] - Graph API transport, HTTP client and cursor pagination
//! - [`thread`] - Sync engine, participants, rate-limit recovery and the
//!   store-as-you-go drivers
//! - [`storage`] - SQLite database layer
//! - [`config`] - Settings file and resolution of token, thread and paths
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod storage;
pub mod thread;
pub mod validate;

pub use error::{Error, Result};
