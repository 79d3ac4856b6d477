//! Data models for threadsync.
//!
//! - Post (with its Author)
//! - Participant
//! - PostIdentity

pub mod identity;
pub mod post;

pub use identity::PostIdentity;
pub use post::{Author, Participant, Post};
