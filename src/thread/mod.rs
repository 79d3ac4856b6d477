//! Thread synchronization.
//!
//! - [`engine`] - Backfill and catch-up state machine for one thread
//! - [`participants`] - Roster tracking
//! - [`recovery`] - Cooldown and credential rotation after remote failures
//! - [`driver`] - Loops that run the engine with recovery and store results

pub mod driver;
pub mod engine;
pub mod participants;
pub mod recovery;

pub use driver::{SyncReport, SyncStep, backfill_thread, catch_up_thread, run_step};
pub use engine::{SyncPhase, ThreadSyncEngine, ThreadSyncState};
pub use participants::ParticipantTracker;
pub use recovery::{CredentialSource, Recovery, RecoveryAction, RecoveryPolicy};
