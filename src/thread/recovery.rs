//! Rate-limit and credential recovery.
//!
//! The engine never retries. A caller looping over engine steps consults
//! [`Recovery`] after every failure: rate limits earn an exponential
//! cooldown, expired credentials are swapped for a fresh one, and
//! everything else aborts the loop.

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, RemoteFetchKind, Result};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(100);
pub const DEFAULT_MAX_COOLDOWN: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// How long to back off and how many consecutive recoverable failures to tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub initial_cooldown: Duration,
    pub max_cooldown: Duration,
    pub max_attempts: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            initial_cooldown: DEFAULT_COOLDOWN,
            max_cooldown: DEFAULT_MAX_COOLDOWN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RecoveryPolicy {
    /// Cooldown before the `attempt`-th retry (1-based): `initial * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn cooldown_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial_cooldown
            .checked_mul(1 << exp)
            .map_or(self.max_cooldown, |d| d.min(self.max_cooldown))
    }
}

/// What to do before re-issuing a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Cooldown(Duration),
    RotateCredential,
}

/// Supplies a replacement access token after the current one expired.
pub trait CredentialSource {
    /// # Errors
    ///
    /// Fails when no new credential can be obtained; the sync is aborted.
    fn next_credential(&mut self) -> Result<String>;
}

/// Tracks consecutive recoverable failures for one sync loop.
#[derive(Debug, Clone)]
pub struct Recovery {
    policy: RecoveryPolicy,
    consecutive: u32,
    rate_limited: u32,
}

impl Recovery {
    #[must_use]
    pub fn new(policy: RecoveryPolicy) -> Self {
        Self {
            policy,
            consecutive: 0,
            rate_limited: 0,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Decide how to handle `err`.
    ///
    /// # Errors
    ///
    /// Returns `err` itself when it is not recoverable, or once
    /// `max_attempts` consecutive recoverable failures have been seen.
    pub fn on_error(&mut self, err: Error) -> Result<RecoveryAction> {
        let kind = match err.remote_kind() {
            Some(kind @ (RemoteFetchKind::RateLimited | RemoteFetchKind::CredentialExpired)) => kind,
            _ => return Err(err),
        };

        self.consecutive += 1;
        if self.consecutive > self.policy.max_attempts {
            warn!(attempts = self.consecutive - 1, "Giving up after repeated failures");
            return Err(err);
        }

        if kind == RemoteFetchKind::RateLimited {
            self.rate_limited += 1;
            let cooldown = self.policy.cooldown_for(self.rate_limited);
            warn!(cooldown_secs = cooldown.as_secs(), attempt = self.consecutive, "Rate limited");
            Ok(RecoveryAction::Cooldown(cooldown))
        } else {
            warn!(attempt = self.consecutive, "Access token expired");
            Ok(RecoveryAction::RotateCredential)
        }
    }

    /// A step went through; start counting from scratch.
    pub fn on_success(&mut self) {
        self.consecutive = 0;
        self.rate_limited = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy {
            initial_cooldown: Duration::from_secs(100),
            max_cooldown: Duration::from_secs(500),
            max_attempts: 3,
        }
    }

    fn rate_limited() -> Error {
        Error::remote(RemoteFetchKind::RateLimited, "(#4) Application request limit reached")
    }

    #[test]
    fn test_cooldown_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.cooldown_for(1), Duration::from_secs(100));
        assert_eq!(p.cooldown_for(2), Duration::from_secs(200));
        assert_eq!(p.cooldown_for(3), Duration::from_secs(400));
        assert_eq!(p.cooldown_for(4), Duration::from_secs(500));
        assert_eq!(p.cooldown_for(200), Duration::from_secs(500));
    }

    #[test]
    fn test_default_policy() {
        let p = RecoveryPolicy::default();
        assert_eq!(p.cooldown_for(1), Duration::from_secs(100));
        assert_eq!(p.max_attempts, 10);
    }

    #[test]
    fn test_rate_limit_then_give_up() {
        let mut recovery = Recovery::new(policy());
        assert_eq!(
            recovery.on_error(rate_limited()).unwrap(),
            RecoveryAction::Cooldown(Duration::from_secs(100))
        );
        assert_eq!(
            recovery.on_error(rate_limited()).unwrap(),
            RecoveryAction::Cooldown(Duration::from_secs(200))
        );
        assert!(recovery.on_error(rate_limited()).is_ok());

        let err = recovery.on_error(rate_limited()).unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteFetchKind::RateLimited));
    }

    #[test]
    fn test_success_resets_counters() {
        let mut recovery = Recovery::new(policy());
        recovery.on_error(rate_limited()).unwrap();
        recovery.on_error(rate_limited()).unwrap();
        recovery.on_success();
        assert_eq!(
            recovery.on_error(rate_limited()).unwrap(),
            RecoveryAction::Cooldown(Duration::from_secs(100))
        );
    }

    #[test]
    fn test_expired_credential_rotates() {
        let mut recovery = Recovery::new(policy());
        let err = Error::remote(RemoteFetchKind::CredentialExpired, "Error validating access token");
        assert_eq!(recovery.on_error(err).unwrap(), RecoveryAction::RotateCredential);
    }

    #[test]
    fn test_other_errors_pass_through() {
        let mut recovery = Recovery::new(policy());

        let err = recovery
            .on_error(Error::remote(RemoteFetchKind::Timeout, "timed out"))
            .unwrap_err();
        assert_eq!(err.remote_kind(), Some(RemoteFetchKind::Timeout));

        let err = recovery.on_error(Error::malformed("data")).unwrap_err();
        assert!(matches!(err, Error::MalformedPage { .. }));
    }
}
