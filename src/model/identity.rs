//! Post identity: the comparable tail of a composite post id.
//!
//! Graph comment ids look like `"<containerId>_<postId>"`. Only the tail
//! orders posts. Tails are unbounded-width decimal strings, so they are
//! compared by numeric magnitude (`"9" < "10"`), never lexicographically.
//! Every boundary check, overlap test and filter in the crate goes through
//! the `Ord` impl here.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Separator between the container id and the post id.
pub const ID_SEPARATOR: char = '_';

/// The numeric tail of a composite post id.
///
/// Stored as canonical decimal digits (no leading zeros, `"0"` for zero),
/// which makes equality and hashing agree with numeric comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostIdentity(String);

impl PostIdentity {
    /// Parse a bare decimal identity such as `"37"`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if the input is empty or not all ASCII digits.
    pub fn parse(digits: &str) -> Result<Self> {
        let digits = digits.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidIdentifier {
                id: digits.to_string(),
            });
        }

        let canonical = digits.trim_start_matches('0');
        if canonical.is_empty() {
            Ok(Self("0".to_string()))
        } else {
            Ok(Self(canonical.to_string()))
        }
    }

    /// Extract the identity from a composite `"<container>_<post>"` id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if there is no separator or the tail is
    /// not numeric.
    pub fn from_composite(id: &str) -> Result<Self> {
        let (_, tail) = id.split_once(ID_SEPARATOR).ok_or_else(|| Error::InvalidIdentifier {
            id: id.to_string(),
        })?;
        Self::parse(tail).map_err(|_| Error::InvalidIdentifier { id: id.to_string() })
    }

    /// Canonical digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of significant digits. Used by storage to order numerically.
    #[must_use]
    pub fn digit_len(&self) -> usize {
        self.0.len()
    }
}

impl Ord for PostIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        // Canonical form has no leading zeros: longer means larger.
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for PostIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PostIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PostIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
