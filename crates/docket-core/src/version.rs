//! Monotonic state versions
//!
//! Every mutation of a conversation actor increments its version by exactly
//! one, and the search index only applies a projection whose version is
//! strictly greater than the one it already holds. That single invariant is
//! what makes at-least-once, reordered event delivery safe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version number for a conversation actor's state
///
/// Monotonically increasing; one increment per mutating operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Version of a conversation that has never been written
    pub const INITIAL: Self = Version(0);

    /// Create a version from a raw value
    pub const fn new(v: u64) -> Self {
        Version(v)
    }

    /// Get the raw version number
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The version after one more write
    pub fn increment(&self) -> Self {
        Version(self.0.saturating_add(1))
    }

    /// Whether a projection at `incoming` may overwrite a row at `self`
    pub fn admits(&self, incoming: Version) -> bool {
        *self < incoming
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(v: u64) -> Self {
        Version(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_increment() {
        let v = Version::INITIAL;
        assert_eq!(v.value(), 0);
        assert_eq!(v.increment().value(), 1);
        assert_eq!(v.increment().increment().value(), 2);
    }

    #[test]
    fn test_version_admits_only_newer() {
        let row = Version::new(7);
        assert!(!row.admits(Version::new(5)));
        assert!(!row.admits(Version::new(7)));
        assert!(row.admits(Version::new(8)));
    }

    #[test]
    fn test_version_saturates() {
        let v = Version::new(u64::MAX);
        assert_eq!(v.increment().value(), u64::MAX);
    }
}
