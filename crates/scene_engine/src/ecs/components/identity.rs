//! Identity and tag components

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ecs::Component;

/// Process-unique 64-bit identifier
///
/// Zero is reserved and never generated; script calls use it to mean
/// "no entity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uuid(u64);

impl Uuid {
    /// The reserved "no entity" value
    pub const NIL: Self = Self(0);

    /// Generate a random non-zero identifier
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let value: u64 = rng.gen();
            if value != 0 {
                return Self(value);
            }
        }
    }

    /// Wrap a raw value
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The raw 64-bit value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved nil value
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl Default for Uuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdComponent {
    /// Identifier assigned at creation
    pub id: Uuid,
}

impl Component for IdComponent {}

/// Display name of an entity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagComponent {
    /// Name shown in tools and used by name lookups
    pub tag: String,
}

impl TagComponent {
    /// Create a tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Component for TagComponent {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_is_never_nil() {
        let ids: HashSet<Uuid> = (0..1000).map(|_| Uuid::new()).collect();
        assert!(ids.iter().all(|id| !id.is_nil()));
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_uuid_raw_roundtrip() {
        let id = Uuid::from_raw(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(id.to_string(), "42");
    }
}
