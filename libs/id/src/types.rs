//! Connection ID type and its generator.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::IdError;

// =============================================================================
// Connection ID
// =============================================================================

/// Identifier correlating every event raised by one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// The first ID handed out by a fresh generator.
    pub const FIRST: Self = Self(1);

    /// Returns the underlying value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Parses an ID from its decimal representation.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let value: u64 = s
            .parse()
            .map_err(|_| IdError::NotANumber(s.to_string()))?;

        if value == 0 {
            return Err(IdError::Zero);
        }

        Ok(Self(value))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ConnectionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<u64> for ConnectionId {
    type Error = IdError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            return Err(IdError::Zero);
        }
        Ok(Self(value))
    }
}

impl From<ConnectionId> for u64 {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

impl serde::Serialize for ConnectionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ConnectionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Monotonic connection ID source owned by one engine instance.
///
/// Shared across connection tasks behind an `Arc`; every call to
/// [`next_id`](Self::next_id) returns a value strictly greater than any value
/// previously returned by the same generator.
#[derive(Debug)]
pub struct ConnectionIdGenerator {
    next: AtomicU64,
}

impl ConnectionIdGenerator {
    /// Creates a generator whose first ID is [`ConnectionId::FIRST`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(ConnectionId::FIRST.0),
        }
    }

    /// Assigns the next connection ID.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_generator_starts_at_one() {
        let ids = ConnectionIdGenerator::new();
        assert_eq!(ids.next_id(), ConnectionId::FIRST);
        assert_eq!(ids.next_id().value(), 2);
    }

    #[test]
    fn test_generators_are_independent() {
        let a = ConnectionIdGenerator::new();
        let b = ConnectionIdGenerator::new();
        a.next_id();
        a.next_id();
        assert_eq!(b.next_id(), ConnectionId::FIRST);
    }

    #[test]
    fn test_concurrent_ids_are_distinct() {
        let ids = Arc::new(ConnectionIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || {
                    let mut seen = Vec::with_capacity(500);
                    for _ in 0..500 {
                        seen.push(ids.next_id());
                    }
                    seen
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            let seen = handle.join().unwrap();
            // Each thread observes its own assignments in increasing order.
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            all.extend(seen);
        }

        assert_eq!(all.len(), 8 * 500);
        assert_eq!(all.iter().map(|id| id.value()).max(), Some(4000));
    }

    #[test]
    fn test_parse() {
        assert_eq!("42".parse::<ConnectionId>().unwrap().value(), 42);
        assert_eq!(" 7 ".parse::<ConnectionId>().unwrap().value(), 7);
        assert_eq!("".parse::<ConnectionId>().unwrap_err(), IdError::Empty);
        assert_eq!("0".parse::<ConnectionId>().unwrap_err(), IdError::Zero);
        assert!(matches!(
            "abc".parse::<ConnectionId>().unwrap_err(),
            IdError::NotANumber(_)
        ));
        assert!("-1".parse::<ConnectionId>().is_err());
    }

    #[test]
    fn test_serde() {
        let id = ConnectionId::try_from(9).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "9");
        let parsed: ConnectionId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<ConnectionId>("0").is_err());
    }
}
