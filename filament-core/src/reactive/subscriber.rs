//! Identifiers for the reactive system.
//!
//! Signals and subscribers (effects, derived computations, template
//! bindings) are addressed by small copyable ids. The runtime's dependency
//! index maps one to the other, so neither side needs to hold a reference to
//! the other.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID is used to track
/// dependencies and to deduplicate pending re-runs within a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn signal_ids_are_unique_and_ordered() {
        let a = SignalId::new();
        let b = SignalId::new();
        assert_ne!(a, b);
        assert!(a.raw() < b.raw());
    }

    #[test]
    fn ids_display_with_prefix() {
        let id = SignalId::new();
        assert_eq!(id.to_string(), format!("signal#{}", id.raw()));
    }
}
