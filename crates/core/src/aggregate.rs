//! Aggregate root traits and optimistic concurrency expectations.

/// Aggregate root marker + minimal interface.
///
/// Implemented by every persisted record whose writes are version-conditioned
/// (inventory batches and blood requests).
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Incremented once per accepted state change; stores compare it against an
    /// [`ExpectedVersion`] before overwriting a record.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation: the version a write was decided against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(u64);

impl ExpectedVersion {
    pub const fn exact(version: u64) -> Self {
        Self(version)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// Aggregates must not perform IO or side effects.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event (+1 version per event).
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    ///
    /// This must not mutate state. State evolution is done through `apply`.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_matches_only_same_value() {
        assert!(ExpectedVersion::exact(3).matches(3));
        assert!(!ExpectedVersion::exact(3).matches(4));
        assert_eq!(ExpectedVersion::exact(3).value(), 3);
    }
}
