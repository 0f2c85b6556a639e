// model = "claude-opus-4-5"
// created = "2026-02-01"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Clock primitives for tracking causality and ordering.
//!
//! # Lamport Clock
//!
//! A simple monotonic counter that provides a partial ordering of events.
//! Attribute and format writes are stamped with it so that concurrent
//! writes to the same key resolve identically on every replica.
//!
//! # State Vector
//!
//! Tracks, per client, the next clock this replica expects. Because every
//! operation consumes one clock tick, a state vector fully describes which
//! operations a replica has integrated. It doubles as a snapshot boundary.
//!
//! Complexity:
//! - get / contains: O(1)
//! - merge: O(n) where n is the number of clients

use rustc_hash::FxHashMap;

use super::id::ClientId;
use super::id::StructId;

/// A Lamport clock for partial ordering of events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LamportClock {
    time: u64,
}

impl LamportClock {
    /// Create a new clock starting at 0.
    pub fn new() -> LamportClock {
        return LamportClock { time: 0 };
    }

    /// Get the current time.
    #[inline]
    pub fn time(&self) -> u64 {
        return self.time;
    }

    /// Increment the clock for a local event.
    /// Returns the new time.
    #[inline]
    pub fn tick(&mut self) -> u64 {
        self.time += 1;
        return self.time;
    }

    /// Observe a remote timestamp. Sets local time to max(local, remote).
    #[inline]
    pub fn observe(&mut self, remote_time: u64) {
        self.time = self.time.max(remote_time);
    }
}

/// The next expected clock for every known client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateVector {
    entries: FxHashMap<ClientId, u64>,
}

impl StateVector {
    /// Create an empty state vector.
    pub fn new() -> StateVector {
        return StateVector {
            entries: FxHashMap::default(),
        };
    }

    /// The next clock expected from `client` (0 if unknown).
    pub fn get(&self, client: &ClientId) -> u64 {
        return *self.entries.get(client).unwrap_or(&0);
    }

    /// Whether the operation with this id is covered.
    pub fn contains(&self, id: &StructId) -> bool {
        return id.clock < self.get(&id.client);
    }

    /// Record that everything below `next` from `client` has been seen.
    pub fn advance(&mut self, client: ClientId, next: u64) {
        let entry = self.entries.entry(client).or_insert(0);
        *entry = (*entry).max(next);
    }

    /// Pointwise maximum with another state vector.
    pub fn merge(&mut self, other: &StateVector) {
        for (client, next) in &other.entries {
            self.advance(*client, *next);
        }
    }

    /// Iterate over `(client, next clock)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ClientId, &u64)> {
        return self.entries.iter();
    }

    /// Number of clients tracked.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Whether no operation has been seen.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }
}
