//! The Database Set
//!
//! A fixed number of independent [`Keyspace`]s, addressed by index like
//! Redis' `SELECT 0..15`. The set is created once at startup, wrapped in an
//! `Arc` and shared by every connection; each connection only remembers which
//! index it has selected.

use crate::storage::Keyspace;

/// Default highest database index (16 databases, as in Redis).
pub const DEFAULT_MAX_DB_INDEX: usize = 15;

/// Ordered, fixed-size sequence of keyspaces.
#[derive(Debug)]
pub struct Databases {
    keyspaces: Vec<Keyspace>,
}

impl Default for Databases {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DB_INDEX)
    }
}

impl Databases {
    /// Creates `max_index + 1` empty keyspaces.
    pub fn new(max_index: usize) -> Self {
        Self {
            keyspaces: (0..=max_index).map(|_| Keyspace::new()).collect(),
        }
    }

    /// Highest valid index.
    pub fn max_index(&self) -> usize {
        self.keyspaces.len() - 1
    }

    pub fn len(&self) -> usize {
        self.keyspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyspaces.is_empty()
    }

    /// Returns the keyspace at `index`, or None if out of range.
    pub fn get(&self, index: usize) -> Option<&Keyspace> {
        self.keyspaces.get(index)
    }

    /// Drops expired records from every keyspace. Used by the optional sweeper.
    pub fn remove_expired(&self) -> usize {
        self.keyspaces.iter().map(Keyspace::remove_expired).sum()
    }
}
