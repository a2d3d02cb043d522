//! A Single Logical Database
//!
//! A [`Keyspace`] maps keys to [`Record`]s and implements every store operation
//! the command layer needs: plain and conditional writes, reads, deletes,
//! counters and TTL management. It knows nothing about the wire format.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                 Keyspace                  │
//! │  ┌─────────────────────────────────────┐  │
//! │  │  Mutex<HashMap<Bytes, Record>>      │  │
//! │  └─────────────────────────────────────┘  │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Every public operation takes the lock once and holds it until it returns,
//! so read-modify-write operations (conditional SET, INCRBY, EXPIRE) are
//! linearizable with respect to every other operation on the same keyspace.
//!
//! ## Expiry
//!
//! Expiry is lazy: a record whose deadline has passed stays in the map until an
//! operation touches it, at which point that operation removes it and treats the
//! key as absent. Deadlines are absolute Unix timestamps in milliseconds so that
//! `EXAT`/`PXAT` can be stored without conversion.

use crate::storage::pattern::GlobPattern;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors returned by keyspace operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The key is absent or has expired.
    #[error("ERR key not found")]
    NotFound,

    /// The stored value is not a base-10 64-bit integer.
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    /// The counter would leave the `i64` range.
    #[error("ERR increment or decrement would overflow")]
    Overflow,

    /// Conflicting SET modifiers (GET together with NX).
    #[error("ERR syntax error")]
    Syntax,
}

/// Current wall-clock time as Unix milliseconds.
#[inline]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The stored bytes
    pub value: Bytes,
    /// Absolute deadline in Unix milliseconds (None = never expires)
    pub expires_at_ms: Option<i64>,
}

impl Record {
    /// Creates a record without expiry.
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at_ms: None,
        }
    }

    /// Returns true if the record is still visible at `now` (Unix ms).
    #[inline]
    pub fn is_live_at(&self, now: i64) -> bool {
        self.expires_at_ms.map_or(true, |deadline| deadline > now)
    }
}

/// Expiry modifier of a conditional SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Relative, in seconds
    Ex(i64),
    /// Relative, in milliseconds
    Px(i64),
    /// Absolute Unix time in seconds
    ExAt(i64),
    /// Absolute Unix time in milliseconds
    PxAt(i64),
}

impl Expiry {
    /// Resolves the modifier to an absolute deadline in Unix milliseconds.
    pub fn deadline_ms(self, now: i64) -> i64 {
        match self {
            Expiry::Ex(secs) => now.saturating_add(secs.saturating_mul(1000)),
            Expiry::Px(ms) => now.saturating_add(ms),
            Expiry::ExAt(secs) => secs.saturating_mul(1000),
            Expiry::PxAt(ms) => ms,
        }
    }
}

/// Write condition of a conditional SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// `NX`: only write if the key is absent
    IfAbsent,
    /// `XX`: only write if the key is present
    IfPresent,
}

/// The full set of SET modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expiry: Option<Expiry>,
    pub condition: Option<Condition>,
    /// `KEEPTTL`: retain the existing deadline when no explicit expiry is given
    pub keep_ttl: bool,
    /// `GET`: report the value that was live before the write
    pub get: bool,
}

/// Result of [`Keyspace::set_conditional`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The write happened. `previous` is only filled in when GET was requested.
    Applied { previous: Option<Bytes> },
    /// The NX/XX condition did not hold; nothing changed.
    NotApplied,
}

type Entries = HashMap<Bytes, Record>;

/// A single logical database guarded by one mutex.
///
/// # Example
///
/// ```
/// use flintkv::storage::Keyspace;
/// use bytes::Bytes;
///
/// let keyspace = Keyspace::new();
/// keyspace.set(Bytes::from("name"), Bytes::from("flint"));
/// assert_eq!(keyspace.get(b"name"), Some(Bytes::from("flint")));
/// assert_eq!(keyspace.incr_by(&Bytes::from("hits"), 5), Ok(5));
/// ```
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: Mutex<Entries>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the keyspace lock.
    ///
    /// A panic while the lock is held cannot leave a record half-written
    /// (every mutation is a single `insert`/`remove`/field store), so a
    /// poisoned lock is simply taken over.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live record for `key`, evicting it first if it has expired.
    fn live_entry<'a>(data: &'a mut Entries, key: &[u8], now: i64) -> Option<&'a mut Record> {
        if data.get(key).is_some_and(|record| !record.is_live_at(now)) {
            data.remove(key);
            return None;
        }
        data.get_mut(key)
    }

    /// Unconditional write. Clears any existing expiry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.lock().insert(key, Record::new(value));
    }

    /// Writes `value` under the NX/XX/EX/PX/EXAT/PXAT/KEEPTTL/GET modifiers.
    ///
    /// The existence check, the captured previous value and the write all
    /// happen under one lock acquisition.
    ///
    /// # Errors
    ///
    /// [`StoreError::Syntax`] if GET is combined with NX.
    pub fn set_conditional(
        &self,
        key: Bytes,
        value: Bytes,
        options: &SetOptions,
    ) -> Result<SetOutcome, StoreError> {
        if options.get && options.condition == Some(Condition::IfAbsent) {
            return Err(StoreError::Syntax);
        }

        let now = now_ms();
        let mut data = self.lock();
        let existing = Self::live_entry(&mut data, &key, now).map(|record| record.clone());

        match options.condition {
            Some(Condition::IfAbsent) if existing.is_some() => return Ok(SetOutcome::NotApplied),
            Some(Condition::IfPresent) if existing.is_none() => return Ok(SetOutcome::NotApplied),
            _ => {}
        }

        let expires_at_ms = match options.expiry {
            Some(expiry) => Some(expiry.deadline_ms(now)),
            None if options.keep_ttl => existing.as_ref().and_then(|r| r.expires_at_ms),
            None => None,
        };

        let previous = if options.get {
            existing.map(|record| record.value)
        } else {
            None
        };

        data.insert(
            key,
            Record {
                value,
                expires_at_ms,
            },
        );

        Ok(SetOutcome::Applied { previous })
    }

    /// Returns the value for `key`, or None if it is absent or expired.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let mut data = self.lock();
        Self::live_entry(&mut data, key, now_ms()).map(|record| record.value.clone())
    }

    /// Removes every listed key that is physically present and returns how many
    /// were removed. Expiry is not consulted: removal is unconditional.
    pub fn del(&self, keys: &[Bytes]) -> usize {
        let mut data = self.lock();
        keys.iter().filter(|key| data.remove(*key).is_some()).count()
    }

    /// Counts the listed keys that are live. Repeated keys are counted each time.
    pub fn exists(&self, keys: &[Bytes]) -> usize {
        let now = now_ms();
        let mut data = self.lock();
        keys.iter()
            .filter(|key| Self::live_entry(&mut data, key, now).is_some())
            .count()
    }

    /// Adds `delta` to the integer stored at `key`.
    ///
    /// An absent key is created with value `delta` and no expiry. A present
    /// key keeps its expiry. On error the stored value is left untouched.
    pub fn incr_by(&self, key: &Bytes, delta: i64) -> Result<i64, StoreError> {
        let now = now_ms();
        let mut data = self.lock();

        if let Some(record) = Self::live_entry(&mut data, key, now) {
            let current = parse_integer(&record.value).ok_or(StoreError::NotInteger)?;
            let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
            record.value = Bytes::from(next.to_string());
            return Ok(next);
        }

        data.insert(key.clone(), Record::new(Bytes::from(delta.to_string())));
        Ok(delta)
    }

    /// Subtracts `delta` from the integer stored at `key`.
    pub fn decr_by(&self, key: &Bytes, delta: i64) -> Result<i64, StoreError> {
        let negated = delta.checked_neg().ok_or(StoreError::Overflow)?;
        self.incr_by(key, negated)
    }

    /// Remaining time to live in whole seconds (rounded to nearest), or
    /// `Ok(None)` if the key has no expiry.
    pub fn ttl(&self, key: &[u8]) -> Result<Option<i64>, StoreError> {
        let now = now_ms();
        let mut data = self.lock();
        let record = Self::live_entry(&mut data, key, now).ok_or(StoreError::NotFound)?;
        Ok(record
            .expires_at_ms
            .map(|deadline| (deadline - now + 500) / 1000))
    }

    /// Sets the key to expire `seconds` from now. Returns 1.
    pub fn expire(&self, key: &[u8], seconds: i64) -> Result<i64, StoreError> {
        let now = now_ms();
        let mut data = self.lock();
        let record = Self::live_entry(&mut data, key, now).ok_or(StoreError::NotFound)?;
        record.expires_at_ms = Some(now.saturating_add(seconds.saturating_mul(1000)));
        Ok(1)
    }

    /// Clears the key's expiry. Returns 1 if an expiry was removed, else 0.
    pub fn persist(&self, key: &[u8]) -> Result<i64, StoreError> {
        let mut data = self.lock();
        let record = Self::live_entry(&mut data, key, now_ms()).ok_or(StoreError::NotFound)?;
        Ok(record.expires_at_ms.take().map_or(0, |_| 1))
    }

    /// Snapshot of all live keys. Evicts every expired record it walks past.
    pub fn keys(&self) -> Vec<Bytes> {
        let now = now_ms();
        let mut data = self.lock();
        data.retain(|_, record| record.is_live_at(now));
        data.keys().cloned().collect()
    }

    /// Snapshot of all live values. Evicts every expired record it walks past.
    pub fn values(&self) -> Vec<Bytes> {
        let now = now_ms();
        let mut data = self.lock();
        data.retain(|_, record| record.is_live_at(now));
        data.values().map(|record| record.value.clone()).collect()
    }

    /// Live keys matching a glob pattern.
    pub fn keys_matching(&self, pattern: &[u8]) -> Vec<Bytes> {
        let pattern = GlobPattern::new(pattern);
        self.keys()
            .into_iter()
            .filter(|key| pattern.matches(key))
            .collect()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = now_ms();
        let mut data = self.lock();
        data.retain(|_, record| record.is_live_at(now));
        data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every key.
    pub fn flush(&self) {
        self.lock().clear();
    }

    /// Drops every expired record and returns how many were dropped.
    pub fn remove_expired(&self) -> usize {
        let now = now_ms();
        let mut data = self.lock();
        let before = data.len();
        data.retain(|_, record| record.is_live_at(now));
        before - data.len()
    }

    /// Number of records physically held, expired or not.
    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.lock().len()
    }
}

fn parse_integer(value: &[u8]) -> Option<i64> {
    std::str::from_utf8(value).ok()?.parse().ok()
}
