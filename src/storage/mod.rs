//! Store Engine
//!
//! In-memory storage for flintkv: a fixed set of independent keyspaces, each
//! guarded by its own mutex, with lazy per-key expiry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Databases                            │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐       ┌──────────┐  │
//! │  │ Keyspace │ │ Keyspace │ │ Keyspace │  ...  │ Keyspace │  │
//! │  │    0     │ │    1     │ │    2     │       │    N     │  │
//! │  │  Mutex   │ │  Mutex   │ │  Mutex   │       │  Mutex   │  │
//! │  └──────────┘ └──────────┘ └──────────┘       └──────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ (optional)
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use flintkv::storage::{Databases, SetOptions, Condition, SetOutcome};
//! use bytes::Bytes;
//!
//! let databases = Databases::new(15);
//! let db0 = databases.get(0).unwrap();
//!
//! db0.set(Bytes::from("name"), Bytes::from("flint"));
//!
//! let nx = SetOptions { condition: Some(Condition::IfAbsent), ..Default::default() };
//! let outcome = db0.set_conditional(Bytes::from("name"), Bytes::from("other"), &nx);
//! assert_eq!(outcome, Ok(SetOutcome::NotApplied));
//! ```

pub mod databases;
pub mod expiry;
pub mod keyspace;
pub mod pattern;

pub use databases::{Databases, DEFAULT_MAX_DB_INDEX};
pub use expiry::{ExpiryConfig, ExpirySweeper};
pub use keyspace::{
    now_ms, Condition, Expiry, Keyspace, Record, SetOptions, SetOutcome, StoreError,
};
