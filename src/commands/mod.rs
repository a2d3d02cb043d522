//! Command Dispatcher Module
//!
//! Receives validated requests from the connection layer, executes them
//! against the selected keyspace, and returns the reply to encode.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  parse_frame    │  (protocol::parser)
//! └────────┬────────┘
//!          │  Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │ Request::parse  │  (protocol::request)
//! └────────┬────────┘
//!          │  Request
//!          ▼
//! ┌─────────────────┐       ┌──────────────┐
//! │ CommandHandler  │──────>│   Session    │  selected db index
//! │  (this module)  │       └──────────────┘
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Databases[db]   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! Arity and argument checks happen before a request reaches this module, so
//! the dispatcher only has to map store outcomes onto replies.

pub mod handler;

pub use handler::{CommandHandler, Session};
