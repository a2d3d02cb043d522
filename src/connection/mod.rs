//! Connection Handler Module
//!
//! Manages individual client connections. Each accepted socket is handled by
//! its own Tokio task that owns the read buffer and the connection's
//! [`Session`](crate::commands::Session).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     TCP Listener (main.rs)               │
//! └──────────────────────┬───────────────────────────────────┘
//!                        │ accept() + spawn
//!                        ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                        │
//! │                                                          │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐        │
//! │  │ Read bytes │──>│   Frame    │──>│  Validate  │        │
//! │  └────────────┘   └─────┬──────┘   └─────┬──────┘        │
//! │                         │ error          │               │
//! │                         ▼                ▼               │
//! │                  reply + close    ┌────────────┐         │
//! │                                   │  Execute   │         │
//! │                                   └─────┬──────┘         │
//! │                                         ▼                │
//! │                                   reply + flush          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Pipelined requests in one read are answered in order, one flushed reply
//! per request.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
