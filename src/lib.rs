//! # flintkv - A Small Redis-Compatible Key-Value Server
//!
//! flintkv speaks the request side of RESP (arrays of bulk strings) and keeps
//! string values in memory, split across numbered databases that clients pick
//! with `SELECT`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             flintkv                              │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │           │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                            ▼                  ▼                  │
//! │                     ┌─────────────┐   ┌──────────────────────┐   │
//! │                     │ parse_frame │   │      Databases       │   │
//! │                     │ Request     │   │ ┌──────┐ ┌──────┐    │   │
//! │                     │ RespValue   │   │ │ db 0 │ │ db 1 │ .. │   │
//! │                     └─────────────┘   │ └──────┘ └──────┘    │   │
//! │                                       └──────────▲───────────┘   │
//! │                                                  │ (optional)    │
//! │                                       ┌──────────┴───────────┐   │
//! │                                       │    ExpirySweeper     │   │
//! │                                       └──────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use flintkv::commands::CommandHandler;
//! use flintkv::connection::{handle_connection, ConnectionStats};
//! use flintkv::storage::Databases;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let databases = Arc::new(Databases::default());
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let handler = CommandHandler::new(Arc::clone(&databases));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Expiry
//!
//! Keys with a deadline are checked lazily: any read or write that finds an
//! expired record removes it first. The background [`storage::ExpirySweeper`]
//! is optional and only reclaims memory for keys nobody touches again.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request framing, validation and reply encoding
//! - [`storage`]: Keyspaces, the database set and the expiry sweeper
//! - [`commands`]: The command dispatcher
//! - [`connection`]: Client connection management
//! - [`config`]: Command-line and environment configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::{CommandHandler, Session};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_frame, Request, RespValue};
pub use storage::{Databases, ExpiryConfig, ExpirySweeper, Keyspace};

/// The default port flintkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host flintkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of flintkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
