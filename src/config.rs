//! Server configuration.
//!
//! Every option can be given as a flag or through a `FLINTKV_*` environment
//! variable; flags win.

use crate::storage::DEFAULT_MAX_DB_INDEX;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::time::Duration;

/// Upper bound for `--max-db-index` (1024 databases).
pub const MAX_DB_INDEX_LIMIT: u64 = 1023;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "flintkv", version, about = "A small Redis-compatible key-value server")]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "FLINTKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "FLINTKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Highest database index SELECT accepts
    #[arg(
        long,
        env = "FLINTKV_MAX_DB_INDEX",
        default_value_t = DEFAULT_MAX_DB_INDEX,
        value_parser = RangedU64ValueParser::<usize>::new().range(0..=MAX_DB_INDEX_LIMIT)
    )]
    pub max_db_index: usize,

    /// Run a background sweep for expired keys every N milliseconds
    #[arg(long, env = "FLINTKV_SWEEP_INTERVAL_MS")]
    pub sweep_interval_ms: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "FLINTKV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The sweep interval, if the background sweeper is enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
