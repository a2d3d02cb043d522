//! Protocol error tiers.
//!
//! [`FrameError`]s mean the byte stream itself is malformed. Once one is seen
//! the position of the next request is unknown, so the connection replies with
//! the error and closes.
//!
//! [`CommandError`]s are raised after a complete frame was consumed. Argument
//! errors (arity, flags, numbers) are treated like malformed input and also
//! close the connection; an unknown command or a conflicting flag combination
//! is answered and the connection keeps going. See [`CommandError::is_fatal`].
//!
//! The `Display` text of every variant is exactly what goes on the wire after
//! the `-` prefix.

use thiserror::Error;

/// Malformed framing. Fatal for the connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Wrong type prefix, or an empty request
    #[error("ERR invalid format")]
    InvalidFormat,

    /// Element count or bulk length is not a non-negative integer
    #[error("ERR parse len")]
    ParseLen,

    /// Payload is not followed by CRLF at the declared length
    #[error("ERR wrong argument length")]
    WrongArgLen,
}

/// A well-framed request that fails command validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Carries the lowercased name for logging; the wire text is fixed.
    #[error("ERR unknown command")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments")]
    WrongNumberArgs(String),

    #[error("ERR invalid expire time")]
    InvalidExpireTime,

    #[error("ERR invalid increment value")]
    InvalidIncrement,

    #[error("ERR invalid decrement value")]
    InvalidDecrement,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR Protocol version is not an integer or out of range")]
    InvalidProtocolVersion,

    #[error("ERR DB index is out of range")]
    DbIndexOutOfRange,

    #[error("ERR syntax error")]
    Syntax,
}

impl CommandError {
    /// Whether the connection should be closed after replying.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CommandError::UnknownCommand(_) | CommandError::Syntax)
    }
}
