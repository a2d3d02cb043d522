//! Reply Values and the Reply Encoder
//!
//! Every request produces exactly one [`RespValue`], which is serialized onto
//! the wire in one of these forms:
//!
//! | kind          | wire form                |
//! |---------------|--------------------------|
//! | status        | `+<text>\r\n`            |
//! | error         | `-<text>\r\n`            |
//! | integer       | `:<value>\r\n`           |
//! | bulk          | `$<len>\r\n<bytes>\r\n`  |
//! | null          | `$-1\r\n`                |
//! | raw           | pre-encoded bytes        |
//!
//! Raw replies carry canned or composite payloads (the HELLO greeting, the
//! array returned by KEYS) that are built once and written verbatim.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
    pub const MAP: u8 = b'%';
}

/// A reply to send back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Status reply. Must not contain CR or LF.
    SimpleString(String),

    /// Error reply. Must not contain CR or LF.
    Error(String),

    /// 64-bit signed integer.
    Integer(i64),

    /// Binary-safe bulk string.
    BulkString(Bytes),

    /// Null bulk string (`$-1`): "not found", not an error.
    Null,

    /// Already-encoded bytes, written as-is.
    Raw(Bytes),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a new bulk string response.
    ///
    /// # Example
    /// ```
    /// use flintkv::protocol::RespValue;
    /// use bytes::Bytes;
    /// let bulk = RespValue::bulk_string(Bytes::from("hello"));
    /// assert_eq!(bulk.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn raw(data: impl Into<Bytes>) -> Self {
        RespValue::Raw(data.into())
    }

    /// `+OK`
    pub fn ok() -> Self {
        Self::simple_string("OK")
    }

    pub fn pong() -> Self {
        Self::simple_string("PONG")
    }

    /// Encodes a list of bulk strings as a RESP array inside a raw reply.
    pub fn bulk_array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        let mut buf = Vec::new();
        write_header(&mut buf, prefix::ARRAY, items.len() as i64);
        for item in items {
            write_bulk(&mut buf, &item);
        }
        RespValue::Raw(Bytes::from(buf))
    }

    /// Serializes the reply to its wire form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => write_header(buf, prefix::INTEGER, *n),
            RespValue::BulkString(data) => write_bulk(buf, data),
            RespValue::Null => write_header(buf, prefix::BULK_STRING, -1),
            RespValue::Raw(data) => buf.extend_from_slice(data),
        }
    }
}

/// Writes `<prefix><n>\r\n`.
pub(crate) fn write_header(buf: &mut Vec<u8>, prefix: u8, n: i64) {
    buf.push(prefix);
    buf.extend_from_slice(n.to_string().as_bytes());
    buf.extend_from_slice(CRLF);
}

/// Writes `$<len>\r\n<data>\r\n`.
pub(crate) fn write_bulk(buf: &mut Vec<u8>, data: &[u8]) {
    write_header(buf, prefix::BULK_STRING, data.len() as i64);
    buf.extend_from_slice(data);
    buf.extend_from_slice(CRLF);
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Raw(data) => write!(f, "(raw, {} bytes)", data.len()),
        }
    }
}
