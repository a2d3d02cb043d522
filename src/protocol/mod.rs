//! RESP Protocol Implementation
//!
//! The wire side of flintkv: framing incoming requests, validating them into
//! [`Request`]s, and encoding [`RespValue`] replies.
//!
//! ## Modules
//!
//! - `parser`: Frames `*N` arrays of `$L` bulk strings out of a byte buffer
//! - `request`: Per-command arity, numeric and SET-modifier validation
//! - `types`: Reply values and their wire encoding
//! - `error`: The framing (fatal) and validation (recoverable) error tiers
//!
//! ## Example
//!
//! ```
//! use flintkv::protocol::{parse_frame, Request, RespValue};
//! use bytes::Bytes;
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (args, consumed) = parse_frame(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! let request = Request::parse(args, 15).unwrap();
//! assert_eq!(request.name, "get");
//!
//! let reply = RespValue::bulk_string(Bytes::from("flint"));
//! assert_eq!(reply.serialize(), b"$5\r\nflint\r\n");
//! ```

pub mod error;
pub mod parser;
pub mod request;
pub mod types;

pub use error::{CommandError, FrameError};
pub use parser::{parse_frame, FrameResult, MAX_BULK_SIZE};
pub use request::Request;
pub use types::RespValue;
