//! Request Framing
//!
//! Clients send each request as an array of bulk strings:
//!
//! ```text
//! *<N>\r\n
//! $<L1>\r\n<L1 bytes>\r\n
//! ...
//! $<LN>\r\n<LN bytes>\r\n
//! ```
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((args, consumed)))` - one complete request, `consumed` bytes long
//! - `Ok(None)` - the request is not complete yet, read more data
//! - `Err(FrameError)` - the bytes cannot be a request
//!
//! The caller appends network data to a buffer, calls [`parse_frame`], and on
//! success advances the buffer by `consumed`. Nothing is consumed on error:
//! the stream cannot be resynchronized, so the connection is closed.

use crate::protocol::error::FrameError;
use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Longest `*<n>\r\n` / `$<n>\r\n` header: prefix, 20 digits, CRLF.
const MAX_HEADER_LEN: usize = 1 + 20 + 2;

/// Result type for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// Attempts to parse one request frame from the start of `buf`.
///
/// # Example
///
/// ```
/// use flintkv::protocol::parse_frame;
/// use bytes::Bytes;
///
/// let (args, consumed) = parse_frame(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n").unwrap().unwrap();
/// assert_eq!(args, vec![Bytes::from("GET"), Bytes::from("name")]);
/// assert_eq!(consumed, 23);
/// ```
pub fn parse_frame(buf: &[u8]) -> FrameResult<Option<(Vec<Bytes>, usize)>> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    if first != prefix::ARRAY {
        return Err(FrameError::InvalidFormat);
    }

    let Some((count, mut consumed)) = read_length(buf)? else {
        return Ok(None);
    };
    if count == 0 {
        return Err(FrameError::InvalidFormat);
    }

    // Do not trust the declared count for preallocation.
    let mut args = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        match parse_bulk(&buf[consumed..])? {
            Some((arg, used)) => {
                args.push(arg);
                consumed += used;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((args, consumed)))
}

/// Parses `$<len>\r\n<data>\r\n`.
fn parse_bulk(buf: &[u8]) -> FrameResult<Option<(Bytes, usize)>> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    if first != prefix::BULK_STRING {
        return Err(FrameError::InvalidFormat);
    }

    let Some((length, data_start)) = read_length(buf)? else {
        return Ok(None);
    };
    if length > MAX_BULK_SIZE {
        return Err(FrameError::ParseLen);
    }

    let data_end = data_start + length;
    let total = data_end + CRLF.len();
    if buf.len() < total {
        return Ok(None);
    }

    if &buf[data_end..total] != CRLF {
        return Err(FrameError::WrongArgLen);
    }

    Ok(Some((Bytes::copy_from_slice(&buf[data_start..data_end]), total)))
}

/// Reads the `<n>\r\n` header that follows a one-byte prefix.
///
/// Returns the value and the offset just past the CRLF. A header that runs
/// past [`MAX_HEADER_LEN`] without a CRLF is rejected.
fn read_length(buf: &[u8]) -> FrameResult<Option<(usize, usize)>> {
    let window = &buf[1..buf.len().min(MAX_HEADER_LEN)];
    let Some(end) = find_crlf(window) else {
        if buf.len() >= MAX_HEADER_LEN {
            return Err(FrameError::ParseLen);
        }
        return Ok(None);
    };

    let digits = std::str::from_utf8(&buf[1..1 + end]).map_err(|_| FrameError::ParseLen)?;
    let value: usize = digits.parse().map_err(|_| FrameError::ParseLen)?;

    Ok(Some((value, 1 + end + CRLF.len())))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[test]
    fn test_parse_set_command() {
        let input = b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$5\r\nvalue\r\n";
        let (parsed, consumed) = parse_frame(input).unwrap().unwrap();
        assert_eq!(parsed, args(&["SET", "mykey", "value"]));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_consumes_exactly_one_request() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (_, consumed) = parse_frame(input).unwrap().unwrap();
        assert_eq!(consumed, 14);
    }

    #[test]
    fn test_incomplete_input() {
        let full = b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n";
        for cut in 0..full.len() {
            assert_eq!(parse_frame(&full[..cut]), Ok(None), "cut at {}", cut);
        }
    }

    #[test]
    fn test_empty_and_binary_payloads() {
        let input = b"*3\r\n$3\r\nSET\r\n$0\r\n\r\n$4\r\na\r\nb\r\n";
        let (parsed, _) = parse_frame(input).unwrap().unwrap();
        assert_eq!(parsed[1], Bytes::new());
        assert_eq!(parsed[2], Bytes::from(&b"a\r\nb"[..]));
    }

    #[test]
    fn test_invalid_leading_byte() {
        assert_eq!(parse_frame(b"PING\r\n"), Err(FrameError::InvalidFormat));
        assert_eq!(
            parse_frame(b"*2\r\nNOTADOLLAR\r\n"),
            Err(FrameError::InvalidFormat)
        );
        assert_eq!(parse_frame(b"*0\r\n"), Err(FrameError::InvalidFormat));
    }

    #[test]
    fn test_invalid_lengths() {
        assert_eq!(parse_frame(b"*x\r\n"), Err(FrameError::ParseLen));
        assert_eq!(parse_frame(b"*-1\r\n"), Err(FrameError::ParseLen));
        assert_eq!(parse_frame(b"*1\r\n$abc\r\n"), Err(FrameError::ParseLen));
        assert_eq!(parse_frame(b"*1\r\n$-1\r\n"), Err(FrameError::ParseLen));
        assert_eq!(parse_frame(b"*1\r\n$\r\n"), Err(FrameError::ParseLen));
    }

    #[test]
    fn test_unterminated_header_is_rejected() {
        let mut input = b"*".to_vec();
        input.extend(std::iter::repeat(b'1').take(4096));
        assert_eq!(parse_frame(&input), Err(FrameError::ParseLen));

        let mut input = b"*1\r\n$".to_vec();
        input.extend(std::iter::repeat(b'9').take(64));
        assert_eq!(parse_frame(&input), Err(FrameError::ParseLen));
    }

    #[test]
    fn test_longest_header_still_incomplete() {
        // 20 digits and a CR: the LF may still arrive.
        assert_eq!(parse_frame(b"*00000000000000000001\r"), Ok(None));
        assert_eq!(
            parse_frame(b"*00000000000000000001\r\n$1\r\na\r\n"),
            Ok(Some((vec![Bytes::from("a")], 30)))
        );
    }

    #[test]
    fn test_payload_length_mismatch() {
        // Declared 5, sent 3 followed by the next request's bytes.
        let input = b"*2\r\n$3\r\nGET\r\n$5\r\nabc\r\n*1\r\n";
        assert_eq!(parse_frame(input), Err(FrameError::WrongArgLen));

        // Declared 2, sent 3.
        assert_eq!(
            parse_frame(b"*1\r\n$2\r\nabc\r\n"),
            Err(FrameError::WrongArgLen)
        );
    }
}
