//! Command Validation
//!
//! Turns the argument list of a framed request into a [`Request`]: the
//! command name is lowercased, arity is checked, numeric arguments are parsed
//! and SET modifiers are scanned into [`SetOptions`].
//!
//! | command          | arity        | extra validation                     |
//! |------------------|--------------|--------------------------------------|
//! | ping             | 1            |                                      |
//! | hello            | ≥ 1          | protocol version must be an integer  |
//! | get              | 2            |                                      |
//! | del, exists      | ≥ 2          |                                      |
//! | incr, decr       | 2            |                                      |
//! | incrby, decrby   | 3            | amount must be an integer            |
//! | expire           | 3            | seconds must be an integer ≥ 0       |
//! | ttl, persist     | 2            |                                      |
//! | select           | 2            | index in `0..=max_db_index`          |
//! | set              | 3..=7        | modifier scan from position 3        |
//! | dbsize, flushdb  | 1            |                                      |
//! | keys             | 2            |                                      |

use crate::protocol::error::CommandError;
use crate::storage::{Condition, Expiry, SetOptions};
use bytes::Bytes;

/// A validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Lowercased command name
    pub name: String,
    /// All arguments as sent, the command name included at index 0
    pub args: Vec<Bytes>,
    /// The already-validated numeric argument of INCRBY, DECRBY, EXPIRE,
    /// SELECT and HELLO
    pub number: Option<i64>,
    /// SET modifiers; None for a plain three-argument SET
    pub set_options: Option<SetOptions>,
}

impl Request {
    /// Validates a framed argument list.
    ///
    /// # Example
    ///
    /// ```
    /// use flintkv::protocol::Request;
    /// use flintkv::storage::Expiry;
    /// use bytes::Bytes;
    ///
    /// let args = ["SET", "key", "val", "EX", "100"].map(Bytes::from).to_vec();
    /// let request = Request::parse(args, 15).unwrap();
    /// assert_eq!(request.name, "set");
    /// assert_eq!(request.set_options.unwrap().expiry, Some(Expiry::Ex(100)));
    /// ```
    pub fn parse(args: Vec<Bytes>, max_db_index: usize) -> Result<Self, CommandError> {
        let name = args
            .first()
            .map(|raw| String::from_utf8_lossy(raw).to_ascii_lowercase())
            .unwrap_or_default();

        let mut request = Request {
            name,
            args,
            number: None,
            set_options: None,
        };
        request.validate(max_db_index)?;
        Ok(request)
    }

    fn validate(&mut self, max_db_index: usize) -> Result<(), CommandError> {
        let argc = self.args.len();

        match self.name.as_str() {
            "ping" | "dbsize" | "flushdb" => self.arity(argc == 1),
            "hello" => {
                if argc >= 2 {
                    self.number = Some(
                        parse_i64(&self.args[1]).ok_or(CommandError::InvalidProtocolVersion)?,
                    );
                }
                Ok(())
            }
            "get" | "incr" | "decr" | "ttl" | "persist" | "keys" => self.arity(argc == 2),
            "del" | "exists" => self.arity(argc >= 2),
            "incrby" => {
                self.arity(argc == 3)?;
                self.number = Some(parse_i64(&self.args[2]).ok_or(CommandError::InvalidIncrement)?);
                Ok(())
            }
            "decrby" => {
                self.arity(argc == 3)?;
                self.number = Some(parse_i64(&self.args[2]).ok_or(CommandError::InvalidDecrement)?);
                Ok(())
            }
            "expire" => {
                self.arity(argc == 3)?;
                let seconds = parse_i64(&self.args[2])
                    .filter(|s| *s >= 0)
                    .ok_or(CommandError::InvalidExpireTime)?;
                self.number = Some(seconds);
                Ok(())
            }
            "select" => {
                self.arity(argc == 2)?;
                let index = parse_i64(&self.args[1]).ok_or(CommandError::NotInteger)?;
                if index < 0 || index as u64 > max_db_index as u64 {
                    return Err(CommandError::DbIndexOutOfRange);
                }
                self.number = Some(index);
                Ok(())
            }
            "set" => {
                self.arity((3..=7).contains(&argc))?;
                if argc > 3 {
                    self.set_options = Some(self.scan_set_options()?);
                }
                Ok(())
            }
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }

    fn arity(&self, ok: bool) -> Result<(), CommandError> {
        if ok {
            Ok(())
        } else {
            Err(CommandError::WrongNumberArgs(self.name.clone()))
        }
    }

    /// Scans `SET key value [modifier ...]` starting at position 3.
    ///
    /// NX and XX together are rejected. A later expiry replaces an earlier one.
    fn scan_set_options(&self) -> Result<SetOptions, CommandError> {
        let mut options = SetOptions::default();
        let mut i = 3;

        while i < self.args.len() {
            let token = self.args[i].to_ascii_uppercase();

            match token.as_slice() {
                b"EX" | b"PX" | b"EXAT" | b"PXAT" => {
                    let value = self
                        .args
                        .get(i + 1)
                        .ok_or_else(|| CommandError::WrongNumberArgs(self.name.clone()))?;
                    // A deadline already in the past yields an expired record.
                    let n = parse_i64(value).ok_or(CommandError::InvalidExpireTime)?;
                    options.expiry = Some(match token.as_slice() {
                        b"EX" => Expiry::Ex(n),
                        b"PX" => Expiry::Px(n),
                        b"EXAT" => Expiry::ExAt(n),
                        _ => Expiry::PxAt(n),
                    });
                    i += 2;
                }
                b"NX" => {
                    if options.condition == Some(Condition::IfPresent) {
                        return Err(CommandError::Syntax);
                    }
                    options.condition = Some(Condition::IfAbsent);
                    i += 1;
                }
                b"XX" => {
                    if options.condition == Some(Condition::IfAbsent) {
                        return Err(CommandError::Syntax);
                    }
                    options.condition = Some(Condition::IfPresent);
                    i += 1;
                }
                b"KEEPTTL" => {
                    options.keep_ttl = true;
                    i += 1;
                }
                b"GET" => {
                    options.get = true;
                    i += 1;
                }
                _ => return Err(CommandError::WrongNumberArgs(self.name.clone())),
            }
        }

        Ok(options)
    }

    /// Argument at `index`. Only call for positions covered by validation.
    pub fn arg(&self, index: usize) -> &Bytes {
        &self.args[index]
    }

    /// Everything after the command name.
    pub fn rest(&self) -> &[Bytes] {
        &self.args[1..]
    }
}

fn parse_i64(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}
