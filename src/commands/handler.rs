//! Command Dispatcher
//!
//! Maps a validated [`Request`] onto keyspace operations and turns the result
//! into a [`RespValue`].
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `SET key value [EX s|PX ms|EXAT ts|PXAT ms-ts] [NX|XX] [KEEPTTL] [GET]`
//! - `GET key`
//! - `DEL key [key ...]` / `EXISTS key [key ...]`
//! - `INCR key` / `INCRBY key increment`
//! - `DECR key` / `DECRBY key decrement`
//!
//! ### Key Commands
//! - `EXPIRE key seconds` / `TTL key` / `PERSIST key`
//! - `KEYS pattern`
//!
//! ### Server Commands
//! - `PING`, `HELLO [protover]`, `SELECT index`, `DBSIZE`, `FLUSHDB`
//!
//! ## Per-Connection State
//!
//! The only state a connection carries between requests is its [`Session`]:
//! the selected database index. It is owned by the connection task and passed
//! in by `&mut` on every call, so connections never see each other's index.

use crate::protocol::{CommandError, Request, RespValue};
use crate::storage::{Databases, Keyspace, SetOutcome};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Connection-scoped dispatcher state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    /// Client id reported by HELLO
    id: u64,
    /// Index of the selected keyspace
    db: usize,
}

impl Session {
    pub fn new(id: u64) -> Self {
        Self { id, db: 0 }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The currently selected database index.
    pub fn db(&self) -> usize {
        self.db
    }
}

/// Executes requests against the shared database set.
///
/// Cheap to clone: every connection gets its own handle to the same
/// `Arc<Databases>`.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    databases: Arc<Databases>,
}

impl CommandHandler {
    pub fn new(databases: Arc<Databases>) -> Self {
        Self { databases }
    }

    pub fn databases(&self) -> &Arc<Databases> {
        &self.databases
    }

    /// Executes one request and returns the reply to send.
    pub fn execute(&self, session: &mut Session, request: &Request) -> RespValue {
        trace!(db = session.db, command = %request.name, "Dispatching command");

        let Some(keyspace) = self.databases.get(session.db) else {
            return error_reply(CommandError::DbIndexOutOfRange);
        };

        match request.name.as_str() {
            "ping" => RespValue::pong(),
            "hello" => cmd_hello(session, request),
            "select" => self.cmd_select(session, request),

            "set" => cmd_set(keyspace, request),
            "get" => cmd_get(keyspace, request),
            "del" => RespValue::integer(keyspace.del(request.rest()) as i64),
            "exists" => RespValue::integer(keyspace.exists(request.rest()) as i64),
            "incr" => counter_reply(keyspace.incr_by(request.arg(1), 1)),
            "decr" => counter_reply(keyspace.decr_by(request.arg(1), 1)),
            "incrby" => match request.number {
                Some(delta) => counter_reply(keyspace.incr_by(request.arg(1), delta)),
                None => error_reply(CommandError::InvalidIncrement),
            },
            "decrby" => match request.number {
                Some(delta) => counter_reply(keyspace.decr_by(request.arg(1), delta)),
                None => error_reply(CommandError::InvalidDecrement),
            },

            "ttl" => match keyspace.ttl(request.arg(1)) {
                Ok(Some(seconds)) => RespValue::integer(seconds),
                Ok(None) => RespValue::integer(-1),
                Err(e) => RespValue::error(e.to_string()),
            },
            "expire" => match request.number {
                Some(seconds) => counter_reply(keyspace.expire(request.arg(1), seconds)),
                None => error_reply(CommandError::InvalidExpireTime),
            },
            "persist" => counter_reply(keyspace.persist(request.arg(1))),

            "keys" => RespValue::bulk_array(keyspace.keys_matching(request.arg(1))),
            "dbsize" => RespValue::integer(keyspace.len() as i64),
            "flushdb" => {
                keyspace.flush();
                RespValue::ok()
            }

            _ => error_reply(CommandError::UnknownCommand(request.name.clone())),
        }
    }

    /// SELECT index
    fn cmd_select(&self, session: &mut Session, request: &Request) -> RespValue {
        match request.number {
            Some(index) if index >= 0 && self.databases.get(index as usize).is_some() => {
                session.db = index as usize;
                debug!(session = session.id, db = session.db, "Database selected");
                RespValue::ok()
            }
            _ => error_reply(CommandError::DbIndexOutOfRange),
        }
    }
}

fn error_reply(error: CommandError) -> RespValue {
    RespValue::error(error.to_string())
}

fn counter_reply<E: ToString>(result: Result<i64, E>) -> RespValue {
    match result {
        Ok(n) => RespValue::integer(n),
        Err(e) => RespValue::error(e.to_string()),
    }
}

/// GET key
fn cmd_get(keyspace: &Keyspace, request: &Request) -> RespValue {
    match keyspace.get(request.arg(1)) {
        Some(value) => RespValue::bulk_string(value),
        None => RespValue::null(),
    }
}

/// SET key value [modifiers]
fn cmd_set(keyspace: &Keyspace, request: &Request) -> RespValue {
    let key = request.arg(1).clone();
    let value = request.arg(2).clone();

    let Some(options) = request.set_options else {
        keyspace.set(key, value);
        return RespValue::ok();
    };

    match keyspace.set_conditional(key, value, &options) {
        Ok(SetOutcome::Applied { previous }) if options.get => match previous {
            Some(old) => RespValue::bulk_string(old),
            None => RespValue::null(),
        },
        Ok(SetOutcome::Applied { .. }) => RespValue::ok(),
        Ok(SetOutcome::NotApplied) => RespValue::null(),
        Err(e) => RespValue::error(e.to_string()),
    }
}

/// HELLO [protover]
fn cmd_hello(session: &Session, request: &Request) -> RespValue {
    match request.number {
        None | Some(2) => RespValue::raw(hello_payload(session, 2)),
        Some(3) => RespValue::raw(hello_payload(session, 3)),
        Some(_) => RespValue::error("NOPROTO unsupported protocol version"),
    }
}

/// The canned HELLO greeting: a flat array for RESP2, a map for RESP3.
fn hello_payload(session: &Session, proto: i64) -> Bytes {
    use crate::protocol::types::{prefix, write_bulk, write_header};

    let mut buf = Vec::with_capacity(128);
    let header = if proto == 3 { prefix::MAP } else { prefix::ARRAY };
    write_header(&mut buf, header, if proto == 3 { 7 } else { 14 });

    write_bulk(&mut buf, b"server");
    write_bulk(&mut buf, b"flintkv");
    write_bulk(&mut buf, b"version");
    write_bulk(&mut buf, crate::VERSION.as_bytes());
    write_bulk(&mut buf, b"proto");
    write_header(&mut buf, prefix::INTEGER, proto);
    write_bulk(&mut buf, b"id");
    write_header(&mut buf, prefix::INTEGER, session.id as i64);
    write_bulk(&mut buf, b"mode");
    write_bulk(&mut buf, b"standalone");
    write_bulk(&mut buf, b"role");
    write_bulk(&mut buf, b"master");
    write_bulk(&mut buf, b"modules");
    write_header(&mut buf, prefix::ARRAY, 0);

    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_MAX_DB_INDEX;
    use std::thread;
    use std::time::Duration;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(Databases::new(DEFAULT_MAX_DB_INDEX)))
    }

    fn make_command(args: &[&str]) -> Request {
        let args = args.iter().map(|s| Bytes::from(s.to_string())).collect();
        Request::parse(args, DEFAULT_MAX_DB_INDEX).unwrap()
    }

    fn run(handler: &CommandHandler, session: &mut Session, args: &[&str]) -> RespValue {
        handler.execute(session, &make_command(args))
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();
        let mut session = Session::default();
        assert_eq!(run(&handler, &mut session, &["PING"]), RespValue::pong());
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();
        let mut session = Session::default();

        assert_eq!(
            run(&handler, &mut session, &["SET", "key", "value"]),
            RespValue::ok()
        );
        assert_eq!(
            run(&handler, &mut session, &["GET", "key"]),
            RespValue::bulk_string(Bytes::from("value"))
        );
        assert_eq!(
            run(&handler, &mut session, &["GET", "nonexistent"]),
            RespValue::null()
        );
    }

    #[test]
    fn test_conditional_set_replies() {
        let handler = create_handler();
        let mut session = Session::default();

        assert_eq!(
            run(&handler, &mut session, &["SET", "k", "v1", "NX"]),
            RespValue::ok()
        );
        assert_eq!(
            run(&handler, &mut session, &["SET", "k", "v2", "NX"]),
            RespValue::null()
        );
        assert_eq!(
            run(&handler, &mut session, &["SET", "missing", "v", "XX"]),
            RespValue::null()
        );
        assert_eq!(
            run(&handler, &mut session, &["SET", "k", "v3", "GET"]),
            RespValue::bulk_string(Bytes::from("v1"))
        );
        assert_eq!(
            run(&handler, &mut session, &["SET", "fresh", "v", "GET"]),
            RespValue::null()
        );
        assert_eq!(
            run(&handler, &mut session, &["SET", "k", "v4", "NX", "GET"]),
            RespValue::error("ERR syntax error")
        );
        assert_eq!(
            run(&handler, &mut session, &["GET", "k"]),
            RespValue::bulk_string(Bytes::from("v3"))
        );
    }

    #[test]
    fn test_set_px_expires() {
        let handler = create_handler();
        let mut session = Session::default();

        run(&handler, &mut session, &["SET", "k", "v", "PX", "20"]);
        assert_eq!(
            run(&handler, &mut session, &["EXISTS", "k"]),
            RespValue::integer(1)
        );
        thread::sleep(Duration::from_millis(40));
        assert_eq!(run(&handler, &mut session, &["GET", "k"]), RespValue::null());
    }

    #[test]
    fn test_set_with_past_deadline_is_absent() {
        let handler = create_handler();
        let mut session = Session::default();

        assert_eq!(
            run(&handler, &mut session, &["SET", "k", "v", "PX", "0"]),
            RespValue::ok()
        );
        assert_eq!(run(&handler, &mut session, &["GET", "k"]), RespValue::null());
        assert_eq!(
            run(&handler, &mut session, &["SET", "old", "v", "EXAT", "1"]),
            RespValue::ok()
        );
        assert_eq!(
            run(&handler, &mut session, &["EXISTS", "k", "old"]),
            RespValue::integer(0)
        );
    }

    #[test]
    fn test_del_exists() {
        let handler = create_handler();
        let mut session = Session::default();

        run(&handler, &mut session, &["SET", "key1", "value1"]);
        run(&handler, &mut session, &["SET", "key2", "value2"]);

        assert_eq!(
            run(&handler, &mut session, &["EXISTS", "key1", "key2", "key3"]),
            RespValue::integer(2)
        );
        assert_eq!(
            run(&handler, &mut session, &["DEL", "key1", "key3"]),
            RespValue::integer(1)
        );
        assert_eq!(
            run(&handler, &mut session, &["EXISTS", "key1"]),
            RespValue::integer(0)
        );
    }

    #[test]
    fn test_counters() {
        let handler = create_handler();
        let mut session = Session::default();

        assert_eq!(run(&handler, &mut session, &["INCR", "ctr"]), RespValue::integer(1));
        assert_eq!(run(&handler, &mut session, &["INCR", "ctr"]), RespValue::integer(2));
        assert_eq!(
            run(&handler, &mut session, &["INCRBY", "ctr", "10"]),
            RespValue::integer(12)
        );
        assert_eq!(run(&handler, &mut session, &["DECR", "ctr"]), RespValue::integer(11));
        assert_eq!(
            run(&handler, &mut session, &["DECRBY", "ctr", "20"]),
            RespValue::integer(-9)
        );

        run(&handler, &mut session, &["SET", "word", "abc"]);
        assert_eq!(
            run(&handler, &mut session, &["INCR", "word"]),
            RespValue::error("ERR value is not an integer or out of range")
        );
    }

    #[test]
    fn test_ttl_expire_persist() {
        let handler = create_handler();
        let mut session = Session::default();

        let not_found = RespValue::error("ERR key not found");
        assert_eq!(run(&handler, &mut session, &["TTL", "k"]), not_found);
        assert_eq!(run(&handler, &mut session, &["EXPIRE", "k", "10"]), not_found);
        assert_eq!(run(&handler, &mut session, &["PERSIST", "k"]), not_found);

        run(&handler, &mut session, &["SET", "k", "v"]);
        assert_eq!(run(&handler, &mut session, &["TTL", "k"]), RespValue::integer(-1));
        assert_eq!(
            run(&handler, &mut session, &["EXPIRE", "k", "100"]),
            RespValue::integer(1)
        );
        assert_eq!(run(&handler, &mut session, &["TTL", "k"]), RespValue::integer(100));
        assert_eq!(run(&handler, &mut session, &["PERSIST", "k"]), RespValue::integer(1));
        assert_eq!(run(&handler, &mut session, &["PERSIST", "k"]), RespValue::integer(0));
    }

    #[test]
    fn test_select_isolates_databases() {
        let handler = create_handler();
        let mut session = Session::default();
        let mut other = Session::default();

        run(&handler, &mut session, &["SET", "k", "zero"]);
        assert_eq!(run(&handler, &mut session, &["SELECT", "1"]), RespValue::ok());
        assert_eq!(session.db(), 1);
        assert_eq!(run(&handler, &mut session, &["GET", "k"]), RespValue::null());

        run(&handler, &mut session, &["SET", "k", "one"]);

        // A second connection still sees database 0.
        assert_eq!(other.db(), 0);
        assert_eq!(
            run(&handler, &mut other, &["GET", "k"]),
            RespValue::bulk_string(Bytes::from("zero"))
        );

        run(&handler, &mut session, &["SELECT", "0"]);
        assert_eq!(
            run(&handler, &mut session, &["GET", "k"]),
            RespValue::bulk_string(Bytes::from("zero"))
        );
    }

    #[test]
    fn test_select_beyond_handler_databases() {
        // Parser allows up to 15, but this handler only has 2 databases.
        let handler = CommandHandler::new(Arc::new(Databases::new(1)));
        let mut session = Session::default();

        assert_eq!(
            run(&handler, &mut session, &["SELECT", "5"]),
            RespValue::error("ERR DB index is out of range")
        );
        assert_eq!(session.db(), 0);
    }

    #[test]
    fn test_keys_dbsize_flushdb() {
        let handler = create_handler();
        let mut session = Session::default();

        run(&handler, &mut session, &["SET", "user:1", "a"]);
        run(&handler, &mut session, &["SET", "other", "b"]);

        assert_eq!(run(&handler, &mut session, &["DBSIZE"]), RespValue::integer(2));
        assert_eq!(
            run(&handler, &mut session, &["KEYS", "user:*"]),
            RespValue::raw(Bytes::from_static(b"*1\r\n$6\r\nuser:1\r\n"))
        );
        assert_eq!(run(&handler, &mut session, &["FLUSHDB"]), RespValue::ok());
        assert_eq!(run(&handler, &mut session, &["DBSIZE"]), RespValue::integer(0));
    }

    #[test]
    fn test_hello() {
        let handler = create_handler();
        let mut session = Session::new(7);

        let RespValue::Raw(resp2) = run(&handler, &mut session, &["HELLO"]) else {
            panic!("expected raw reply");
        };
        assert!(resp2.starts_with(b"*14\r\n$6\r\nserver\r\n$7\r\nflintkv\r\n"));
        assert!(resp2.ends_with(b"$2\r\nid\r\n:7\r\n$4\r\nmode\r\n$10\r\nstandalone\r\n$4\r\nrole\r\n$6\r\nmaster\r\n$7\r\nmodules\r\n*0\r\n"));

        let RespValue::Raw(resp3) = run(&handler, &mut session, &["HELLO", "3"]) else {
            panic!("expected raw reply");
        };
        assert!(resp3.starts_with(b"%7\r\n"));
        assert!(resp3.windows(4).any(|w| w == b":3\r\n"));

        assert_eq!(
            run(&handler, &mut session, &["HELLO", "4"]),
            RespValue::error("NOPROTO unsupported protocol version")
        );
    }
}
