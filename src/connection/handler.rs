//! Connection Handler
//!
//! Each client gets its own handler task that runs in a loop, framing
//! requests out of a read buffer and writing one reply per request.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects
//!        │
//!        ▼
//! 2. ConnectionHandler spawned (Session db = 0)
//!        │
//!        ▼
//! 3. ┌───────────────────────────────────┐
//!    │  parse_frame(buffer)              │
//!    │    ├─ Some  -> validate, execute, │
//!    │    │          reply, flush        │
//!    │    ├─ None  -> read more bytes    │
//!    │    └─ Err   -> error reply, close │
//!    │  Request::parse fails (fatal)     │
//!    │             -> error reply, close │
//!    └───────────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / malformed request
//! ```
//!
//! ## Error Tiers
//!
//! Malformed framing and malformed arguments (arity, flags, numbers) get an
//! error reply, which is flushed before the connection is closed. An unknown
//! command, a conflicting flag combination, or an error raised while
//! executing (missing key, non-integer value) only gets the error reply and
//! the connection keeps going.

use crate::commands::{CommandHandler, Session};
use crate::protocol::{parse_frame, CommandError, FrameError, Request, RespValue, MAX_BULK_SIZE};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace, warn};

/// One maximal argument plus room for the surrounding headers.
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests answered, including rejected ones
    pub commands_processed: AtomicU64,
    /// Connections closed because of a malformed request
    pub protocol_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection and returns its id (starting at 1).
    pub fn connection_opened(&self) -> u64 {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.connections_accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the same loop serves TCP sockets and the
/// in-memory streams used in tests.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet framed
    buffer: BytesMut,

    command_handler: CommandHandler,

    /// Per-connection dispatcher state
    session: Session,

    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let id = stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            session: Session::new(id),
            stats,
        }
    }

    /// Runs the connection until the client goes away or sends a malformed
    /// request.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, id = self.session.id(), "Client connected");

        let result = match self.main_loop().await {
            Err(ConnectionError::ClientDisconnected) => Ok(()),
            other => other,
        };

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.handle_one_request().await?;
        }
    }

    /// Frames, executes and answers the next request, reading from the
    /// socket as many times as needed.
    pub async fn handle_one_request(&mut self) -> Result<(), ConnectionError> {
        let args = loop {
            match parse_frame(&self.buffer) {
                Ok(Some((args, consumed))) => {
                    self.buffer.advance(consumed);
                    trace!(
                        client = %self.addr,
                        consumed = consumed,
                        remaining = self.buffer.len(),
                        "Framed request"
                    );
                    break args;
                }
                Ok(None) => self.read_more_data().await?,
                Err(e) => return self.close_with(ConnectionError::Frame(e)).await,
            }
        };

        self.stats.command_processed();
        let max_db_index = self.command_handler.databases().max_index();
        let response = match Request::parse(args, max_db_index) {
            Ok(request) => self.command_handler.execute(&mut self.session, &request),
            Err(e) if e.is_fatal() => return self.close_with(ConnectionError::Command(e)).await,
            Err(e) => {
                debug!(client = %self.addr, error = ?e, "Rejected request");
                RespValue::error(e.to_string())
            }
        };

        self.send_response(&response).await
    }

    /// Replies with the error text, then ends the connection with `error`.
    async fn close_with(&mut self, error: ConnectionError) -> Result<(), ConnectionError> {
        let reply = match &error {
            ConnectionError::Frame(e) => RespValue::error(e.to_string()),
            ConnectionError::Command(e) => RespValue::error(e.to_string()),
            _ => return Err(error),
        };

        warn!(client = %self.addr, error = ?error, "Malformed request");
        self.stats.protocol_error();
        self.send_response(&reply).await?;
        Err(error)
    }

    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, reply = %response, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client sent bytes that are not a request frame
    #[error("Protocol error: {0}")]
    Frame(#[from] FrameError),

    /// The request's arguments were malformed
    #[error("Invalid request: {0}")]
    Command(#[from] CommandError),

    #[error("Client disconnected")]
    ClientDisconnected,

    /// The stream ended in the middle of a request
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Creates a [`ConnectionHandler`] and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}
