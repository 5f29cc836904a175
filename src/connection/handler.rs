//! Per-Connection Line Loop
//!
//! Reads raw bytes into a `BytesMut` buffer, splits off complete
//! `\n`-terminated lines, and feeds each one to the command engine. TCP is a
//! stream, so a single read may carry half a line or several lines at once;
//! the buffer absorbs both cases and the loop only ever acts on whole lines.
//!
//! Per line:
//!
//! 1. Strip the trailing `\n` (and `\r`, for clients that send CRLF).
//! 2. Ignore empty lines.
//! 3. Lines longer than [`COMMAND_MAX_LEN`] are answered with
//!    `ERR: command too long`.
//! 4. A line with no extractable command word is answered with
//!    `ERR: empty command`.
//! 5. `ESC` (case-insensitive) is answered with `closing connection.` and
//!    the connection closes.
//! 6. Everything else goes through the command engine; the reply is the
//!    result (or `OK` for an empty result), or `ERR: <message>`.
//!
//! Every reply is flushed before the next line is considered.

use crate::commands::CommandHandler;
use crate::protocol::cut_simple;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Longest accepted request line, in bytes (terminator excluded).
pub const COMMAND_MAX_LEN: usize = 2048;

/// Hard cap for the read buffer; a client that streams this much without a
/// newline gets disconnected.
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial read buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// What to do after a line has been answered.
enum LineOutcome {
    Continue,
    Close,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command engine (cheap clone per connection)
    commands: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            commands,
            stats,
        }
    }

    /// Runs the connection loop until the client goes away, `ESC` closes
    /// the connection, or an error ends it.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::Io(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-split-execute-reply loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(line) = self.next_line() {
                match self.handle_line(&line).await? {
                    LineOutcome::Continue => {}
                    LineOutcome::Close => return Ok(()),
                }
            }

            // No complete line buffered; read more from the socket.
            self.read_more_data().await?;
        }
    }

    /// Splits the next complete line off the buffer, with the trailing
    /// `\n` (and optional `\r`) removed.
    fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line = self.buffer.split_to(pos + 1);

        line.truncate(line.len() - 1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Answers one request line.
    async fn handle_line(&mut self, line: &str) -> Result<LineOutcome, ConnectionError> {
        // Empty lines are ignored, not answered.
        if line.is_empty() {
            return Ok(LineOutcome::Continue);
        }

        trace!(client = %self.addr, line, "Received command line");

        if line.len() > COMMAND_MAX_LEN {
            self.reply("ERR: command too long").await?;
            return Ok(LineOutcome::Continue);
        }

        let word = match cut_simple(line) {
            Ok((word, _)) => word,
            Err(_) => {
                self.reply("ERR: empty command").await?;
                return Ok(LineOutcome::Continue);
            }
        };

        if word.eq_ignore_ascii_case("ESC") {
            self.reply("closing connection.").await?;
            return Ok(LineOutcome::Close);
        }

        self.stats.command_processed();

        let reply = match self.commands.execute(line) {
            Ok(result) if result.is_empty() => "OK".to_string(),
            Ok(result) => result,
            Err(e) => format!("ERR: {}", e),
        };
        self.reply(&reply).await?;
        Ok(LineOutcome::Continue)
    }

    /// Writes one `\n`-terminated reply line and flushes it.
    async fn reply(&mut self, msg: &str) -> Result<(), ConnectionError> {
        self.stream.write_all(msg.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;
        self.stats.bytes_written(msg.len() + 1);
        trace!(client = %self.addr, reply = msg, "Sent reply");
        Ok(())
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(
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
            // Connection closed by client.
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            // Partial line left behind.
            return Err(ConnectionError::UnexpectedEof);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial line)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
///
/// Convenience wrapper for the accept loop: builds a [`ConnectionHandler`]
/// and runs it, downgrading routine disconnects to debug logs.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, commands, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ExpirationIndex, Keyspace, Reaper, ReaperConfig};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::net::TcpListener;

    struct TestServer {
        addr: SocketAddr,
        stats: Arc<ConnectionStats>,
        _reaper: Reaper,
    }

    async fn create_test_server() -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let keyspace = Arc::new(Keyspace::new());
        let expirations = Arc::new(ExpirationIndex::new());
        let stats = Arc::new(ConnectionStats::new());

        let reaper = Reaper::start(
            Arc::clone(&keyspace),
            Arc::clone(&expirations),
            ReaperConfig {
                idle_interval: Duration::from_millis(20),
            },
        );

        let commands = CommandHandler::new(keyspace, expirations);
        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let commands = commands.clone();
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, commands, stats));
            }
        });

        TestServer {
            addr,
            stats,
            _reaper: reaper,
        }
    }

    async fn connect(
        addr: SocketAddr,
    ) -> (BufReader<OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        (BufReader::new(read_half), write_half)
    }

    async fn send(writer: &mut tokio::net::tcp::OwnedWriteHalf, line: &str) {
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
    }

    async fn recv(reader: &mut BufReader<OwnedReadHalf>) -> String {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "server closed the connection unexpectedly");
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    #[tokio::test]
    async fn basic_set_get_del_cycle() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        send(&mut writer, "SET foo bar").await;
        assert_eq!(recv(&mut reader).await, "OK");

        send(&mut writer, "GET foo").await;
        assert_eq!(recv(&mut reader).await, "bar");

        send(&mut writer, "DEL foo").await;
        assert_eq!(recv(&mut reader).await, "OK");

        send(&mut writer, "GET foo").await;
        assert_eq!(recv(&mut reader).await, "ERR: No such KEY is present: foo");
    }

    #[tokio::test]
    async fn quoted_value_keeps_its_quotes() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        send(&mut writer, "SET greeting \"hello world\"").await;
        assert_eq!(recv(&mut reader).await, "OK");

        send(&mut writer, "GET greeting").await;
        assert_eq!(recv(&mut reader).await, "\"hello world\"");
    }

    #[tokio::test]
    async fn json_block_value_round_trips() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        send(&mut writer, r#"SET cfg {"a":1,"b":[2,3]}"#).await;
        assert_eq!(recv(&mut reader).await, "OK");

        send(&mut writer, "GET cfg").await;
        assert_eq!(recv(&mut reader).await, r#"{"a":1,"b":[2,3]}"#);
    }

    #[tokio::test]
    async fn expired_key_disappears() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        // TTL of zero seconds: due immediately, evicted by the next reaper
        // pass.
        send(&mut writer, "SET t v 0").await;
        assert_eq!(recv(&mut reader).await, "OK");

        tokio::time::sleep(Duration::from_millis(200)).await;

        send(&mut writer, "GET t").await;
        assert_eq!(recv(&mut reader).await, "ERR: No such KEY is present: t");
    }

    #[tokio::test]
    async fn setexp_paths() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        send(&mut writer, "SET k v").await;
        assert_eq!(recv(&mut reader).await, "OK");

        send(&mut writer, "SETEXP k 3600").await;
        assert_eq!(recv(&mut reader).await, "OK");

        send(&mut writer, "SETEXP nope 10").await;
        assert_eq!(
            recv(&mut reader).await,
            "ERR: you tried to update expiration for a non existing key"
        );
    }

    #[tokio::test]
    async fn esc_closes_the_connection() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        send(&mut writer, "PING").await;
        assert_eq!(recv(&mut reader).await, "PONG");

        send(&mut writer, "esc").await;
        assert_eq!(recv(&mut reader).await, "closing connection.");

        // The server side is closed now; the next read sees end-of-stream.
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn blank_lines_are_ignored_and_whitespace_is_an_empty_command() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        // A bare newline gets no reply at all; the next real command gets
        // exactly one.
        writer.write_all(b"\nPING\n").await.unwrap();
        assert_eq!(recv(&mut reader).await, "PONG");

        send(&mut writer, "   \t ").await;
        assert_eq!(recv(&mut reader).await, "ERR: empty command");
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        send(&mut writer, "BOGUS arg").await;
        assert_eq!(recv(&mut reader).await, "ERR: unknown command: BOGUS");
    }

    #[tokio::test]
    async fn parse_error_is_reported() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        send(&mut writer, "SET k \"unterminated").await;
        assert_eq!(
            recv(&mut reader).await,
            "ERR: command parsing error: malformed token"
        );
    }

    #[tokio::test]
    async fn over_long_line_is_rejected() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        let long_line = format!("SET k {}", "x".repeat(COMMAND_MAX_LEN));
        send(&mut writer, &long_line).await;
        assert_eq!(recv(&mut reader).await, "ERR: command too long");

        // The connection is still usable.
        send(&mut writer, "PING").await;
        assert_eq!(recv(&mut reader).await, "PONG");
    }

    #[tokio::test]
    async fn crlf_line_endings_are_tolerated() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        writer.write_all(b"SET k v\r\nGET k\r\n").await.unwrap();
        assert_eq!(recv(&mut reader).await, "OK");
        assert_eq!(recv(&mut reader).await, "v");
    }

    #[tokio::test]
    async fn pipelined_commands_get_ordered_replies() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        writer
            .write_all(b"SET a 1\nSET b 2\nGET a\nGET b\n")
            .await
            .unwrap();

        assert_eq!(recv(&mut reader).await, "OK");
        assert_eq!(recv(&mut reader).await, "OK");
        assert_eq!(recv(&mut reader).await, "1");
        assert_eq!(recv(&mut reader).await, "2");
    }

    #[tokio::test]
    async fn connection_stats_track_activity() {
        let server = create_test_server().await;
        let (mut reader, mut writer) = connect(server.addr).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            server.stats.connections_accepted.load(Ordering::Relaxed),
            1
        );
        assert_eq!(server.stats.active_connections.load(Ordering::Relaxed), 1);

        send(&mut writer, "PING").await;
        assert_eq!(recv(&mut reader).await, "PONG");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(server.stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(server.stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(server.stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(writer);
        drop(reader);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
