//! GlowKV interactive client.
//!
//! A minimal REPL for the line protocol: reads one command per line from
//! stdin, sends it, prints the single response line. Connection setup has a
//! 3-second timeout and every send/receive a 10-second deadline. A read
//! timeout is reported and the session continues on the same connection;
//! any other I/O failure ends the client.

use anyhow::Context;
use std::io::Write as _;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Timeout for the initial connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for each write/read against the server.
const IO_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("{}:{}", glowkv::DEFAULT_HOST, glowkv::DEFAULT_PORT));

    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
        .await
        .with_context(|| format!("timed out connecting to {}", addr))?
        .with_context(|| format!("failed to connect to {}", addr))?;
    eprintln!("connected to {}", addr);

    let (read_half, mut write_half) = stream.into_split();
    let mut server = BufReader::new(read_half);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("stdout flush failed")?;

        let line = match stdin.next_line().await.context("stdin error")? {
            Some(line) => line,
            // EOF on stdin: done.
            None => return Ok(()),
        };
        if line.is_empty() {
            continue;
        }

        // Send the line with a deadline.
        let send = async {
            write_half.write_all(line.as_bytes()).await?;
            write_half.write_all(b"\n").await?;
            Ok::<_, std::io::Error>(())
        };
        timeout(IO_TIMEOUT, send)
            .await
            .context("write timed out")?
            .context("write error")?;

        // Read exactly one response line with a deadline.
        let mut response = String::new();
        match timeout(IO_TIMEOUT, server.read_line(&mut response)).await {
            Err(_) => {
                eprintln!(
                    "read timeout ({}s) waiting for server response",
                    IO_TIMEOUT.as_secs()
                );
                continue;
            }
            Ok(Ok(0)) => {
                eprintln!("server closed the connection");
                return Ok(());
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e).context("read error"),
        }

        let response = response.trim_end_matches(['\r', '\n']);
        println!("{}", response);

        // After a successful ESC the server closes its side; exit the REPL.
        // Any line prefixed with "ERR" (case-insensitive) is an error.
        if line.trim().eq_ignore_ascii_case("ESC")
            && !response.to_uppercase().starts_with("ERR")
        {
            return Ok(());
        }
    }
}
