//! Framed I/O for the IMAP protocol.
//!
//! IMAP responses are CRLF-terminated lines, except that a line ending in
//! a literal header `{n}` continues with n raw bytes and then more line.
//! One call to [`FramedStream::read_response`] returns one whole response.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length (outside literals).
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Maximum literal size.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Framed connection for the IMAP protocol.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    io_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream. Reads are bounded by `io_timeout`.
    pub fn new(stream: S, io_timeout: Option<Duration>) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            io_timeout,
        }
    }

    /// Returns the read timeout.
    pub const fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// Sets the read timeout.
    pub const fn set_io_timeout(&mut self, io_timeout: Option<Duration>) {
        self.io_timeout = io_timeout;
    }

    /// Reads one complete response, embedded literals included.
    pub async fn read_response(&mut self) -> Result<Bytes> {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_response_inner())
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.read_response_inner().await,
        }
    }

    async fn read_response_inner(&mut self) -> Result<Bytes> {
        let mut response = BytesMut::new();

        loop {
            self.read_line(&mut response).await?;

            let Some(literal_len) = parse_literal_length(&response) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }

            let start = response.len();
            response.resize(start + literal_len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response.freeze())
    }

    /// Appends one CRLF-terminated line to `out`.
    async fn read_line(&mut self, out: &mut BytesMut) -> Result<()> {
        let mut line_len = 0;

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // A CR may end one read and its LF start the next
            let pending_cr = out.last() == Some(&b'\r') && line_len > 0;
            if pending_cr && buf[0] == b'\n' {
                out.extend_from_slice(&buf[..1]);
                self.reader.consume(1);
                return Ok(());
            }

            if let Some(pos) = find_crlf(buf) {
                out.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                return Ok(());
            }

            let len = buf.len();
            out.extend_from_slice(buf);
            self.reader.consume(len);
            line_len += len;

            if line_len > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes data to the stream and flushes it.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns true if the server sent bytes that have not been read yet.
    pub fn has_buffered_data(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// Shuts down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Consumes the framed stream and returns the inner stream. Buffered
    /// data is lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses the literal length from the end of a line: `{123}\r\n` or
/// `{123+}\r\n`.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;

    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
