//! Connection Handler
//!
//! Handles individual client connections: one request, one response, close.
//!
//! After the response the write half is shut down, then whatever the client
//! is still sending is read and discarded, up to a limit. Closing a
//! socket with unread input makes the kernel send RST, which can destroy the
//! response before the client reads it.

use std::io::{self, BufReader, BufWriter, ErrorKind, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TallyError};
use crate::protocol::{read_request, write_response, Response};
use crate::service::Service;

/// Most unread request bytes discarded before closing
const DRAIN_LIMIT: u64 = 256 * 1024;

/// Read timeout while discarding unread request bytes
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    service: Arc<Service>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O
    pub fn new(stream: TcpStream, service: Arc<Service>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            service,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = no timeout)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Serve the single request on this connection
    ///
    /// Read and decode failures get a best-effort error response. Only a
    /// failure to write the response is returned as an error.
    pub fn handle(&mut self) -> Result<()> {
        let response = match read_request(&mut self.reader) {
            Ok(body) => {
                tracing::trace!(peer = %self.peer_addr, bytes = body.len(), "request received");
                self.service.handle(&body)
            }
            Err(TallyError::Io(ref e)) if is_disconnect(e.kind()) => {
                tracing::debug!(peer = %self.peer_addr, "client closed before sending a request");
                return Ok(());
            }
            Err(TallyError::Io(ref e)) if is_timeout(e.kind()) => {
                tracing::debug!(peer = %self.peer_addr, "read timeout");
                let error = TallyError::Protocol("timed out reading request".to_string());
                if self.send(&Response::error(&error)).is_ok() {
                    self.close();
                }
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(peer = %self.peer_addr, error = %e, "bad request");
                // The body may be partly or entirely unread
                if self.send(&Response::error(&e)).is_ok() {
                    self.close();
                }
                return Ok(());
            }
        };

        match self.send(&response) {
            Ok(()) => {
                self.close();
                Ok(())
            }
            Err(TallyError::Io(ref e)) if is_disconnect(e.kind()) => {
                tracing::debug!(
                    peer = %self.peer_addr,
                    "client disconnected before the response was sent"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn send(&mut self, response: &Response) -> Result<()> {
        write_response(&mut self.writer, response.status, &response.to_json())
    }

    /// Signal end of response, then discard leftover input so the close is
    /// graceful
    fn close(&mut self) {
        let stream = self.writer.get_ref();
        if stream.shutdown(Shutdown::Write).is_err() {
            return;
        }
        if stream.set_read_timeout(Some(DRAIN_TIMEOUT)).is_err() {
            return;
        }
        let discarded = io::copy(&mut (&mut self.reader).take(DRAIN_LIMIT), &mut io::sink());
        if let Ok(n) = discarded {
            if n > 0 {
                tracing::trace!(peer = %self.peer_addr, bytes = n, "discarded unread input");
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}

/// Unix reports a read timeout as `WouldBlock`, Windows as `TimedOut`
fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
