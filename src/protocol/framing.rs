//! Message framing
//!
//! ## Wire Format
//! ```text
//! POST / HTTP/1.1\r\n           request line (free-form) or status line
//! Content-Type: application/json\r\n
//! Content-Length: 42\r\n         required, decimal, case-insensitive name
//! \r\n                           end of headers
//! {"action":"query",...}        exactly Content-Length bytes
//! ```
//!
//! One message each way per connection.

use std::io::{BufRead, ErrorKind, Read, Write};

use crate::error::{Result, TallyError};

use super::Status;

/// Maximum size of the start line plus all headers (8 KiB)
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

/// Maximum body size (16 MiB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// Reading
// =============================================================================

/// Read one request and return its body
///
/// A clean EOF before the first byte comes back as an `Io` error of kind
/// `UnexpectedEof`; every malformed or short message is a `Protocol` error.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let (_request_line, body) = read_message(reader)?;
    Ok(body)
}

/// Read one response and return its status code and body
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<(u16, Vec<u8>)> {
    let (status_line, body) = read_message(reader)?;

    let code = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| TallyError::Protocol(format!("bad status line: {:?}", status_line)))?;

    Ok((code, body))
}

fn read_message<R: BufRead>(reader: &mut R) -> Result<(String, Vec<u8>)> {
    let mut header_bytes = 0usize;
    let mut start_line: Option<String> = None;
    let mut content_length: Option<usize> = None;
    let mut line = Vec::new();

    loop {
        line.clear();
        let budget = (MAX_HEADER_SIZE - header_bytes) as u64 + 1;
        let n = reader.by_ref().take(budget).read_until(b'\n', &mut line)?;

        if n == 0 {
            return Err(if start_line.is_none() && header_bytes == 0 {
                TallyError::Io(ErrorKind::UnexpectedEof.into())
            } else {
                TallyError::Protocol("connection closed inside headers".to_string())
            });
        }

        header_bytes += n;
        if header_bytes > MAX_HEADER_SIZE {
            return Err(TallyError::Protocol(format!(
                "headers exceed {} bytes",
                MAX_HEADER_SIZE
            )));
        }
        if line.last() != Some(&b'\n') {
            return Err(TallyError::Protocol(
                "connection closed inside headers".to_string(),
            ));
        }

        let text = std::str::from_utf8(&line)
            .map_err(|_| TallyError::Protocol("headers are not UTF-8".to_string()))?
            .trim_end_matches(['\r', '\n']);

        if start_line.is_none() {
            start_line = Some(text.to_string());
            continue;
        }
        if text.is_empty() {
            break;
        }

        let Some((name, value)) = text.split_once(':') else {
            return Err(TallyError::Protocol(format!("malformed header: {:?}", text)));
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let length = value.trim().parse::<usize>().map_err(|_| {
                TallyError::Protocol(format!("bad Content-Length: {:?}", value.trim()))
            })?;
            content_length = Some(length);
        }
    }

    let length = match content_length {
        None => return Err(TallyError::Protocol("missing Content-Length".to_string())),
        Some(0) => return Err(TallyError::Protocol("empty body".to_string())),
        Some(n) if n > MAX_BODY_SIZE => {
            return Err(TallyError::Protocol(format!(
                "body of {} bytes exceeds {} bytes",
                n, MAX_BODY_SIZE
            )))
        }
        Some(n) => n,
    };

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            TallyError::Protocol(format!("body shorter than Content-Length {}", length))
        }
        _ => TallyError::Io(e),
    })?;

    Ok((start_line.unwrap_or_default(), body))
}

// =============================================================================
// Writing
// =============================================================================

/// Write a request carrying `body`
pub fn write_request<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    write_message(writer, "POST / HTTP/1.1", body)
}

/// Write a response carrying `body`
pub fn write_response<W: Write>(writer: &mut W, status: Status, body: &[u8]) -> Result<()> {
    let status_line = format!("HTTP/1.1 {} {}", status.code(), status.reason());
    write_message(writer, &status_line, body)
}

fn write_message<W: Write>(writer: &mut W, start_line: &str, body: &[u8]) -> Result<()> {
    write!(
        writer,
        "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        start_line,
        body.len()
    )?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}
