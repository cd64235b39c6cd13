//! Blocking client
//!
//! Opens one connection per request, matching the server's
//! one-exchange-per-connection protocol.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde_json::Value;

use crate::error::{Result, TallyError};
use crate::protocol::{read_response, write_request};

/// Client for a tallykv server
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Read/write timeout per request (`None` = wait forever)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a raw body and return the status code and raw response body
    pub fn send_raw(&self, body: &[u8]) -> Result<(u16, Vec<u8>)> {
        let addr = self
            .addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TallyError::Config(format!("cannot resolve {}", self.addr)))?;

        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        write_request(&mut writer, body)?;

        let mut reader = BufReader::new(stream);
        read_response(&mut reader)
    }

    /// Send a JSON request and parse the JSON response
    pub fn send(&self, request: &Value) -> Result<(u16, Value)> {
        let body = serde_json::to_vec(request)
            .map_err(|e| TallyError::Serialization(e.to_string()))?;
        let (code, body) = self.send_raw(&body)?;
        let value = serde_json::from_slice(&body)
            .map_err(|e| TallyError::Protocol(format!("response is not JSON: {}", e)))?;
        Ok((code, value))
    }
}
