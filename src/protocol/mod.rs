//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Exchange
//! ```text
//! client                                 server
//!   │  POST / HTTP/1.1                     │
//!   │  Content-Length: N                   │
//!   │  {"action":"insert",...}  ─────────► │  Idle → ReadingHeaders → ReadingBody
//!   │                                      │  → Dispatching
//!   │  HTTP/1.1 200 OK                     │
//!   │  {"success":true,...}     ◄───────── │  WritingResponse
//!   │                                      │  → Closed
//! ```
//!
//! ### Status Codes
//! - 200: success
//! - 400: malformed request or invalid record
//! - 404: point lookup found nothing
//! - 409: duplicate log reference
//! - 500: storage engine failure

mod framing;
mod request;
mod response;

pub use framing::{
    read_request, read_response, write_request, write_response, MAX_BODY_SIZE, MAX_HEADER_SIZE,
};
pub use request::{LogInput, LogRequest, TransactionRequest};
pub use response::{Response, Status};
