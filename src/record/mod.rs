//! Record Module
//!
//! The two record kinds the store persists, and their byte encodings.
//!
//! - [`Transaction`]: fixed binary layout, keyed by day then id
//! - [`Log`]: JSON document, keyed by reference

mod codec;
mod log;
mod transaction;

pub use codec::Codec;
pub use log::Log;
pub use transaction::Transaction;
