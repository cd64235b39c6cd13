//! Store Module
//!
//! Domain operations over a shared [`Engine`](crate::Engine). Each store owns
//! one coarse mutex held around every mutation; reads never take it and rely
//! on atomic batches and snapshot iterators instead.

mod logs;
mod transactions;

pub use logs::LogStore;
pub use transactions::TransactionStore;
