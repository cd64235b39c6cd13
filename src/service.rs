//! Request dispatch
//!
//! Turns a request body into a store call and the store's answer into a
//! [`Response`]. A server runs in exactly one [`ServerMode`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{Result, TallyError};
use crate::protocol::{LogRequest, Response, TransactionRequest};
use crate::record::{Log, Transaction};
use crate::store::{LogStore, TransactionStore};

/// Which record kind a server stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Transactions,
    Logs,
}

impl FromStr for ServerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transactions" => Ok(ServerMode::Transactions),
            "logs" => Ok(ServerMode::Logs),
            other => Err(format!(
                "unknown mode {:?} (expected transactions or logs)",
                other
            )),
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerMode::Transactions => "transactions",
            ServerMode::Logs => "logs",
        })
    }
}

/// The store behind a server, with its request handling
pub enum Service {
    Transactions(TransactionStore),
    Logs(LogStore),
}

impl Service {
    pub fn new(mode: ServerMode, engine: Arc<Engine>) -> Self {
        match mode {
            ServerMode::Transactions => Service::Transactions(TransactionStore::new(engine)),
            ServerMode::Logs => Service::Logs(LogStore::new(engine)),
        }
    }

    pub fn mode(&self) -> ServerMode {
        match self {
            Service::Transactions(_) => ServerMode::Transactions,
            Service::Logs(_) => ServerMode::Logs,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        match self {
            Service::Transactions(store) => store.engine(),
            Service::Logs(store) => store.engine(),
        }
    }

    /// Handle one request body; failures become error responses
    pub fn handle(&self, body: &[u8]) -> Response {
        let result = match self {
            Service::Transactions(store) => {
                TransactionRequest::parse(body).and_then(|request| handle_transaction(store, request))
            }
            Service::Logs(store) => {
                LogRequest::parse(body).and_then(|request| handle_log(store, request))
            }
        };

        result.unwrap_or_else(|e| {
            if e.is_engine_error() {
                tracing::error!(error = %e, "request failed");
            } else {
                tracing::debug!(error = %e, "request rejected");
            }
            Response::error(&e)
        })
    }
}

fn handle_transaction(store: &TransactionStore, request: TransactionRequest) -> Result<Response> {
    match request {
        TransactionRequest::Insert(tx) => {
            store.insert(&tx)?;
            Ok(Response::ok(format!("Transaction {} inserted", tx.id())))
        }
        TransactionRequest::BatchInsert { transactions } => {
            let count = store.bulk_insert(&transactions)?;
            Ok(Response::ok(format!("Inserted {} transactions", count)).with_count(count))
        }
        TransactionRequest::Query {
            start_timestamp,
            end_timestamp,
        } => {
            let txs = store.range_query(start_timestamp, end_timestamp)?;
            Ok(Response::ok(format!("Found {} transactions", txs.len())).with_transactions(txs))
        }
        TransactionRequest::QueryById { id } => {
            let tx: Transaction = store
                .get_by_id(&id)?
                .ok_or_else(|| TallyError::NotFound(format!("transaction {}", id)))?;
            Ok(Response::ok("Transaction found").with_transaction(tx))
        }
    }
}

fn handle_log(store: &LogStore, request: LogRequest) -> Result<Response> {
    match request {
        LogRequest::Insert(input) => {
            let log = Log::from(input);
            store.insert(&log)?;
            Ok(Response::ok(format!("Log {} inserted", log.reference())))
        }
        LogRequest::BatchInsert { logs } => {
            let logs: Vec<Log> = logs.into_iter().map(Log::from).collect();
            let count = store.batch_insert(&logs)?;
            Ok(Response::ok(format!("Inserted {} logs", count)).with_count(count))
        }
        LogRequest::Query {
            start_timestamp,
            end_timestamp,
        } => {
            let logs = store.range_query(start_timestamp, end_timestamp)?;
            Ok(Response::ok(format!("Found {} logs", logs.len())).with_logs(logs))
        }
        LogRequest::QueryByReference { reference } => {
            let log = store
                .get_by_reference(&reference)?
                .ok_or_else(|| TallyError::NotFound(format!("log {}", reference)))?;
            Ok(Response::ok("Log found").with_log(log))
        }
        LogRequest::QueryAll => {
            let logs = store.get_all()?;
            Ok(Response::ok(format!("Found {} logs", logs.len())).with_logs(logs))
        }
    }
}
