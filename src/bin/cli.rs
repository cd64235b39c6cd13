//! tallykv CLI Client
//!
//! Sends one request to a tallykv server and prints the JSON reply.

use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tallykv::network::Client;

/// tallykv CLI
#[derive(Parser, Debug)]
#[command(name = "tallykv-cli")]
#[command(about = "CLI for the tallykv transaction and log store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Seconds to wait for the server (0 = no limit)
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a transaction
    InsertTx {
        id: String,
        reference: String,
        currency: String,
        /// Amount in the smallest currency unit
        amount: i64,
        /// Seconds since the Unix epoch
        timestamp: i64,
    },

    /// Insert a log
    InsertLog {
        reference: String,
        /// Metadata as a JSON document
        #[arg(default_value = "{}")]
        metadata: String,
        /// Milliseconds since the Unix epoch (default: now)
        #[arg(short, long)]
        timestamp: Option<i64>,
    },

    /// Get a transaction by id
    GetTx { id: String },

    /// Get a log by reference
    GetLog { reference: String },

    /// Query a time range (seconds for transactions, milliseconds for logs)
    Query { start: i64, end: i64 },

    /// List every log
    QueryAll,

    /// Send a raw JSON request body
    Raw { json: String },
}

fn main() {
    let args = Args::parse();

    let request = match build_request(args.command) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    let client = Client::new(&args.server).with_timeout(timeout);

    match client.send(&request) {
        Ok((code, body)) => {
            let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
            println!("{}", pretty);
            if code != 200 {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Request to {} failed: {}", args.server, e);
            process::exit(1);
        }
    }
}

fn build_request(command: Commands) -> Result<Value, String> {
    let request = match command {
        Commands::InsertTx {
            id,
            reference,
            currency,
            amount,
            timestamp,
        } => json!({
            "action": "insert",
            "id": id,
            "reference": reference,
            "currency": currency,
            "amount_smallest_unit": amount,
            "timestamp": timestamp,
        }),
        Commands::InsertLog {
            reference,
            metadata,
            timestamp,
        } => {
            let metadata: Value = serde_json::from_str(&metadata)
                .map_err(|e| format!("metadata is not valid JSON: {}", e))?;
            let mut request = json!({
                "action": "insert",
                "reference": reference,
                "metadata": metadata,
            });
            if let Some(ts) = timestamp {
                request["timestamp"] = json!(ts);
            }
            request
        }
        Commands::GetTx { id } => json!({ "action": "query_by_id", "id": id }),
        Commands::GetLog { reference } => {
            json!({ "action": "query_by_reference", "reference": reference })
        }
        Commands::Query { start, end } => json!({
            "action": "query",
            "start_timestamp": start,
            "end_timestamp": end,
        }),
        Commands::QueryAll => json!({ "action": "query_all" }),
        Commands::Raw { json } => {
            serde_json::from_str(&json).map_err(|e| format!("not valid JSON: {}", e))?
        }
    };
    Ok(request)
}
