//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.
//!
//! ```text
//!   accept loop ──(bounded channel)──► worker 0 ─┐
//!   (polls shutdown flag)            ► worker 1 ─┼─► Service ─► Store ─► Engine
//!                                    ► worker N ─┘
//! ```

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver};

use crate::config::Config;
use crate::error::Result;
use crate::service::Service;

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for tallykv
pub struct Server {
    config: Config,
    service: Arc<Service>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listen address from `config`
    ///
    /// Binding to port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub fn bind(config: Config, service: Arc<Service>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            service,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops [`run`](Self::run) once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Serve until shutdown is signalled (blocking)
    ///
    /// Returns after every accepted connection has been answered.
    pub fn run(&self) -> Result<()> {
        let workers = self.config.max_connections.max(1);
        let (tx, rx) = bounded::<TcpStream>(workers);

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            handles.push(self.spawn_worker(i, rx.clone())?);
        }
        drop(rx);

        tracing::info!(
            addr = %self.local_addr()?,
            mode = %self.service.mode(),
            workers,
            "server listening"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::trace!(%peer, "accepted");
                    // Accepted sockets may inherit non-blocking mode
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!(%peer, error = %e, "dropping connection");
                        continue;
                    }
                    if tx.send(stream).is_err() {
                        tracing::error!("all workers exited");
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("shutting down, waiting for in-flight connections");
        drop(tx);
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("connection worker panicked");
            }
        }

        Ok(())
    }

    fn spawn_worker(&self, index: usize, rx: Receiver<TcpStream>) -> Result<JoinHandle<()>> {
        let service = Arc::clone(&self.service);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        let handle = thread::Builder::new()
            .name(format!("tallykv-conn-{}", index))
            .spawn(move || {
                for stream in rx.iter() {
                    let mut connection = match Connection::new(stream, Arc::clone(&service)) {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to set up connection");
                            continue;
                        }
                    };
                    if let Err(e) = connection.set_timeouts(read_ms, write_ms) {
                        tracing::warn!(peer = connection.peer_addr(), error = %e, "failed to set timeouts");
                        continue;
                    }
                    if let Err(e) = connection.handle() {
                        tracing::warn!(peer = connection.peer_addr(), error = %e, "connection error");
                    }
                }
            })?;

        Ok(handle)
    }
}
