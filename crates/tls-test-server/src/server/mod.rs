//! Server lifecycle: startup synchronisation and shutdown.
//!
//! # Responsibilities
//! - Build the TLS context and spawn the accept loop.
//! - Block `start` until the listener is actually accepting (readiness is
//!   observed through a one-shot channel, bounded by the startup timeout).
//! - Tear everything down on `stop`: stop accepting, force-close open
//!   connections, and join the accept-loop task. `stop` is idempotent.

mod acceptor;
mod http;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::tls;

/// A running HTTPS test server.
///
/// Created by [`Server::start`]; serves until [`Server::stop`] is called or
/// the handle is dropped.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Server {
    /// Start a server and wait until it is accepting connections.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Configuration`] / [`ServerError::TlsSetup`] if the
    ///   TLS context cannot be built from `config`.
    /// - [`ServerError::Startup`] if the listening socket cannot be bound.
    /// - [`ServerError::StartupTimeout`] if the listener does not become
    ///   ready within the configured startup timeout.
    pub async fn start(config: ServerConfig) -> Result<Server, ServerError> {
        let tls = tls::build_tls_config(&config)?;
        let startup_timeout = config.startup_timeout;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(acceptor::run(config, tls, ready_tx, shutdown_rx));

        let local_addr = match tokio::time::timeout(startup_timeout, ready_rx).await {
            Ok(Ok(Ok(local_addr))) => local_addr,
            Ok(Ok(Err(e))) => {
                let _ = handle.await;
                return Err(e);
            }
            Ok(Err(_)) => {
                // Accept loop ended without reporting readiness.
                return Err(ServerError::Startup(std::io::Error::other(
                    "accept loop terminated before becoming ready",
                )));
            }
            Err(_) => {
                let _ = shutdown_tx.send(true);
                return Err(ServerError::StartupTimeout(startup_timeout));
            }
        };

        info!(addr = %local_addr, "server listening");
        Ok(Server {
            local_addr,
            shutdown: shutdown_tx,
            acceptor: Mutex::new(Some(handle)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Address the server is actually bound to (resolves port 0 bindings).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Port the server is listening on.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting, close all open connections, and release the accept
    /// task. Returns once teardown is complete; calling it again is a no-op.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(true);
        let handle = self.acceptor.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!(addr = %self.local_addr, "server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Unblocks the accept loop if the handle is dropped without `stop`.
        let _ = self.shutdown.send(true);
    }
}
