//! Listening socket accept loop and per-connection TLS handshake.
//!
//! For each accepted socket the loop spawns an independent task that performs
//! the TLS handshake and then runs the HTTP handler; connections never block
//! one another. Any per-connection failure is logged and closes only that
//! connection. The loop itself ends only when the shutdown signal fires.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::{ConnectionError, ServerError};
use crate::server::http::{self, FixedResponse};

/// Bind the listener and run the accept loop until shutdown.
///
/// Readiness (or the bind failure) is reported exactly once through `ready`;
/// the caller is awaiting it under the startup timeout.
pub(crate) async fn run(
    config: ServerConfig,
    tls: Arc<rustls::ServerConfig>,
    ready: oneshot::Sender<Result<SocketAddr, ServerError>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = ready.send(Err(ServerError::Startup(e)));
            return;
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(local_addr) => local_addr,
        Err(e) => {
            let _ = ready.send(Err(ServerError::Startup(e)));
            return;
        }
    };
    if ready.send(Ok(local_addr)).is_err() {
        // The caller gave up waiting; nothing to serve.
        return;
    }

    let acceptor = TlsAcceptor::from(tls);
    let response = Arc::new(FixedResponse {
        body: config.response_body.clone(),
        delay: config.response_delay,
    });
    let mut connections: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    debug!(%peer_addr, "connection accepted");
                    let acceptor = acceptor.clone();
                    let response = Arc::clone(&response);
                    connections.spawn(async move {
                        match handle_connection(stream, acceptor, &response).await {
                            Ok(()) => debug!(%peer_addr, "connection closed"),
                            Err(ConnectionError::Handshake(e)) => {
                                warn!(%peer_addr, error = %e, "TLS handshake failed")
                            }
                            Err(ConnectionError::Parse(reason)) => {
                                warn!(%peer_addr, %reason, "malformed request, closed without response")
                            }
                            Err(ConnectionError::Io(e)) => {
                                warn!(%peer_addr, error = %e, "connection I/O error")
                            }
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept error");
                }
            },
            _ = shutdown.changed() => break,
        }

        // Reap connection tasks that have already finished.
        while connections.try_join_next().is_some() {}
    }

    // Stop accepting first, then force-close whatever is still open.
    drop(listener);
    connections.shutdown().await;
    debug!("accept loop terminated");
}

/// TLS handshake followed by the HTTP exchange loop, for one socket.
async fn handle_connection(
    stream: TcpStream,
    acceptor: TlsAcceptor,
    response: &FixedResponse,
) -> Result<(), ConnectionError> {
    let tls_stream = acceptor
        .accept(stream)
        .await
        .map_err(ConnectionError::Handshake)?;
    http::serve_connection(tls_stream, response).await
}
