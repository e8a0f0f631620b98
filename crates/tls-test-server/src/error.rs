//! Error types for server construction, startup, and per-connection handling.
//!
//! Fatal errors ([`ServerError`]) are surfaced synchronously to the caller of
//! [`Server::start`](crate::Server::start). Per-connection errors
//! ([`ConnectionError`]) are contained: they are logged, the affected
//! connection is closed, and the server keeps serving everyone else.

use std::time::Duration;

use thiserror::Error;

/// Fatal errors raised while building or starting a server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Identity or trust material is missing, unreadable, or inconsistent
    /// (for example a certificate that does not match its private key).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The TLS backend rejected the cipher-suite / protocol-version
    /// restrictions (e.g. no suite in the allow-list supports any allowed
    /// protocol version).
    #[error("TLS setup failed: {0}")]
    TlsSetup(#[from] rustls::Error),

    /// The listening socket could not be bound (port in use, permission
    /// denied).
    #[error("failed to start listener: {0}")]
    Startup(#[source] std::io::Error),

    /// The server did not become ready within the configured startup timeout.
    #[error("server did not start listening within {0:?}")]
    StartupTimeout(Duration),
}

/// Failures local to a single accepted connection.
///
/// These never propagate past the connection task; the acceptor logs them
/// and moves on.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The TLS handshake failed: bad certificate, protocol mismatch, or a
    /// client-auth policy violation.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// The peer sent something that is not a valid HTTP/1.x request. The
    /// connection is closed without writing any response.
    #[error("malformed HTTP request: {0}")]
    Parse(String),

    /// A read or write failed mid-exchange.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}
