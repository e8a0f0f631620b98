//! Embeddable HTTPS test server for exercising TLS identity and trust
//! configuration end-to-end.
//!
//! The server terminates TLS with caller-supplied PEM material, enforces a
//! configurable client-certificate policy, and answers every request on a
//! single route with a fixed plaintext body. The whole path — accept loop,
//! TLS handshake, HTTP/1.1 parsing, response emission — is implemented
//! directly against tokio and rustls primitives, which makes handshake and
//! connection-lifecycle behaviour observable and deterministic in tests.
//!
//! ```no_run
//! use tls_test_server::{Server, ServerConfig};
//!
//! # async fn run(cert_pem: Vec<u8>, key_pem: Vec<u8>, ca_pem: Vec<u8>) -> Result<(), tls_test_server::ServerError> {
//! let config = ServerConfig::builder(cert_pem, key_pem)
//!     .trust_pem(ca_pem)
//!     .need_client_auth(true)
//!     .port(0) // ephemeral
//!     .build()?;
//!
//! let server = Server::start(config).await?;
//! println!("listening on https://localhost:{}", server.port());
//! // ... point a TLS client at it ...
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod policy;
mod server;
mod tls;

pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_PORT, DEFAULT_RESPONSE_BODY};
pub use error::{ConnectionError, ServerError};
pub use policy::ClientAuthPolicy;
pub use server::Server;
