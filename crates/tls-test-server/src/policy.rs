//! Client-certificate policy resolution.
//!
//! The `(needed, wanted)` pair supplied by the caller is collapsed into a
//! single three-valued policy that the TLS layer consumes. This mapping is
//! the one piece of business logic every transport backend must reproduce
//! identically, so it lives in its own module and is tested exhaustively.

/// How strongly the server insists on a client certificate during the
/// TLS handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthPolicy {
    /// The handshake fails unless the client presents a certificate that
    /// verifies against the configured trust material.
    Required,
    /// The client is asked for a certificate but may decline; an absent
    /// certificate does not fail the handshake.
    Requested,
    /// No certificate is requested and any presented identity is ignored.
    None,
}

impl ClientAuthPolicy {
    /// Derive the policy from the `needed` / `wanted` pair.
    ///
    /// `needed` takes precedence over `wanted`: a mandatory requirement is
    /// never weakened by the optional flag.
    pub fn resolve(needed: bool, wanted: bool) -> Self {
        if needed {
            ClientAuthPolicy::Required
        } else if wanted {
            ClientAuthPolicy::Requested
        } else {
            ClientAuthPolicy::None
        }
    }
}
