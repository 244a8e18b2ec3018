//! Caller authentication: signing-key cache, bearer-token validation and the identity gate.

pub mod gate;
pub mod jwks;
pub mod token;

use thiserror::Error;

pub use gate::{require_identity, IdentityGate, API_KEY_HEADER};
pub use jwks::{HttpKeyFetcher, JwksCache, KeyFetchError, KeyFetcher};
pub use token::{FederatedClaims, InvalidReason, TokenValidator, TokenVerdict};

/// Why the gate refused a request. The only auth failure that crosses the HTTP boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A bearer credential was presented and failed verification.
    #[error("bearer token rejected: {0}")]
    InvalidToken(InvalidReason),
    /// No acceptable credential of either kind.
    #[error("no valid credential presented")]
    Unauthorized,
}
