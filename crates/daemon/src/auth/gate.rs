use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use onboarding_core::CallerIdentity;
use subtle::ConstantTimeEq;
use tracing::{debug, warn, Span};

use super::jwks::{HttpKeyFetcher, JwksCache, KeyFetchError};
use super::token::{InvalidReason, TokenValidator, TokenVerdict};
use super::AuthError;
use crate::config::DaemonConfig;
use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

const BEARER_SCHEME: &[u8] = b"bearer";

/// Turns request credentials into exactly one [`CallerIdentity`] or a refusal.
///
/// Precedence: a bearer token is authoritative when present, whether it verifies or not.
/// Without one, the shared key applies if configured. With neither scheme configured every
/// request is the development identity.
pub struct IdentityGate {
    validator: TokenValidator,
    shared_key: Option<String>,
}

impl IdentityGate {
    pub fn new(validator: TokenValidator, shared_key: Option<String>) -> Self {
        Self {
            validator,
            shared_key: shared_key.filter(|k| !k.is_empty()),
        }
    }

    /// Wires the validator and key cache for the configured trust domain, if any.
    pub fn from_config(config: &DaemonConfig) -> Result<Self, KeyFetchError> {
        let validator = match &config.federation {
            Some(settings) => {
                let fetcher = HttpKeyFetcher::new(settings.jwks_url(), config.jwks_timeout)?;
                let cache = JwksCache::new(Arc::new(fetcher), config.jwks_ttl);
                TokenValidator::new(settings.clone(), Arc::new(cache))
            }
            None => TokenValidator::disabled(),
        };
        Ok(Self::new(validator, config.shared_key.clone()))
    }

    pub fn dev_fallback_enabled(&self) -> bool {
        self.shared_key.is_none()
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<CallerIdentity, AuthError> {
        if let Some(token) = bearer_token(headers) {
            let token = token.map_err(AuthError::InvalidToken)?;
            return match self.validator.validate(token).await {
                TokenVerdict::Valid(claims) => Ok(claims.into_identity()),
                TokenVerdict::Invalid(reason) => Err(AuthError::InvalidToken(reason)),
            };
        }

        if let Some(expected) = &self.shared_key {
            let presented = headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or_default();
            if !presented.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
                return Ok(CallerIdentity::shared_key());
            }
            debug!("shared key missing or mismatched");
            return Err(AuthError::Unauthorized);
        }

        warn!(auth.mode = "unauthenticated_dev", "no credential scheme configured; admitting development identity");
        Ok(CallerIdentity::dev())
    }
}

/// The bearer credential in `Authorization`, if the scheme is `Bearer` in any letter case.
///
/// A bearer value that is not valid UTF-8 still counts as presented, and is malformed.
fn bearer_token(headers: &HeaderMap) -> Option<Result<&str, InvalidReason>> {
    let value = headers.get(AUTHORIZATION)?.as_bytes();
    let split = value.iter().position(|b| *b == b' ')?;
    let (scheme, rest) = value.split_at(split);
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    Some(
        std::str::from_utf8(rest)
            .map(str::trim)
            .map_err(|_| InvalidReason::Malformed),
    )
}

/// Middleware for protected routes: resolves the caller and stores it in request extensions.
pub async fn require_identity(
    State(gate): State<Arc<IdentityGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = gate.resolve(req.headers()).await?;

    let span = Span::current();
    span.record("subject_id", identity.subject_id.as_str());
    span.record("trust_level", identity.trust_level.as_str());

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
