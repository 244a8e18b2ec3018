use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use onboarding_core::{CallerIdentity, SubjectId};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use super::jwks::JwksCache;
use crate::config::FederationSettings;

/// Reason a bearer token was not accepted. Logged, never sent to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    #[error("federated authentication is not configured")]
    NotConfigured,
    #[error("signing keys unavailable")]
    KeysUnavailable,
    #[error("token is malformed")]
    Malformed,
    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("token header has no key id")]
    MissingKeyId,
    #[error("key id not in the published key set")]
    UnknownKey,
    #[error("published key is unusable")]
    UnusableKey,
    #[error("signature mismatch")]
    BadSignature,
    #[error("audience mismatch")]
    WrongAudience,
    #[error("issuer mismatch")]
    WrongIssuer,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("required claim missing: {0}")]
    MissingClaim(String),
    #[error("token has no subject identifier")]
    MissingSubject,
}

impl From<jsonwebtoken::errors::Error> for InvalidReason {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => InvalidReason::BadSignature,
            ErrorKind::InvalidAudience => InvalidReason::WrongAudience,
            ErrorKind::InvalidIssuer => InvalidReason::WrongIssuer,
            ErrorKind::ExpiredSignature => InvalidReason::Expired,
            ErrorKind::ImmatureSignature => InvalidReason::NotYetValid,
            ErrorKind::MissingRequiredClaim(claim) => InvalidReason::MissingClaim(claim.clone()),
            _ => InvalidReason::Malformed,
        }
    }
}

/// Identity claims extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedClaims {
    pub subject: SubjectId,
    pub display_name: Option<String>,
    pub principal_name: Option<String>,
}

impl FederatedClaims {
    pub fn into_identity(self) -> CallerIdentity {
        let display_name = self
            .display_name
            .or_else(|| self.principal_name.clone())
            .unwrap_or_else(|| "Unknown User".to_string());
        CallerIdentity::federated(self.subject, display_name, self.principal_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerdict {
    Valid(FederatedClaims),
    Invalid(InvalidReason),
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    oid: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

/// Verifies RS256 bearer tokens issued by the configured trust domain for this deployment.
///
/// Never fails: every problem becomes [`TokenVerdict::Invalid`].
#[derive(Clone)]
pub struct TokenValidator {
    federation: Option<(FederationSettings, Arc<JwksCache>)>,
}

impl TokenValidator {
    pub fn new(settings: FederationSettings, cache: Arc<JwksCache>) -> Self {
        Self {
            federation: Some((settings, cache)),
        }
    }

    /// Validator for a deployment without a trust domain; rejects every token.
    pub fn disabled() -> Self {
        Self { federation: None }
    }

    pub async fn validate(&self, token: &str) -> TokenVerdict {
        match self.verify(token).await {
            Ok(claims) => TokenVerdict::Valid(claims),
            Err(reason) => {
                warn!(reason = %reason, "bearer token validation failed");
                TokenVerdict::Invalid(reason)
            }
        }
    }

    async fn verify(&self, token: &str) -> Result<FederatedClaims, InvalidReason> {
        let Some((settings, cache)) = &self.federation else {
            return Err(InvalidReason::NotConfigured);
        };

        let header = decode_header(token).map_err(|_| InvalidReason::Malformed)?;
        if header.alg != Algorithm::RS256 {
            return Err(InvalidReason::UnsupportedAlgorithm(header.alg));
        }
        let kid = header.kid.ok_or(InvalidReason::MissingKeyId)?;
        let jwk = cache.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|_| InvalidReason::UnusableKey)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[settings.client_id.as_str()]);
        validation.set_issuer(&[settings.issuer()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        let data = decode::<RawClaims>(token, &key, &validation)?;
        let claims = data.claims;

        let subject = claims
            .oid
            .or(claims.sub)
            .and_then(|s| SubjectId::new(s).ok())
            .ok_or(InvalidReason::MissingSubject)?;

        Ok(FederatedClaims {
            subject,
            display_name: claims.name.filter(|n| !n.trim().is_empty()),
            principal_name: claims.preferred_username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboarding_core::TrustLevel;

    #[test]
    fn display_name_falls_back_to_principal() {
        let id = FederatedClaims {
            subject: SubjectId::new("oid-1").unwrap(),
            display_name: None,
            principal_name: Some("jacob@example.com".into()),
        }
        .into_identity();
        assert_eq!(id.display_name, "jacob@example.com");
        assert_eq!(id.trust_level, TrustLevel::Federated);
    }

    #[test]
    fn display_name_defaults_when_nothing_present() {
        let id = FederatedClaims {
            subject: SubjectId::new("oid-1").unwrap(),
            display_name: None,
            principal_name: None,
        }
        .into_identity();
        assert_eq!(id.display_name, "Unknown User");
    }

    #[tokio::test]
    async fn disabled_validator_rejects_everything() {
        let v = TokenValidator::disabled();
        assert_eq!(v.validate("a.b.c").await, TokenVerdict::Invalid(InvalidReason::NotConfigured));
    }
}
