use serde::{Deserialize, Serialize};

use crate::ids::SubjectId;

/// How the caller's identity was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    /// Verified bearer token from the configured trust domain.
    Federated,
    /// Static shared key; all holders share one subject.
    SharedKey,
    /// No credential scheme configured (development only).
    UnauthenticatedDev,
}

impl TrustLevel {
    /// Stable lower-case label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Federated => "federated",
            TrustLevel::SharedKey => "shared_key",
            TrustLevel::UnauthenticatedDev => "unauthenticated_dev",
        }
    }
}

/// The resolved caller of a single request. Never persisted; only `subject_id` reaches storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub subject_id: SubjectId,
    pub display_name: String,
    pub principal_name: Option<String>,
    pub trust_level: TrustLevel,
}

impl CallerIdentity {
    /// Identity from a verified federated token.
    pub fn federated(
        subject_id: SubjectId,
        display_name: impl Into<String>,
        principal_name: Option<String>,
    ) -> Self {
        Self {
            subject_id,
            display_name: display_name.into(),
            principal_name,
            trust_level: TrustLevel::Federated,
        }
    }

    /// The single identity shared by all static-key callers.
    pub fn shared_key() -> Self {
        Self {
            subject_id: SubjectId::shared_key(),
            display_name: "API Key User".to_string(),
            principal_name: None,
            trust_level: TrustLevel::SharedKey,
        }
    }

    /// Development fallback identity.
    pub fn dev() -> Self {
        Self {
            subject_id: SubjectId::dev(),
            display_name: "Dev User".to_string(),
            principal_name: None,
            trust_level: TrustLevel::UnauthenticatedDev,
        }
    }
}
