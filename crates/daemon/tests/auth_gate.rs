mod common;

use axum::http::{HeaderMap, HeaderValue};
use jsonwebtoken::{encode, EncodingKey, Header};
use onboarding_core::TrustLevel;
use onboarding_daemon::auth::{AuthError, IdentityGate, InvalidReason, TokenValidator, TokenVerdict};
use serde_json::json;

use common::*;

fn bearer(token: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert("authorization", HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
    h
}

fn with_key(mut h: HeaderMap, key: &str) -> HeaderMap {
    h.insert("x-api-key", HeaderValue::from_str(key).unwrap());
    h
}

async fn reason(validator: &TokenValidator, token: &str) -> InvalidReason {
    match validator.validate(token).await {
        TokenVerdict::Invalid(r) => r,
        TokenVerdict::Valid(c) => panic!("token unexpectedly accepted for {:?}", c.subject),
    }
}

#[tokio::test]
async fn valid_bearer_yields_federated_identity_from_oid() {
    let id = gate().resolve(&bearer(&token_for("oid-a"))).await.unwrap();
    assert_eq!(id.trust_level, TrustLevel::Federated);
    assert_eq!(id.subject_id.as_str(), "oid-a");
    assert_eq!(id.display_name, "User oid-a");
    assert_eq!(id.principal_name.as_deref(), Some("oid-a@example.com"));
}

#[tokio::test]
async fn subject_falls_back_to_sub_without_oid() {
    let mut c = claims("ignored");
    c.as_object_mut().unwrap().remove("oid");
    let id = gate().resolve(&bearer(&sign(&c))).await.unwrap();
    assert_eq!(id.subject_id.as_str(), "pairwise-ignored");
}

#[tokio::test]
async fn token_without_any_subject_is_invalid() {
    let (validator, _) = validator();
    let mut c = claims("x");
    c.as_object_mut().unwrap().remove("oid");
    c.as_object_mut().unwrap().remove("sub");
    assert_eq!(reason(&validator, &sign(&c)).await, InvalidReason::MissingSubject);

    c["oid"] = json!("   ");
    assert_eq!(reason(&validator, &sign(&c)).await, InvalidReason::MissingSubject);
}

#[tokio::test]
async fn rejected_tokens_never_fall_through_to_the_shared_key() {
    let gate = gate();
    let mut wrong_aud = claims("oid-a");
    wrong_aud["aud"] = json!("api://someone-else");
    let mut wrong_iss = claims("oid-a");
    wrong_iss["iss"] = json!("https://login.microsoftonline.com/other-tenant/v2.0");

    let bad_tokens = [
        sign_foreign(&claims("oid-a")),
        sign(&wrong_aud),
        sign(&wrong_iss),
        sign(&expired(claims("oid-a"))),
        "not-a-jwt".to_string(),
    ];
    for token in bad_tokens {
        let headers = with_key(bearer(&token), SHARED_KEY);
        let err = gate.resolve(&headers).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn each_rejection_reports_its_reason() {
    let (validator, _) = validator();

    assert_eq!(reason(&validator, &sign_foreign(&claims("a"))).await, InvalidReason::BadSignature);

    let mut c = claims("a");
    c["aud"] = json!("api://someone-else");
    assert_eq!(reason(&validator, &sign(&c)).await, InvalidReason::WrongAudience);

    let mut c = claims("a");
    c["iss"] = json!("https://sts.windows.net/other/");
    assert_eq!(reason(&validator, &sign(&c)).await, InvalidReason::WrongIssuer);

    assert_eq!(reason(&validator, &sign(&expired(claims("a")))).await, InvalidReason::Expired);
    assert_eq!(reason(&validator, "garbage").await, InvalidReason::Malformed);
}

#[tokio::test]
async fn header_problems_are_caught_before_key_lookup() {
    let (validator, fetcher) = validator();

    let hs = encode(
        &Header::default(),
        &claims("a"),
        &EncodingKey::from_secret(b"shared-secret"),
    )
    .unwrap();
    assert!(matches!(reason(&validator, &hs).await, InvalidReason::UnsupportedAlgorithm(_)));

    let no_kid = sign_with(&claims("a"), include_bytes!("fixtures/signing_key.pem"), None);
    assert_eq!(reason(&validator, &no_kid).await, InvalidReason::MissingKeyId);

    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn unknown_kid_is_rejected() {
    let (validator, fetcher) = validator();
    let token = sign_with(&claims("a"), include_bytes!("fixtures/signing_key.pem"), Some("rotated"));
    assert_eq!(reason(&validator, &token).await, InvalidReason::UnknownKey);
    // The set was fetched moments ago, so no forced refetch.
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn key_set_is_fetched_once_for_many_validations() {
    let (validator, fetcher) = validator();
    for oid in ["a", "b", "c", "d"] {
        assert!(matches!(validator.validate(&token_for(oid)).await, TokenVerdict::Valid(_)));
    }
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn shared_key_is_exact_and_case_sensitive() {
    let gate = gate();
    let id = gate.resolve(&with_key(HeaderMap::new(), SHARED_KEY)).await.unwrap();
    assert_eq!(id.trust_level, TrustLevel::SharedKey);
    assert_eq!(id.subject_id.as_str(), "_api_key");

    let upper = SHARED_KEY.to_uppercase();
    for wrong in [upper.as_str(), "test-shared", "x"] {
        let err = gate.resolve(&with_key(HeaderMap::new(), wrong)).await.unwrap_err();
        assert_eq!(err, AuthError::Unauthorized);
    }
    assert_eq!(gate.resolve(&HeaderMap::new()).await.unwrap_err(), AuthError::Unauthorized);
}

#[tokio::test]
async fn bearer_with_no_trust_domain_is_invalid_even_in_dev() {
    let gate = IdentityGate::new(TokenValidator::disabled(), None);
    let err = gate.resolve(&bearer(&token_for("oid-a"))).await.unwrap_err();
    assert_eq!(err, AuthError::InvalidToken(InvalidReason::NotConfigured));

    let id = gate.resolve(&HeaderMap::new()).await.unwrap();
    assert_eq!(id.trust_level, TrustLevel::UnauthenticatedDev);
}

#[tokio::test]
async fn bearer_scheme_matches_in_any_case() {
    let gate = gate();
    let forged = sign_foreign(&claims("oid-a"));
    for scheme in ["bearer", "BEARER"] {
        let mut h = with_key(HeaderMap::new(), SHARED_KEY);
        h.insert("authorization", HeaderValue::from_str(&format!("{scheme} {forged}")).unwrap());
        let err = gate.resolve(&h).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidToken(InvalidReason::BadSignature), "{scheme}");
    }

    let mut h = HeaderMap::new();
    h.insert("authorization", HeaderValue::from_str(&format!("bearer {}", token_for("oid-b"))).unwrap());
    let id = gate.resolve(&h).await.unwrap();
    assert_eq!(id.trust_level, TrustLevel::Federated);
    assert_eq!(id.subject_id.as_str(), "oid-b");
}
