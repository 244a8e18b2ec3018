#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use onboarding_daemon::auth::{IdentityGate, JwksCache, KeyFetchError, KeyFetcher, TokenValidator};
use onboarding_daemon::config::FederationSettings;
use serde_json::{json, Value};

pub const TENANT: &str = "11111111-2222-3333-4444-555555555555";
pub const CLIENT: &str = "api://onboarding-test";
pub const KID: &str = "test-kid";
pub const SHARED_KEY: &str = "test-shared-key";

const SIGNING_PEM: &[u8] = include_bytes!("../fixtures/signing_key.pem");
const FOREIGN_PEM: &[u8] = include_bytes!("../fixtures/foreign_key.pem");
const MODULUS: &str = include_str!("../fixtures/signing_key.n");

pub fn settings() -> FederationSettings {
    FederationSettings::new(TENANT, CLIENT)
}

/// Serves the fixture public key under [`KID`] and counts fetches.
#[derive(Default)]
pub struct StaticFetcher {
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyFetcher for StaticFetcher {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let set = json!({
            "keys": [{
                "kty": "RSA", "use": "sig", "alg": "RS256",
                "kid": KID, "n": MODULUS.trim(), "e": "AQAB"
            }]
        });
        Ok(serde_json::from_value(set).expect("fixture jwk set"))
    }
}

pub fn validator() -> (TokenValidator, Arc<StaticFetcher>) {
    let fetcher = Arc::new(StaticFetcher::default());
    let cache = JwksCache::new(fetcher.clone(), Duration::from_secs(3600));
    (TokenValidator::new(settings(), Arc::new(cache)), fetcher)
}

/// Gate with both schemes configured.
pub fn gate() -> IdentityGate {
    IdentityGate::new(validator().0, Some(SHARED_KEY.to_string()))
}

fn now_secs() -> i64 {
    onboarding_core::now_ms() / 1000
}

/// Claims a correctly issued token for `oid` carries.
pub fn claims(oid: &str) -> Value {
    json!({
        "oid": oid,
        "sub": format!("pairwise-{oid}"),
        "name": format!("User {oid}"),
        "preferred_username": format!("{oid}@example.com"),
        "aud": CLIENT,
        "iss": settings().issuer(),
        "iat": now_secs(),
        "exp": now_secs() + 3600,
    })
}

pub fn sign(claims: &Value) -> String {
    sign_with(claims, SIGNING_PEM, Some(KID))
}

pub fn sign_foreign(claims: &Value) -> String {
    sign_with(claims, FOREIGN_PEM, Some(KID))
}

pub fn sign_with(claims: &Value, pem: &[u8], kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem).expect("fixture pem");
    encode(&header, claims, &key).expect("sign token")
}

pub fn token_for(oid: &str) -> String {
    sign(&claims(oid))
}

pub fn expired(mut claims: Value) -> Value {
    claims["exp"] = json!(now_secs() - 3600);
    claims["iat"] = json!(now_secs() - 7200);
    claims
}
