use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use thiserror::Error;
use tracing::warn;

/// Signing keys are refetched after this long.
pub const JWKS_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

/// Process configuration. Every flag can also be supplied through its environment variable.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Where the HTTP API will listen.
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// SQLite database file.
    #[arg(long, env = "DATABASE_PATH", default_value = "onboarding_dev.db")]
    pub database_path: PathBuf,

    /// Directory (tenant) id of the trust domain. Enables bearer tokens together with --client-id.
    #[arg(long, env = "ENTRA_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Application (client) id tokens must be issued for.
    #[arg(long, env = "ENTRA_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Base URL of the token authority.
    #[arg(long, env = "ENTRA_AUTHORITY", default_value = DEFAULT_AUTHORITY)]
    pub authority: String,

    /// Static key expected in X-API-Key. When absent, requests without a bearer token are
    /// admitted as the development identity.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Timeout for fetching signing keys.
    #[arg(long, env = "JWKS_TIMEOUT_SECS", default_value_t = 10)]
    pub jwks_timeout_secs: u64,

    /// Apply the bundled catalog before serving.
    #[arg(long, env = "SEED_ON_START", default_value_t = false)]
    pub seed_on_start: bool,
}

/// Identifiers of the trust domain bearer tokens are verified against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub authority: String,
}

impl FederationSettings {
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/{}/discovery/v2.0/keys", self.authority, self.tenant_id)
    }

    pub fn issuer(&self) -> String {
        format!("{}/{}/v2.0", self.authority, self.tenant_id)
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub listen: SocketAddr,
    pub database_path: PathBuf,
    /// Set only when both tenant and client ids are configured.
    pub federation: Option<FederationSettings>,
    pub shared_key: Option<String>,
    pub environment: Environment,
    pub jwks_timeout: Duration,
    pub jwks_ttl: Duration,
    pub seed_on_start: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API_KEY must be set when APP_ENV=production; the unauthenticated fallback is development-only")]
    DevFallbackInProduction,
    #[error("jwks timeout must be at least one second")]
    ZeroTimeout,
}

impl DaemonConfig {
    pub fn from_args(args: ConfigArgs) -> Result<Self, ConfigError> {
        let tenant_id = non_empty(args.tenant_id);
        let client_id = non_empty(args.client_id);

        let federation = match (tenant_id, client_id) {
            (Some(tenant_id), Some(client_id)) => Some(FederationSettings {
                tenant_id,
                client_id,
                authority: args.authority.trim().trim_end_matches('/').to_string(),
            }),
            (Some(_), None) | (None, Some(_)) => {
                warn!("only one of ENTRA_TENANT_ID / ENTRA_CLIENT_ID is set; bearer tokens will be rejected");
                None
            }
            (None, None) => None,
        };

        if args.jwks_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let config = Self {
            listen: args.listen,
            database_path: args.database_path,
            federation,
            shared_key: non_empty(args.api_key),
            environment: args.environment,
            jwks_timeout: Duration::from_secs(args.jwks_timeout_secs),
            jwks_ttl: JWKS_TTL,
            seed_on_start: args.seed_on_start,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Production && self.shared_key.is_none() {
            return Err(ConfigError::DevFallbackInProduction);
        }
        Ok(())
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
