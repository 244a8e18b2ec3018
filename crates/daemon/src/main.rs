use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use onboarding_core::SubjectId;
use onboarding_daemon::auth::IdentityGate;
use onboarding_daemon::config::{ConfigArgs, DaemonConfig};
use onboarding_daemon::service::OnboardingService;
use onboarding_daemon::{api, BUNDLED_CATALOG};
use onboarding_storage::Catalog;
use onboarding_storage_sqlite::SqliteStorage;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "onboarding-daemon", version, about = "Onboarding checklist API with per-identity progress")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log filter, e.g. `info` or `onboarding_daemon=debug`. RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Insert departments, tasks and employees that are not present yet.
    Seed {
        /// Catalog JSON to apply instead of the bundled one.
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Delete recorded completions.
    ResetCompletions {
        /// Only this subject's completions; all subjects when omitted.
        #[arg(long)]
        subject: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    fmt().with_target(false).with_env_filter(filter).init();

    let config = DaemonConfig::from_args(cli.config)?;
    let storage = SqliteStorage::open(&config.database_path)?;
    let service = OnboardingService::new(Arc::new(storage));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, service).await,
        Command::Seed { catalog } => {
            let catalog = load_catalog(catalog)?;
            let report = service.seed(catalog).await?;
            info!(
                departments = report.departments,
                tasks = report.tasks,
                employees = report.employees,
                "seed applied"
            );
            Ok(())
        }
        Command::ResetCompletions { subject } => {
            let subject = subject.map(SubjectId::new).transpose()?;
            let removed = service.reset_completions(subject).await?;
            info!(removed, "completions reset");
            Ok(())
        }
    }
}

async fn serve(config: DaemonConfig, service: OnboardingService) -> anyhow::Result<()> {
    if config.seed_on_start {
        let report = service.seed(load_catalog(None)?).await?;
        info!(tasks = report.tasks, employees = report.employees, "seeded on start");
    }

    let gate = IdentityGate::from_config(&config).context("build identity gate")?;
    if config.federation.is_none() {
        info!("bearer tokens disabled; ENTRA_TENANT_ID and ENTRA_CLIENT_ID not both set");
    }
    if gate.dev_fallback_enabled() {
        warn!(auth.mode = "unauthenticated_dev", "API_KEY not set; requests without a bearer token run as the development identity");
    }

    let app = api::router(api::AppState::new(service, gate));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("bind {}", config.listen))?;
    info!("listening on http://{}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn load_catalog(path: Option<PathBuf>) -> anyhow::Result<Catalog> {
    match path {
        Some(path) => Catalog::load_from(&path),
        None => Catalog::from_json(BUNDLED_CATALOG),
    }
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
