use std::sync::Arc;
use std::time::Duration;

use studyswap::accounts::{HostedIdentityProvider, IdentityProvider};
use studyswap::config::ServerConfig;
use studyswap::onboarding::spawn_expiry_task;
use studyswap::routes::{AppState, app};
use studyswap::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;

    eprintln!("🏠 StudySwap v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let backend = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    let db: Arc<dyn Database> = backend.clone();
    eprintln!("   Database: {}", config.db_path.display());

    // ── Accounts ─────────────────────────────────────────────────────────
    let identity: Arc<dyn IdentityProvider> = match &config.auth {
        Some(auth) => {
            eprintln!("   Accounts: hosted ({})", auth.base_url);
            Arc::new(HostedIdentityProvider::new(auth)?)
        }
        None => {
            eprintln!("   Accounts: local");
            backend
        }
    };

    let state = AppState::new(identity, db);

    // Sweep abandoned onboarding drafts every minute.
    let _expiry_handle = spawn_expiry_task(
        Arc::clone(&state.manager),
        Duration::from_secs(60),
        config.session_idle,
    );
    eprintln!("   Idle sessions expire after {}s", config.session_idle.as_secs());

    let router = app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, router).await?;

    Ok(())
}
