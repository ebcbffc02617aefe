use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pickem::{
    api, auth,
    config::AppConfig,
    feed::FeedConfig,
    ledger::Ledger,
    state::AppState,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pickem=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pickem...");

    let config = AppConfig::from_env();
    let auth_config = Arc::new(auth::ModAuthConfig::from_env());

    let feed = match FeedConfig::from_env().build_feed(config.fetch_timeout) {
        Ok(feed) => {
            tracing::info!("Event feed initialized: {}", feed.name());
            feed
        }
        Err(e) => {
            tracing::error!("Failed to initialize event feed: {}", e);
            std::process::exit(1);
        }
    };

    let ledger = match &config.ledger_path {
        Some(path) => match Ledger::load(path, config.environment).await {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::error!("Failed to load ledger from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("LEDGER_PATH not set, results will not survive a restart");
            Ledger::in_memory(config.environment)
        }
    };

    tracing::info!(
        "Environment {:?}, polling every {:?}",
        config.environment,
        config.poll_interval
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::with_ledger(feed, config, ledger));
    let app = api::router(state, auth_config);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
