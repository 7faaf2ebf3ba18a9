use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arca_api::setup::{build_router, build_state, import_configs_at_startup, setup_database};
use arca_core::AppConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arca=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration errors exit non-zero so supervisors notice.
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let pool = setup_database(&config).await?;
    let state = build_state(config.clone(), pool).await?;

    // Configs import in the background; download workers stay paused until
    // the import finishes.
    let import_state = Arc::clone(&state);
    tokio::spawn(async move {
        import_configs_at_startup(import_state).await;
    });

    let router = build_router(state);
    let address = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "arca listening");
    axum::serve(listener, router).await?;
    Ok(())
}
