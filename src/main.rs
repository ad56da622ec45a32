use std::net::SocketAddr;
use std::sync::Arc;

use storefront_payments::{
    api::create_router,
    api::middleware::logging::{init_tracing, init_tracing_dev},
    config::{AppEnvironment, Config},
    db::{create_pool, run_migrations, InMemoryPaymentStore, PgPaymentStore, SharedPaymentStore},
    services::PaymentProcessor,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    // An unparsable APP_ENV is reported by Config::from_env below
    if matches!(AppEnvironment::from_env(), Ok(AppEnvironment::Development)) {
        init_tracing_dev();
    } else {
        init_tracing();
    }

    tracing::info!("Starting storefront payments v{}", env!("CARGO_PKG_VERSION"));

    // Missing gateway secrets are fatal in production
    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing::info!(environment = ?config.environment, "Configuration loaded successfully");

    let store: SharedPaymentStore = match config.database.url.as_deref() {
        Some(url) => {
            let pool = create_pool(url, config.database.max_connections).await?;
            run_migrations(&pool).await?;
            Arc::new(PgPaymentStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, payments are kept in memory only");
            Arc::new(InMemoryPaymentStore::new())
        }
    };

    let payment_processor = PaymentProcessor::new(&config, store.clone())?;

    tracing::info!(tmn_code = %config.vnpay.tmn_code, "Payment processor initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config, store, payment_processor);
    let app = create_router(state);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
