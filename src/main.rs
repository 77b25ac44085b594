use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use digs::backend::SupabaseClient;
use digs::config::Config;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &digs::config::CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        backend_url = %cfg.backend.url,
        bucket = %cfg.backend.storage_bucket,
        proxy = %cfg.backend.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        guard_on_error = ?cfg.guard.on_error,
        rollback = cfg.listings.rollback_partial_listings,
        loglevel = %cfg.basic.loglevel
    );

    let backend = Arc::new(SupabaseClient::new(&cfg.backend)?);
    let state = digs::DigsState::new(backend, Arc::new(Config::clone(cfg)));
    let app = digs::digs_router(state);

    let addr = cfg.basic.listen_addr.as_str();
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
