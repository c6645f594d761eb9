use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use fareline_api::{app, AppState};
use fareline_core::SystemClock;
use fareline_store::{Config, FixtureCarrierSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fareline_api=debug,fareline_search=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Fareline API on port {}", config.server.port);

    // Reservation backend stand-in
    let source = FixtureCarrierSource::from_config(&config.mock)
        .with_context(|| format!("Failed to load fixtures from {}", config.mock.fixtures_path))?;
    tracing::info!(
        "Searching carriers {:?} with {}s timeout",
        config.search.carriers,
        config.search.carrier_timeout_seconds
    );

    let app_state = AppState::build(&config, Arc::new(source), Arc::new(SystemClock))?;
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
