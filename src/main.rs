// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sensor_dataview::application::{MemoryDataView, RefreshService};
use sensor_dataview::domain::Timerange;
use sensor_dataview::infrastructure::config::load_config;
use sensor_dataview::infrastructure::influx_repository::InfluxRepository;
use sensor_dataview::presentation::app_state::AppState;
use sensor_dataview::presentation::router::build_router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_config("config/dataview")?;
    let catalog = config.resolve_catalog()?;
    tracing::info!("Loaded catalog with {} sensors", catalog.len());

    // Create repository (infrastructure layer)
    let repository = Arc::new(InfluxRepository::new(config.influx.clone(), catalog));

    // Create data view and refresh service (application layer)
    let window = config.refresh.window()?;
    let view = Arc::new(MemoryDataView::new(Timerange::ending_at(chrono::Utc::now(), window)));
    let refresh_service = RefreshService::new(
        repository,
        view.clone(),
        window,
        config.refresh.max_points,
    );
    tokio::spawn(refresh_service.run(Duration::from_secs(config.refresh.interval_secs.max(1))));

    // Build router (presentation layer)
    let state = Arc::new(AppState::new(view));
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting sensor-dataview service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
