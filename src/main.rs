/// Disaster report coordination service entry point
mod clients;
mod config;
mod domain;
mod errors;
mod gate;
mod handlers;
mod repo;
mod routes;
mod server;
mod services;
mod utils;

use crate::clients::OpenMeteoClient;
use crate::config::AppConfig;
use crate::gate::{AvailabilityGate, TcpProbe};
use crate::handlers::AppState;
use crate::repo::{
    init_db, AccountDirectory, Geocoder, MemoryAccountDirectory, MemoryGeocoder,
    MemoryReportStore, MemoryWeatherProvider, PgAccountDirectory, PgGeocoder, PgReportStore,
    PgWeatherRepo, ReportStore, WeatherProvider,
};
use crate::routes::build_router;
use crate::server::CommandContext;
use crate::services::CoordinationEngine;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Storage-side collaborators of the engine
struct Backends {
    store: Arc<dyn ReportStore>,
    weather: Arc<dyn WeatherProvider>,
    geocoder: Arc<dyn Geocoder>,
    accounts: Arc<dyn AccountDirectory>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    let mut backends = connect_backends(&config).await?;

    if let Some(url) = &config.weather_api_url {
        backends.weather = Arc::new(OpenMeteoClient::new(url.clone())?);
        info!("Weather observations served by {}", url);
    }

    // Availability gate
    let gate = AvailabilityGate::new(Arc::new(TcpProbe), config.probe.clone());
    info!(
        host = %config.probe.host,
        port = config.probe.port,
        "Availability probe configured"
    );

    let engine = Arc::new(CoordinationEngine::new(
        backends.store,
        gate,
        backends.weather,
        backends.geocoder,
        config.weather_tolerance,
    ));

    // Line-protocol server
    let ctx = Arc::new(CommandContext {
        engine: engine.clone(),
        accounts: backends.accounts,
    });
    {
        let addr = config.command_addr.clone();
        let pool_size = config.command_pool_size;
        tokio::spawn(async move {
            if let Err(e) = server::run(&addr, ctx, pool_size).await {
                error!("Command server error: {:?}", e);
            }
        });
    }

    // Build router
    let app = build_router(AppState { engine });

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!("drs_coordinator listening on {}", config.http_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Postgres when a database is configured, otherwise process memory
async fn connect_backends(config: &AppConfig) -> anyhow::Result<Backends> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set, reports are kept in memory only");
        return Ok(Backends {
            store: Arc::new(MemoryReportStore::new()),
            weather: Arc::new(MemoryWeatherProvider::default()),
            geocoder: Arc::new(MemoryGeocoder::default()),
            accounts: Arc::new(MemoryAccountDirectory::default()),
        });
    };

    // Initialize database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    info!("Database connection pool established");

    // Initialize database schema
    init_db(&pool).await?;
    info!("Database schema initialized");

    Ok(Backends {
        store: Arc::new(PgReportStore::new(pool.clone())),
        weather: Arc::new(PgWeatherRepo::new(pool.clone())),
        geocoder: Arc::new(PgGeocoder::new(pool.clone())),
        accounts: Arc::new(PgAccountDirectory::new(pool)),
    })
}
