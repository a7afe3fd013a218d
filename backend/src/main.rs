//! Backend entry-point: loads settings, wires adapters and serves the API.

mod server;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use city_boundaries::inbound::http::health::HealthState;
use city_boundaries::outbound::persistence::{DbPool, PoolConfig};
use server::{ServerConfig, ServerSettings, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load()
        .map_err(|err| std::io::Error::other(format!("failed to load settings: {err}")))?;
    let mut config = ServerConfig::from_settings(&settings).map_err(std::io::Error::other)?;

    if let Some(database_url) = settings.database_url.as_deref() {
        let pool_config = PoolConfig::new(database_url).with_max_size(settings.pool_max_size());
        let pool = DbPool::new(pool_config)
            .await
            .map_err(|err| std::io::Error::other(format!("database pool: {err}")))?;
        config = config.with_db_pool(pool);
    }

    info!(bind_addr = %config.bind_addr(), "starting boundary service");
    let health_state = web::Data::new(HealthState::new());
    create_server(health_state, config)?.await
}
