//! Builders wiring adapters into the boundary resolution service.

use std::sync::Arc;

use mockable::DefaultClock;
use tracing::info;

use city_boundaries::domain::BoundaryResolutionService;
use city_boundaries::domain::ports::{BoundaryCandidateSource, BoundaryRepository};
use city_boundaries::domain::scoring::CandidateScorer;
use city_boundaries::inbound::http::state::HttpState;
use city_boundaries::outbound::memory::InMemoryBoundaryRepository;
use city_boundaries::outbound::nominatim::NominatimHttpSource;
use city_boundaries::outbound::persistence::DieselBoundaryRepository;

use super::ServerConfig;

fn build_repository(config: &ServerConfig) -> Arc<dyn BoundaryRepository> {
    match &config.db_pool {
        Some(pool) => Arc::new(DieselBoundaryRepository::new(pool.clone())),
        None => {
            info!("no database configured; boundaries are kept in memory");
            Arc::new(InMemoryBoundaryRepository::new())
        }
    }
}

fn build_source(config: &ServerConfig) -> std::io::Result<Arc<dyn BoundaryCandidateSource>> {
    let source = NominatimHttpSource::with_identity(
        config.provider_url.clone(),
        config.provider_timeout,
        config.provider_identity.clone(),
    )
    .map_err(|err| std::io::Error::other(format!("provider client build failed: {err}")))?;
    Ok(Arc::new(source))
}

/// Build HTTP state backed by the configured adapters.
///
/// # Errors
///
/// Returns [`std::io::Error`] when the provider HTTP client cannot be built.
pub(crate) fn build_http_state(config: &ServerConfig) -> std::io::Result<HttpState> {
    let service = BoundaryResolutionService::new(
        build_source(config)?,
        build_repository(config),
        CandidateScorer::new(config.scoring),
        Arc::new(DefaultClock),
    )
    .with_provider_timeout(config.provider_timeout)
    .with_default_limit(config.result_limit);
    Ok(HttpState::new(Arc::new(service)))
}
