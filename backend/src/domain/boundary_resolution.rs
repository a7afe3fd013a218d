//! Boundary resolution orchestration service.
//!
//! Drives the search, score, select and persist workflow:
//! - provider calls run under a timeout and never retry;
//! - searches never change an existing selection; auto-selection only
//!   fills a city that is still unselected when the write is applied;
//! - selections go through a single repository call so demotion of the
//!   previous row and promotion of the new one share one unit of work.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::export::{ExportError, GeoJsonExport, export_geojson};
use crate::domain::geometry::{self, GeoBounds};
use crate::domain::ports::{
    BoundaryCandidateSource, BoundaryCandidateSourceError, BoundaryRepository,
    BoundaryRepositoryError, BoundaryResolution, BoundarySelection, CandidateChoice,
    CandidateSearchOutcome, CandidateSearchRequest, ResolutionState, SelectionRequest,
};
use crate::domain::scoring::CandidateScorer;
use crate::domain::{
    Actor, Boundary, BoundaryId, CandidateQuery, CityId, Error, NewBoundary, OsmBoundary,
    RawBoundaryCandidate,
};

/// Provider timeout applied when none is configured.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
/// Candidates requested when the query carries no limit.
pub const DEFAULT_RESULT_LIMIT: u32 = 10;
/// Upper bound on the candidates requested from the provider.
pub const MAX_RESULT_LIMIT: u32 = 50;

/// Domain service implementing [`BoundaryResolution`].
#[derive(Clone)]
pub struct BoundaryResolutionService<S: ?Sized, R: ?Sized> {
    source: Arc<S>,
    repository: Arc<R>,
    scorer: CandidateScorer,
    clock: Arc<dyn Clock>,
    provider_timeout: Duration,
    default_limit: u32,
}

impl<S: ?Sized, R: ?Sized> BoundaryResolutionService<S, R> {
    /// Create a service with default timeout and result limit.
    pub fn new(
        source: Arc<S>,
        repository: Arc<R>,
        scorer: CandidateScorer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            repository,
            scorer,
            clock,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            default_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    /// Override the provider timeout.
    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Override the limit used for queries without one. Clamped to
    /// `1..=MAX_RESULT_LIMIT`.
    #[must_use]
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit.clamp(1, MAX_RESULT_LIMIT);
        self
    }
}

impl<S, R> BoundaryResolutionService<S, R>
where
    S: BoundaryCandidateSource + ?Sized,
    R: BoundaryRepository + ?Sized,
{
    async fn fetch_candidates(
        &self,
        query: &CandidateQuery,
    ) -> (Vec<RawBoundaryCandidate>, Option<Error>) {
        match tokio::time::timeout(self.provider_timeout, self.source.search(query)).await {
            Ok(Ok(candidates)) => (candidates, None),
            Ok(Err(error)) => {
                warn!(city = %query.city_name, %error, "boundary candidate search failed");
                (Vec::new(), Some(map_source_error(error)))
            }
            Err(_) => {
                warn!(
                    city = %query.city_name,
                    timeout_ms = self.provider_timeout.as_millis(),
                    "boundary candidate search timed out"
                );
                let error = Error::service_unavailable(format!(
                    "boundary search timed out after {} ms",
                    self.provider_timeout.as_millis()
                ))
                .with_details(json!({ "retryable": true }));
                (Vec::new(), Some(error))
            }
        }
    }

    fn promote(&self, city_id: CityId, candidate: OsmBoundary) -> Result<NewBoundary, Error> {
        candidate
            .promote(city_id, BoundaryId::random(), self.clock.utc())
            .map_err(|error| Error::invalid_request(error.to_string()))
    }

    async fn store(&self, city_id: &CityId, ranked: &[OsmBoundary]) -> Result<usize, Error> {
        if ranked.is_empty() {
            return Ok(0);
        }
        let rows = ranked
            .iter()
            .cloned()
            .map(|candidate| self.promote(*city_id, candidate))
            .collect::<Result<Vec<_>, _>>()?;
        self.repository
            .store_candidates(city_id, &rows)
            .await
            .map_err(map_repository_error)
    }

    async fn find_stored(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<Boundary, Error> {
        self.repository
            .find(city_id, boundary_id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| boundary_not_found(city_id, boundary_id))
    }
}

#[async_trait]
impl<S, R> BoundaryResolution for BoundaryResolutionService<S, R>
where
    S: BoundaryCandidateSource + ?Sized,
    R: BoundaryRepository + ?Sized,
{
    async fn search(
        &self,
        request: CandidateSearchRequest,
    ) -> Result<CandidateSearchOutcome, Error> {
        let CandidateSearchRequest {
            city_id,
            query,
            store_candidates,
            auto_select,
            actor,
        } = request;
        let query = self.normalise_query(query)?;
        let request_id = Uuid::new_v4();

        let (candidates, provider_error) = self.fetch_candidates(&query).await;
        let mut ranking = self.scorer.rank(candidates, &query);
        if let Some(limit) = query.limit.and_then(|limit| usize::try_from(limit).ok()) {
            ranking.ranked.truncate(limit);
        }
        let suggested = self.scorer.suggest(&ranking.ranked).cloned();
        debug!(
            %request_id,
            %city_id,
            ranked = ranking.ranked.len(),
            discarded = ranking.discarded,
            "ranked boundary candidates"
        );

        let stored_count = if store_candidates {
            self.store(&city_id, &ranking.ranked).await?
        } else {
            0
        };

        let mut selected = self
            .repository
            .find_selected(&city_id)
            .await
            .map_err(map_repository_error)?;
        if auto_select && selected.is_none() {
            if let Some(candidate) = suggested.clone() {
                let row = self.promote(city_id, candidate)?;
                let (osm_id, osm_type) = (row.osm_id.clone(), row.osm_type);
                let boundary = self
                    .repository
                    .select_if_unselected(&city_id, row)
                    .await
                    .map_err(map_repository_error)?;
                if boundary.osm_id == osm_id && boundary.osm_type == osm_type {
                    info!(
                        %request_id,
                        %city_id,
                        boundary_id = %boundary.id,
                        actor = %actor,
                        "auto-selected suggested boundary"
                    );
                } else {
                    debug!(
                        %request_id,
                        %city_id,
                        boundary_id = %boundary.id,
                        "kept selection committed during search"
                    );
                }
                selected = Some(boundary);
            }
        }

        let state = ResolutionState::derive(selected.is_some(), !ranking.ranked.is_empty());
        Ok(CandidateSearchOutcome {
            request_id,
            city_id,
            ranked: ranking.ranked,
            discarded: ranking.discarded,
            suggested,
            selected,
            state,
            stored_count,
            provider_error,
        })
    }

    async fn select(&self, request: SelectionRequest) -> Result<Boundary, Error> {
        let SelectionRequest {
            city_id,
            choice,
            actor,
        } = request;

        let selection = match choice {
            CandidateChoice::Candidate { candidate, query } => {
                if !CandidateScorer::has_usable_geometry(&candidate) {
                    return Err(Error::invalid_request(format!(
                        "candidate {}/{} has no usable geometry",
                        candidate.osm_type, candidate.osm_id
                    )));
                }
                let scored = self.scorer.score_candidate(candidate, &query);
                BoundarySelection::New(self.promote(city_id, scored)?)
            }
            CandidateChoice::Stored(boundary_id) => BoundarySelection::Existing(boundary_id),
        };

        let boundary = self
            .repository
            .select(&city_id, selection)
            .await
            .map_err(map_repository_error)?;
        info!(
            %city_id,
            boundary_id = %boundary.id,
            osm_id = %boundary.osm_id,
            actor = %actor,
            "selected city boundary"
        );
        Ok(boundary)
    }

    async fn selected(&self, city_id: &CityId) -> Result<Option<Boundary>, Error> {
        self.repository
            .find_selected(city_id)
            .await
            .map_err(map_repository_error)
    }

    async fn list(&self, city_id: &CityId) -> Result<Vec<Boundary>, Error> {
        self.repository
            .list_for_city(city_id)
            .await
            .map_err(map_repository_error)
    }

    async fn state(&self, city_id: &CityId) -> Result<ResolutionState, Error> {
        let rows = self.list(city_id).await?;
        let has_selection = rows.iter().any(|row| row.is_selected);
        Ok(ResolutionState::derive(has_selection, !rows.is_empty()))
    }

    async fn delete(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
        actor: &Actor,
    ) -> Result<(), Error> {
        let deleted = self
            .repository
            .delete(city_id, boundary_id)
            .await
            .map_err(map_repository_error)?;
        if !deleted {
            return Err(boundary_not_found(city_id, boundary_id));
        }
        info!(%city_id, %boundary_id, actor = %actor, "deleted city boundary");
        Ok(())
    }

    async fn bounds(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<Option<GeoBounds>, Error> {
        let boundary = self.find_stored(city_id, boundary_id).await?;
        Ok(geometry::bounds(Some(&boundary.geometry)))
    }

    async fn export(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
        filename: &str,
    ) -> Result<GeoJsonExport, Error> {
        let boundary = self.find_stored(city_id, boundary_id).await?;
        export_geojson(Some(&boundary.geometry), filename).map_err(map_export_error)
    }
}

impl<S: ?Sized, R: ?Sized> BoundaryResolutionService<S, R> {
    fn normalise_query(&self, mut query: CandidateQuery) -> Result<CandidateQuery, Error> {
        query.city_name = query.city_name.trim().to_owned();
        query.country = query.country.trim().to_owned();
        if query.city_name.is_empty() {
            return Err(Error::invalid_request("cityName must not be empty"));
        }
        if query.country.is_empty() {
            return Err(Error::invalid_request("country must not be empty"));
        }
        query.country_code = query
            .country_code
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty());
        if query
            .country_code
            .as_deref()
            .is_some_and(|code| code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()))
        {
            return Err(Error::invalid_request(
                "countryCode must be an ISO 3166-1 alpha-2 code",
            ));
        }
        query.limit = match query.limit {
            Some(0) => return Err(Error::invalid_request("limit must be positive")),
            Some(limit) => Some(limit.min(MAX_RESULT_LIMIT)),
            None => Some(self.default_limit),
        };
        Ok(query)
    }
}

fn boundary_not_found(city_id: &CityId, boundary_id: &BoundaryId) -> Error {
    Error::not_found(format!("boundary {boundary_id} not found for city {city_id}"))
}

fn map_source_error(error: BoundaryCandidateSourceError) -> Error {
    let retryable = !matches!(error, BoundaryCandidateSourceError::InvalidRequest { .. });
    let message = error.to_string();
    let error = match error {
        BoundaryCandidateSourceError::InvalidRequest { .. } => Error::invalid_request(message),
        BoundaryCandidateSourceError::Transport { .. }
        | BoundaryCandidateSourceError::Timeout { .. }
        | BoundaryCandidateSourceError::RateLimited { .. }
        | BoundaryCandidateSourceError::Decode { .. } => Error::service_unavailable(message),
    };
    error.with_details(json!({ "retryable": retryable }))
}

fn map_repository_error(error: BoundaryRepositoryError) -> Error {
    match error {
        BoundaryRepositoryError::Connection { message }
        | BoundaryRepositoryError::Query { message } => {
            Error::service_unavailable(format!("boundary storage unavailable: {message}"))
        }
        BoundaryRepositoryError::NotFound { message } => {
            Error::not_found(format!("boundary not found: {message}"))
        }
        BoundaryRepositoryError::InvariantViolation { message } => {
            Error::conflict(format!("boundary selection rejected: {message}"))
        }
    }
}

fn map_export_error(error: ExportError) -> Error {
    match error {
        ExportError::InvalidFilename { .. } => Error::invalid_request(error.to_string()),
        ExportError::Serialization { .. } => Error::internal(error.to_string()),
    }
}

#[cfg(test)]
#[path = "boundary_resolution_tests.rs"]
mod tests;
