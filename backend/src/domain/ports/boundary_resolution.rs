//! Driving port for boundary resolution.
//!
//! Inbound adapters call [`BoundaryResolution`] to search candidates for a
//! city, select one, and read back the stored boundaries together with their
//! display bounds and GeoJSON exports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::export::GeoJsonExport;
use crate::domain::geometry::GeoBounds;
use crate::domain::{
    Actor, Boundary, BoundaryId, CandidateQuery, CityId, Error, OsmBoundary,
    RawBoundaryCandidate,
};

/// Resolution progress of a city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionState {
    /// No candidates are known for the city.
    Unresolved,
    /// Candidates are known but none is selected.
    CandidatesLoaded,
    /// Exactly one boundary is selected.
    Selected,
}

impl ResolutionState {
    /// Derive the state from what is known about a city.
    pub fn derive(has_selection: bool, has_candidates: bool) -> Self {
        match (has_selection, has_candidates) {
            (true, _) => Self::Selected,
            (false, true) => Self::CandidatesLoaded,
            (false, false) => Self::Unresolved,
        }
    }
}

/// Request to search boundary candidates for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSearchRequest {
    /// City the candidates are for.
    pub city_id: CityId,
    /// Provider query.
    pub query: CandidateQuery,
    /// Persist the ranked candidates (insert-if-absent).
    pub store_candidates: bool,
    /// Select the suggested candidate when the city has no selection yet.
    pub auto_select: bool,
    /// Caller identity for logs.
    pub actor: Actor,
}

impl CandidateSearchRequest {
    /// Plain search: nothing stored, nothing selected.
    pub fn new(city_id: CityId, query: CandidateQuery, actor: Actor) -> Self {
        Self {
            city_id,
            query,
            store_candidates: false,
            auto_select: false,
            actor,
        }
    }
}

/// Result of a candidate search.
///
/// A failing provider yields an empty `ranked` list with `provider_error`
/// set; the call itself still succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSearchOutcome {
    /// Identifies this search so callers can drop stale responses.
    pub request_id: Uuid,
    /// City the search was for.
    pub city_id: CityId,
    /// Usable candidates, best first.
    pub ranked: Vec<OsmBoundary>,
    /// Candidates dropped for missing or degenerate geometry.
    pub discarded: usize,
    /// Top candidate when it clears the acceptance threshold.
    pub suggested: Option<OsmBoundary>,
    /// The city's selection after the search.
    pub selected: Option<Boundary>,
    /// The city's state after the search.
    pub state: ResolutionState,
    /// Rows newly inserted by `store_candidates`.
    pub stored_count: usize,
    /// Why the provider returned nothing, if it failed.
    pub provider_error: Option<Error>,
}

/// What to select.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateChoice {
    /// A provider candidate. It is re-scored against `query` before storing.
    Candidate {
        /// Candidate as returned by a search.
        candidate: RawBoundaryCandidate,
        /// Query the candidate was found for.
        query: CandidateQuery,
    },
    /// A row already stored for the city.
    Stored(BoundaryId),
}

/// Request to select a boundary for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    /// City to update.
    pub city_id: CityId,
    /// Boundary to select.
    pub choice: CandidateChoice,
    /// Caller identity for logs.
    pub actor: Actor,
}

/// Driving port for the search, select and inspect workflow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BoundaryResolution: Send + Sync {
    /// Query the provider, then score and rank its candidates.
    ///
    /// Never changes the city's selection unless `auto_select` is set and
    /// the city has none.
    ///
    /// # Errors
    ///
    /// Only persistence failures are returned; provider failures are
    /// reported through [`CandidateSearchOutcome::provider_error`].
    async fn search(&self, request: CandidateSearchRequest)
    -> Result<CandidateSearchOutcome, Error>;

    /// Make the chosen boundary the city's only selection.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for candidates without usable geometry, `NotFound`
    /// for unknown stored rows, `Conflict` when the selection invariant would
    /// break and `ServiceUnavailable` when storage fails. The previous
    /// selection is unchanged on every error.
    async fn select(&self, request: SelectionRequest) -> Result<Boundary, Error>;

    /// The selected boundary for a city, if any.
    async fn selected(&self, city_id: &CityId) -> Result<Option<Boundary>, Error>;

    /// All stored boundaries for a city.
    async fn list(&self, city_id: &CityId) -> Result<Vec<Boundary>, Error>;

    /// Current resolution state of a city.
    async fn state(&self, city_id: &CityId) -> Result<ResolutionState, Error>;

    /// Remove a stored boundary.
    ///
    /// # Errors
    ///
    /// `NotFound` when the boundary is not stored for the city.
    async fn delete(&self, city_id: &CityId, boundary_id: &BoundaryId, actor: &Actor)
    -> Result<(), Error>;

    /// Display bounds of a stored boundary; `None` for unusable geometry.
    async fn bounds(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<Option<GeoBounds>, Error>;

    /// GeoJSON download of a stored boundary's geometry.
    async fn export(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
        filename: &str,
    ) -> Result<GeoJsonExport, Error>;
}
