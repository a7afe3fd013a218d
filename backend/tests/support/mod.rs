//! Shared builders for boundary integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`; this
//! module keeps candidate fixtures and service wiring in one place.

#![allow(dead_code, reason = "each test crate uses a different subset")]

pub mod cluster_skip;
pub mod embedded_postgres;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mockable::DefaultClock;
use serde_json::{Value, json};

use city_boundaries::domain::BoundaryResolutionService;
use city_boundaries::domain::ports::{
    BoundaryCandidateSource, BoundaryCandidateSourceError, FixtureBoundaryCandidateSource,
};
use city_boundaries::domain::scoring::{CandidateScorer, ScoringPolicy};
use city_boundaries::domain::{CandidateQuery, OsmType, RawBoundaryCandidate};
use city_boundaries::outbound::memory::InMemoryBoundaryRepository;

/// Closed square ring with its south-west corner at `(lng, lat)`.
pub fn square(lng: f64, lat: f64, size: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lng, lat],
            [lng + size, lat],
            [lng + size, lat + size],
            [lng, lat + size],
            [lng, lat]
        ]]
    })
}

/// Well-tagged municipal candidate.
pub fn candidate(osm_id: &str, osm_type: OsmType, name: &str, area: f64) -> RawBoundaryCandidate {
    RawBoundaryCandidate {
        osm_id: osm_id.to_owned(),
        osm_type,
        name: name.to_owned(),
        admin_level: Some(8),
        boundary_type: "administrative".to_owned(),
        area: Some(area),
        geometry: Some(square(4.77, 45.70, 0.13)),
        tags: BTreeMap::from([
            ("name".to_owned(), json!(name)),
            ("boundary".to_owned(), json!("administrative")),
            ("admin_level".to_owned(), json!("8")),
            ("type".to_owned(), json!("boundary")),
        ]),
    }
}

/// Lyon relation, a way covering part of it and a candidate without geometry.
pub fn lyon_candidates() -> Vec<RawBoundaryCandidate> {
    let mut missing_geometry = candidate("4", OsmType::Relation, "Lyon", 40.0);
    missing_geometry.geometry = None;
    vec![
        candidate("120965", OsmType::Relation, "Lyon", 47.87),
        candidate("25870231", OsmType::Way, "Lyon 1er Arrondissement", 1.5),
        missing_geometry,
    ]
}

pub fn lyon_query() -> CandidateQuery {
    CandidateQuery::new("Lyon", "France").with_country_code("FR")
}

/// Source that always fails with the given error.
pub struct FailingSource(pub BoundaryCandidateSourceError);

#[async_trait]
impl BoundaryCandidateSource for FailingSource {
    async fn search(
        &self,
        _query: &CandidateQuery,
    ) -> Result<Vec<RawBoundaryCandidate>, BoundaryCandidateSourceError> {
        Err(self.0.clone())
    }
}

pub type FixtureService =
    BoundaryResolutionService<FixtureBoundaryCandidateSource, InMemoryBoundaryRepository>;

/// Service over the in-memory store serving `candidates` for every search.
pub fn fixture_service(
    candidates: Vec<RawBoundaryCandidate>,
    repository: Arc<InMemoryBoundaryRepository>,
    policy: ScoringPolicy,
) -> FixtureService {
    BoundaryResolutionService::new(
        Arc::new(FixtureBoundaryCandidateSource::new(candidates)),
        repository,
        CandidateScorer::new(policy),
        Arc::new(DefaultClock),
    )
}
