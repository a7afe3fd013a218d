//! Driven port for the remote OSM boundary search service.
//!
//! The provider is untrusted: adapters pass through candidates with missing
//! or malformed geometry and leave filtering to the scorer.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{CandidateQuery, RawBoundaryCandidate};

define_port_error! {
    /// Errors raised while querying the boundary candidate provider.
    pub enum BoundaryCandidateSourceError {
        /// Network or server-side failure.
        Transport => "boundary search transport failed: {message}",
        /// The provider did not answer in time.
        Timeout => "boundary search timed out: {message}",
        /// The provider asked us to back off.
        RateLimited => "boundary search rate limited: {message}",
        /// The query was rejected before or by the provider.
        InvalidRequest => "boundary search request invalid: {message}",
        /// The response body could not be decoded.
        Decode => "boundary search response invalid: {message}",
    }
}

/// Port for retrieving way/relation boundary candidates for a city.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BoundaryCandidateSource: Send + Sync {
    /// Return raw candidates for the query, in no particular order.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use city_boundaries::domain::CandidateQuery;
    /// use city_boundaries::domain::ports::{BoundaryCandidateSource, FixtureBoundaryCandidateSource};
    ///
    /// let source = FixtureBoundaryCandidateSource::default();
    /// let candidates = source.search(&CandidateQuery::new("Lyon", "France")).await?;
    /// assert!(candidates.is_empty());
    /// # Ok::<(), city_boundaries::domain::ports::BoundaryCandidateSourceError>(())
    /// ```
    async fn search(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<RawBoundaryCandidate>, BoundaryCandidateSourceError>;
}

/// Fixture source returning a fixed candidate list, honouring `limit`.
#[derive(Debug, Clone, Default)]
pub struct FixtureBoundaryCandidateSource {
    candidates: Vec<RawBoundaryCandidate>,
}

impl FixtureBoundaryCandidateSource {
    /// Serve `candidates` for every query.
    pub fn new(candidates: Vec<RawBoundaryCandidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl BoundaryCandidateSource for FixtureBoundaryCandidateSource {
    async fn search(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<RawBoundaryCandidate>, BoundaryCandidateSourceError> {
        let limit = query
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OsmType;
    use rstest::rstest;

    fn candidate(osm_id: &str) -> RawBoundaryCandidate {
        RawBoundaryCandidate {
            osm_id: osm_id.to_owned(),
            osm_type: OsmType::Relation,
            name: "Lyon".to_owned(),
            admin_level: Some(8),
            boundary_type: "administrative".to_owned(),
            area: None,
            geometry: None,
            tags: Default::default(),
        }
    }

    #[tokio::test]
    async fn fixture_source_honours_limit() {
        let source = FixtureBoundaryCandidateSource::new(vec![candidate("1"), candidate("2")]);
        let query = CandidateQuery::new("Lyon", "France").with_limit(1);

        let candidates = source.search(&query).await.expect("fixture search");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].osm_id, "1");
    }

    #[tokio::test]
    async fn fixture_source_returns_everything_without_limit() {
        let source = FixtureBoundaryCandidateSource::new(vec![candidate("1"), candidate("2")]);
        let candidates = source
            .search(&CandidateQuery::new("Lyon", "France"))
            .await
            .expect("fixture search");
        assert_eq!(candidates.len(), 2);
    }

    #[rstest]
    fn rate_limited_error_formats_detail() {
        let error = BoundaryCandidateSourceError::rate_limited("status 429");
        assert_eq!(error.to_string(), "boundary search rate limited: status 429");
    }
}
