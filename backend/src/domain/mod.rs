//! Domain primitives, services and ports.
//!
//! Purpose: model boundary candidates for a city, score and rank them, and
//! keep exactly one selected boundary per city. Types here are transport
//! agnostic; serialisation contracts are documented on each type.
//!
//! Public surface:
//! - [`Boundary`], [`NewBoundary`], [`OsmBoundary`], [`RawBoundaryCandidate`]
//!   for the candidate and persisted shapes.
//! - [`geometry::bounds`] for map framing and [`export::export_geojson`] for
//!   downloads.
//! - [`scoring::CandidateScorer`] for ranking.
//! - [`BoundaryResolutionService`] implementing the driving port.
//! - [`Error`] / [`ErrorCode`] for failures surfaced to adapters.

pub mod boundary;
pub mod boundary_resolution;
pub mod error;
pub mod export;
pub mod geometry;
pub mod ports;
pub mod scoring;

pub use self::boundary::{
    Actor, Boundary, BoundaryId, BoundaryTags, CandidateKey, CandidateQuery, CityId, NewBoundary,
    OsmBoundary, OsmType, OsmTypeParseError, PromotionError, RawBoundaryCandidate, decimal_text,
};
pub use self::boundary_resolution::BoundaryResolutionService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use city_boundaries::domain::{ApiResult, Error};
///
/// fn lookup() -> ApiResult<()> {
///     Err(Error::not_found("no such boundary"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
