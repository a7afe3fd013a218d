//! Domain ports defining the edges of the hexagon.
//!
//! Driven ports describe how the domain reaches the boundary candidate
//! provider and the boundary store. The driving port
//! ([`BoundaryResolution`]) is what inbound adapters call. Driven ports expose
//! strongly typed errors so adapters map their failures into predictable
//! variants instead of opaque errors.

mod boundary_candidate_source;
mod boundary_repository;
mod boundary_resolution;
mod macros;

pub(crate) use macros::define_port_error;

#[cfg(test)]
pub use boundary_candidate_source::MockBoundaryCandidateSource;
pub use boundary_candidate_source::{
    BoundaryCandidateSource, BoundaryCandidateSourceError, FixtureBoundaryCandidateSource,
};
#[cfg(test)]
pub use boundary_repository::MockBoundaryRepository;
pub use boundary_repository::{BoundaryRepository, BoundaryRepositoryError, BoundarySelection};
#[cfg(test)]
pub use boundary_resolution::MockBoundaryResolution;
pub use boundary_resolution::{
    BoundaryResolution, CandidateChoice, CandidateSearchOutcome, CandidateSearchRequest,
    ResolutionState, SelectionRequest,
};
