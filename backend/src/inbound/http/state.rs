//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on the driving port and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::BoundaryResolution;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub boundaries: Arc<dyn BoundaryResolution>,
}

impl HttpState {
    /// Construct state from the boundary resolution use-case.
    pub fn new(boundaries: Arc<dyn BoundaryResolution>) -> Self {
        Self { boundaries }
    }
}
