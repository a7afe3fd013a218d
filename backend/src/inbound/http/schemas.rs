//! OpenAPI schema definitions for domain types.
//!
//! Domain types do not derive `ToSchema`. The wrappers here mirror their wire
//! shape so utoipa can document them from the adapter layer.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed or fails validation.
    #[schema(rename = "invalid_request")]
    InvalidRequest,
    /// The requested resource does not exist.
    #[schema(rename = "not_found")]
    NotFound,
    /// The request conflicts with the city's current selection.
    #[schema(rename = "conflict")]
    Conflict,
    /// The candidate provider or the database is unavailable.
    #[schema(rename = "service_unavailable")]
    ServiceUnavailable,
    /// An unexpected error occurred on the server.
    #[schema(rename = "internal_error")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
#[derive(ToSchema)]
#[schema(as = crate::domain::Error)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "invalid_request")]
    code: ErrorCodeSchema,
    /// Human-readable message returned to clients.
    #[schema(example = "city name must not be blank")]
    message: String,
    /// Supplementary error details, e.g. `{"retryable": true}`.
    details: Option<serde_json::Value>,
}

/// OpenAPI schema for the city resolution state.
#[derive(ToSchema)]
#[schema(as = crate::domain::ports::ResolutionState)]
pub enum ResolutionStateSchema {
    /// No candidates are known for the city.
    #[schema(rename = "unresolved")]
    Unresolved,
    /// Candidates are stored but none is selected.
    #[schema(rename = "candidatesLoaded")]
    CandidatesLoaded,
    /// Exactly one boundary is selected.
    #[schema(rename = "selected")]
    Selected,
}
