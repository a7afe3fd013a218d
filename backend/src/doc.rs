//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the boundary and health endpoints together with the
//! adapter-layer schema wrappers, so domain types stay free of utoipa. The
//! document backs Swagger UI in debug builds and `cargo run --bin
//! openapi-dump`.

use crate::inbound::http::boundaries::{
    BoundaryBody, BoundsResponseBody, CandidateBody, CandidateInputBody, CandidateQueryBody,
    ListBoundariesResponseBody, SearchBoundariesRequestBody, SearchBoundariesResponseBody,
    SelectBoundaryRequestBody, SelectedBoundaryResponseBody,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema, ResolutionStateSchema};
use utoipa::OpenApi;

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "City boundaries API",
        description = "Search, rank and select administrative boundaries for cities."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::boundaries::search_boundaries,
        crate::inbound::http::boundaries::list_boundaries,
        crate::inbound::http::boundaries::get_selected_boundary,
        crate::inbound::http::boundaries::select_boundary,
        crate::inbound::http::boundaries::delete_boundary,
        crate::inbound::http::boundaries::get_boundary_bounds,
        crate::inbound::http::boundaries::export_boundary_geojson,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        ResolutionStateSchema,
        SearchBoundariesRequestBody,
        SearchBoundariesResponseBody,
        CandidateBody,
        CandidateInputBody,
        CandidateQueryBody,
        SelectBoundaryRequestBody,
        BoundaryBody,
        ListBoundariesResponseBody,
        SelectedBoundaryResponseBody,
        BoundsResponseBody,
    )),
    tags(
        (name = "boundaries", description = "City boundary resolution"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
