//! City boundary HTTP handlers.
//!
//! ```text
//! POST   /api/v1/cities/{city_id}/boundaries/search
//! GET    /api/v1/cities/{city_id}/boundaries
//! GET    /api/v1/cities/{city_id}/boundaries/selected
//! PUT    /api/v1/cities/{city_id}/boundaries/selected
//! DELETE /api/v1/cities/{city_id}/boundaries/{boundary_id}
//! GET    /api/v1/cities/{city_id}/boundaries/{boundary_id}/bounds
//! GET    /api/v1/cities/{city_id}/boundaries/{boundary_id}/geojson
//! ```
//!
//! Callers are authenticated upstream. The resolved identity arrives in the
//! `x-authenticated-user` header and is only used for audit logs.

use std::collections::BTreeMap;

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::geometry::{self, GeoBounds};
use crate::domain::ports::{
    CandidateChoice, CandidateSearchOutcome, CandidateSearchRequest, ResolutionState,
    SelectionRequest,
};
use crate::domain::{
    Actor, Boundary, BoundaryId, CandidateQuery, CityId, Error, OsmBoundary, RawBoundaryCandidate,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::{ErrorSchema, ResolutionStateSchema};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, conflicting_fields_error, missing_field_error, parse_boundary_id, parse_city_id,
    parse_osm_type,
};

/// Header carrying the identity resolved by the authentication layer.
pub const ACTOR_HEADER: &str = "x-authenticated-user";

fn actor_from(request: &HttpRequest) -> Actor {
    request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Actor::new)
        .unwrap_or_else(Actor::anonymous)
}

/// Request payload for a candidate search.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchBoundariesRequestBody {
    /// City to resolve, as the user typed it.
    #[schema(example = "Lyon")]
    pub city_name: String,
    /// Country name used to narrow the provider search.
    #[schema(example = "France")]
    pub country: String,
    /// ISO 3166-1 alpha-2 code.
    #[schema(example = "FR")]
    #[serde(default)]
    pub country_code: Option<String>,
    /// Defaults to 10, capped at 50.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Persist ranked candidates that are not stored yet.
    #[serde(default)]
    pub store_candidates: bool,
    /// Select the suggested candidate when the city has no selection.
    #[serde(default)]
    pub auto_select: bool,
}

/// Query the candidate was found for, echoed back on selection.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateQueryBody {
    /// City name of the original search.
    pub city_name: String,
    /// Country of the original search.
    pub country: String,
    /// ISO 3166-1 alpha-2 code, if the search had one.
    #[serde(default)]
    pub country_code: Option<String>,
}

impl From<CandidateQueryBody> for CandidateQuery {
    fn from(value: CandidateQueryBody) -> Self {
        Self {
            city_name: value.city_name,
            country: value.country,
            country_code: value.country_code,
            limit: None,
        }
    }
}

/// Candidate as sent back by a client that wants to select it.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInputBody {
    /// OpenStreetMap element id.
    #[schema(example = "120965")]
    pub osm_id: String,
    /// `node`, `way` or `relation`.
    #[schema(example = "relation")]
    pub osm_type: String,
    /// Display name reported by the provider.
    pub name: String,
    /// OSM `admin_level`, when tagged.
    #[serde(default)]
    pub admin_level: Option<u8>,
    /// OSM `boundary` value, usually `administrative`.
    pub boundary_type: String,
    /// Square kilometres.
    #[serde(default)]
    pub area: Option<f64>,
    /// GeoJSON geometry of the boundary.
    #[schema(value_type = Option<Object>)]
    #[serde(default)]
    pub geometry: Option<Value>,
    /// Provider tags, passed through unchanged.
    #[schema(value_type = Object)]
    #[serde(default)]
    pub tags: BTreeMap<String, Value>,
}

impl TryFrom<CandidateInputBody> for RawBoundaryCandidate {
    type Error = Error;

    fn try_from(value: CandidateInputBody) -> Result<Self, Self::Error> {
        Ok(Self {
            osm_type: parse_osm_type(&value.osm_type, FieldName::new("candidate.osmType"))?,
            osm_id: value.osm_id,
            name: value.name,
            admin_level: value.admin_level,
            boundary_type: value.boundary_type,
            area: value.area,
            geometry: value.geometry,
            tags: value.tags,
        })
    }
}

/// Request payload for selecting a boundary.
///
/// Either `boundaryId` names a stored row, or `candidate` and `query` carry
/// a search result to persist and select.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectBoundaryRequestBody {
    /// Stored boundary to select.
    #[schema(format = "uuid")]
    #[serde(default)]
    pub boundary_id: Option<String>,
    /// Search result to persist and select.
    #[serde(default)]
    pub candidate: Option<CandidateInputBody>,
    /// Search the candidate came from; required with `candidate`.
    #[serde(default)]
    pub query: Option<CandidateQueryBody>,
}

fn parse_choice(body: SelectBoundaryRequestBody) -> Result<CandidateChoice, Error> {
    match (body.boundary_id, body.candidate, body.query) {
        (Some(_), Some(_), _) => Err(conflicting_fields_error(
            FieldName::new("boundaryId"),
            FieldName::new("candidate"),
        )),
        (Some(raw), None, _) => Ok(CandidateChoice::Stored(parse_boundary_id(
            &raw,
            FieldName::new("boundaryId"),
        )?)),
        (None, Some(candidate), Some(query)) => Ok(CandidateChoice::Candidate {
            candidate: RawBoundaryCandidate::try_from(candidate)?,
            query: query.into(),
        }),
        (None, Some(_), None) => Err(missing_field_error(FieldName::new("query"))),
        (None, None, _) => Err(missing_field_error(FieldName::new("boundaryId"))),
    }
}

/// Scored candidate returned by a search.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBody {
    /// OpenStreetMap element id.
    pub osm_id: String,
    /// `node`, `way` or `relation`.
    #[schema(example = "relation")]
    pub osm_type: String,
    /// Display name reported by the provider.
    pub name: String,
    /// OSM `admin_level`, when tagged.
    pub admin_level: Option<u8>,
    /// OSM `boundary` value.
    pub boundary_type: String,
    /// Square kilometres, from the provider or computed from the geometry.
    pub area: Option<f64>,
    /// GeoJSON geometry.
    #[schema(value_type = Option<Object>)]
    pub geometry: Option<Value>,
    /// Provider tags.
    #[schema(value_type = Object)]
    pub tags: BTreeMap<String, Value>,
    /// Matching confidence in `[0, 1]`.
    pub score: f64,
    /// `[[minLat, minLng], [maxLat, maxLng]]` for map framing.
    #[schema(value_type = Option<Vec<Vec<f64>>>)]
    pub bounds: Option<[[f64; 2]; 2]>,
}

impl From<OsmBoundary> for CandidateBody {
    fn from(value: OsmBoundary) -> Self {
        let bounds = geometry::bounds(value.candidate.geometry.as_ref()).map(|b| b.to_array());
        let candidate = value.candidate;
        Self {
            osm_id: candidate.osm_id,
            osm_type: candidate.osm_type.to_string(),
            name: candidate.name,
            admin_level: candidate.admin_level,
            boundary_type: candidate.boundary_type,
            area: candidate.area,
            geometry: candidate.geometry,
            tags: candidate.tags,
            score: value.score,
            bounds,
        }
    }
}

/// Stored boundary.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryBody {
    /// Row identifier.
    #[schema(format = "uuid")]
    pub id: String,
    /// OpenStreetMap element id.
    pub osm_id: String,
    /// `node`, `way` or `relation`.
    pub osm_type: String,
    /// City the boundary belongs to.
    #[schema(format = "uuid")]
    pub city_id: String,
    /// Display name.
    pub name: String,
    /// OSM `admin_level`, when tagged.
    pub admin_level: Option<u8>,
    /// OSM `boundary` value.
    pub boundary_type: String,
    /// Square kilometres as decimal text.
    pub area: Option<String>,
    /// Score at selection time as decimal text.
    pub score: Option<String>,
    /// Whether this is the city's active boundary.
    pub is_selected: bool,
    /// When the row was stored.
    #[schema(format = "date-time")]
    pub created_at: String,
    /// GeoJSON geometry.
    #[schema(value_type = Object)]
    pub geometry: Value,
    /// Provider tags captured at storage time.
    #[schema(value_type = Object)]
    pub tags: BTreeMap<String, Value>,
}

impl From<Boundary> for BoundaryBody {
    fn from(value: Boundary) -> Self {
        Self {
            id: value.id.to_string(),
            osm_id: value.osm_id,
            osm_type: value.osm_type.to_string(),
            city_id: value.city_id.to_string(),
            name: value.name,
            admin_level: value.admin_level,
            boundary_type: value.boundary_type,
            area: value.area,
            score: value.score,
            is_selected: value.is_selected,
            created_at: value.created_at.to_rfc3339(),
            geometry: value.geometry,
            tags: value.tags,
        }
    }
}

/// Response payload for a candidate search.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchBoundariesResponseBody {
    /// Clients drop responses whose id is not their latest request.
    #[schema(format = "uuid")]
    pub request_id: String,
    /// City the search ran for.
    #[schema(format = "uuid")]
    pub city_id: String,
    /// Ranked candidates, best first.
    pub candidates: Vec<CandidateBody>,
    /// Candidates dropped for unusable geometry.
    pub discarded: usize,
    /// Top candidate when it clears the confidence threshold.
    pub suggested: Option<CandidateBody>,
    /// Selection after the search, including an auto-selection.
    pub selected: Option<BoundaryBody>,
    /// Resolution state of the city after the search.
    #[schema(value_type = ResolutionStateSchema)]
    pub state: ResolutionState,
    /// Candidates newly persisted by this search.
    pub stored_count: usize,
    /// Set when the provider failed; `candidates` is then empty.
    #[schema(value_type = Option<ErrorSchema>)]
    pub provider_error: Option<Error>,
}

impl From<CandidateSearchOutcome> for SearchBoundariesResponseBody {
    fn from(value: CandidateSearchOutcome) -> Self {
        Self {
            request_id: value.request_id.to_string(),
            city_id: value.city_id.to_string(),
            candidates: value.ranked.into_iter().map(CandidateBody::from).collect(),
            discarded: value.discarded,
            suggested: value.suggested.map(CandidateBody::from),
            selected: value.selected.map(BoundaryBody::from),
            state: value.state,
            stored_count: value.stored_count,
            provider_error: value.provider_error,
        }
    }
}

/// Stored boundaries of a city.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListBoundariesResponseBody {
    /// Resolution state of the city.
    #[schema(value_type = ResolutionStateSchema)]
    pub state: ResolutionState,
    /// Stored boundaries, oldest first.
    pub boundaries: Vec<BoundaryBody>,
}

/// The city's selected boundary, if any.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectedBoundaryResponseBody {
    /// Null when the city has no selection.
    pub selected: Option<BoundaryBody>,
}

/// Display bounds of a stored boundary.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundsResponseBody {
    /// `[[minLat, minLng], [maxLat, maxLng]]`; null for unusable geometry.
    #[schema(value_type = Option<Vec<Vec<f64>>>)]
    pub bounds: Option<[[f64; 2]; 2]>,
    /// The box as a GeoJSON Polygon.
    #[schema(value_type = Option<Object>)]
    pub polygon: Option<Value>,
}

impl From<Option<GeoBounds>> for BoundsResponseBody {
    fn from(value: Option<GeoBounds>) -> Self {
        Self {
            bounds: value.map(|bounds| bounds.to_array()),
            polygon: value.map(|bounds| bounds.to_polygon()),
        }
    }
}

/// Query string for GeoJSON downloads.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoJsonDownloadQuery {
    /// Attachment file name; defaults to `boundary-{boundaryId}.geojson`.
    pub filename: Option<String>,
}

/// Search the provider for boundary candidates of a city.
#[utoipa::path(
    post,
    path = "/api/v1/cities/{city_id}/boundaries/search",
    params(("city_id" = Uuid, Path, description = "City identifier")),
    request_body = SearchBoundariesRequestBody,
    responses(
        (status = 200, description = "Ranked candidates", body = SearchBoundariesResponseBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "Selection conflict", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["boundaries"],
    operation_id = "searchBoundaries"
)]
#[post("/cities/{city_id}/boundaries/search")]
pub async fn search_boundaries(
    state: web::Data<HttpState>,
    request: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<SearchBoundariesRequestBody>,
) -> ApiResult<web::Json<SearchBoundariesResponseBody>> {
    let city_id = parse_city_id(&path.into_inner())?;
    let body = payload.into_inner();
    let query = CandidateQuery {
        city_name: body.city_name,
        country: body.country,
        country_code: body.country_code,
        limit: body.limit,
    };
    let mut search = CandidateSearchRequest::new(city_id, query, actor_from(&request));
    search.store_candidates = body.store_candidates;
    search.auto_select = body.auto_select;

    let outcome = state.boundaries.search(search).await?;
    Ok(web::Json(outcome.into()))
}

/// List stored boundaries of a city.
#[utoipa::path(
    get,
    path = "/api/v1/cities/{city_id}/boundaries",
    params(("city_id" = Uuid, Path, description = "City identifier")),
    responses(
        (status = 200, description = "Stored boundaries", body = ListBoundariesResponseBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["boundaries"],
    operation_id = "listBoundaries"
)]
#[get("/cities/{city_id}/boundaries")]
pub async fn list_boundaries(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<ListBoundariesResponseBody>> {
    let city_id = parse_city_id(&path.into_inner())?;
    let resolution = state.boundaries.state(&city_id).await?;
    let boundaries = state.boundaries.list(&city_id).await?;
    Ok(web::Json(ListBoundariesResponseBody {
        state: resolution,
        boundaries: boundaries.into_iter().map(BoundaryBody::from).collect(),
    }))
}

/// Fetch the city's selected boundary.
#[utoipa::path(
    get,
    path = "/api/v1/cities/{city_id}/boundaries/selected",
    params(("city_id" = Uuid, Path, description = "City identifier")),
    responses(
        (status = 200, description = "Selected boundary or null", body = SelectedBoundaryResponseBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "Stored selection is inconsistent", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["boundaries"],
    operation_id = "getSelectedBoundary"
)]
#[get("/cities/{city_id}/boundaries/selected")]
pub async fn get_selected_boundary(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<SelectedBoundaryResponseBody>> {
    let city_id = parse_city_id(&path.into_inner())?;
    let selected = state.boundaries.selected(&city_id).await?;
    Ok(web::Json(SelectedBoundaryResponseBody {
        selected: selected.map(BoundaryBody::from),
    }))
}

/// Make a boundary the city's only selection.
#[utoipa::path(
    put,
    path = "/api/v1/cities/{city_id}/boundaries/selected",
    params(("city_id" = Uuid, Path, description = "City identifier")),
    request_body = SelectBoundaryRequestBody,
    responses(
        (status = 200, description = "Boundary selected", body = BoundaryBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 404, description = "Stored boundary not found", body = ErrorSchema),
        (status = 409, description = "Selection conflict", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["boundaries"],
    operation_id = "selectBoundary"
)]
#[put("/cities/{city_id}/boundaries/selected")]
pub async fn select_boundary(
    state: web::Data<HttpState>,
    request: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<SelectBoundaryRequestBody>,
) -> ApiResult<web::Json<BoundaryBody>> {
    let city_id = parse_city_id(&path.into_inner())?;
    let choice = parse_choice(payload.into_inner())?;
    let boundary = state
        .boundaries
        .select(SelectionRequest {
            city_id,
            choice,
            actor: actor_from(&request),
        })
        .await?;
    Ok(web::Json(boundary.into()))
}

/// Remove a stored boundary.
#[utoipa::path(
    delete,
    path = "/api/v1/cities/{city_id}/boundaries/{boundary_id}",
    params(
        ("city_id" = Uuid, Path, description = "City identifier"),
        ("boundary_id" = Uuid, Path, description = "Boundary identifier")
    ),
    responses(
        (status = 204, description = "Boundary removed"),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 404, description = "Boundary not found", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["boundaries"],
    operation_id = "deleteBoundary"
)]
#[delete("/cities/{city_id}/boundaries/{boundary_id}")]
pub async fn delete_boundary(
    state: web::Data<HttpState>,
    request: HttpRequest,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (city_id, boundary_id) = parse_boundary_path(path.into_inner())?;
    state
        .boundaries
        .delete(&city_id, &boundary_id, &actor_from(&request))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Display bounds of a stored boundary.
#[utoipa::path(
    get,
    path = "/api/v1/cities/{city_id}/boundaries/{boundary_id}/bounds",
    params(
        ("city_id" = Uuid, Path, description = "City identifier"),
        ("boundary_id" = Uuid, Path, description = "Boundary identifier")
    ),
    responses(
        (status = 200, description = "Bounds, null for unusable geometry", body = BoundsResponseBody),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 404, description = "Boundary not found", body = ErrorSchema)
    ),
    tags = ["boundaries"],
    operation_id = "getBoundaryBounds"
)]
#[get("/cities/{city_id}/boundaries/{boundary_id}/bounds")]
pub async fn get_boundary_bounds(
    state: web::Data<HttpState>,
    path: web::Path<(String, String)>,
) -> ApiResult<web::Json<BoundsResponseBody>> {
    let (city_id, boundary_id) = parse_boundary_path(path.into_inner())?;
    let bounds = state.boundaries.bounds(&city_id, &boundary_id).await?;
    Ok(web::Json(bounds.into()))
}

/// Download a stored boundary's geometry as GeoJSON.
#[utoipa::path(
    get,
    path = "/api/v1/cities/{city_id}/boundaries/{boundary_id}/geojson",
    params(
        ("city_id" = Uuid, Path, description = "City identifier"),
        ("boundary_id" = Uuid, Path, description = "Boundary identifier"),
        ("filename" = Option<String>, Query, description = "Attachment file name")
    ),
    responses(
        (status = 200, description = "GeoJSON attachment", content_type = "application/geo+json"),
        (status = 400, description = "Invalid file name", body = ErrorSchema),
        (status = 404, description = "Boundary not found", body = ErrorSchema)
    ),
    tags = ["boundaries"],
    operation_id = "downloadBoundaryGeoJson"
)]
#[get("/cities/{city_id}/boundaries/{boundary_id}/geojson")]
pub async fn export_boundary_geojson(
    state: web::Data<HttpState>,
    path: web::Path<(String, String)>,
    query: web::Query<GeoJsonDownloadQuery>,
) -> ApiResult<HttpResponse> {
    let (city_id, boundary_id) = parse_boundary_path(path.into_inner())?;
    let filename = query
        .into_inner()
        .filename
        .unwrap_or_else(|| format!("boundary-{boundary_id}.geojson"));
    let export = state
        .boundaries
        .export(&city_id, &boundary_id, &filename)
        .await?;

    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(export.filename().to_owned())],
    };
    let content_type = export.content_type();
    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(disposition)
        .body(export.into_body()))
}

fn parse_boundary_path((city_id, boundary_id): (String, String)) -> Result<(CityId, BoundaryId), Error> {
    Ok((
        parse_city_id(&city_id)?,
        parse_boundary_id(&boundary_id, FieldName::new("boundaryId"))?,
    ))
}

/// Register every boundary handler. Mount under `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(search_boundaries)
        .service(list_boundaries)
        .service(get_selected_boundary)
        .service(select_boundary)
        .service(delete_boundary)
        .service(get_boundary_bounds)
        .service(export_boundary_geojson);
}

#[cfg(test)]
#[path = "boundaries_tests.rs"]
mod tests;
