//! Reqwest-backed Nominatim boundary candidate source.
//!
//! This adapter owns transport details only: query parameters, HTTP error
//! mapping, and tolerant decoding of search results into raw candidates.
//! Scoring and geometry validation happen in the domain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::dto::{NominatimPlaceDto, Skipped};
use crate::domain::ports::{BoundaryCandidateSource, BoundaryCandidateSourceError};
use crate::domain::{CandidateQuery, RawBoundaryCandidate};

const DEFAULT_USER_AGENT: &str = "city-boundaries-backend/0.1";
const DEFAULT_CONTACT: &str = "ops@city-boundaries.invalid";

/// Outbound identity sent with every Nominatim request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominatimHttpIdentity {
    /// HTTP user-agent; Nominatim's usage policy requires a meaningful one.
    pub user_agent: String,
    /// Contact address sent in the `From` header.
    pub contact: String,
}

impl Default for NominatimHttpIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            contact: DEFAULT_CONTACT.to_owned(),
        }
    }
}

/// Nominatim source adapter performing structured `GET /search` requests.
pub struct NominatimHttpSource {
    client: Client,
    endpoint: Url,
    user_agent: String,
    contact: String,
}

impl NominatimHttpSource {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    /// ```rust,ignore
    /// let source = NominatimHttpSource::new(endpoint, timeout);
    /// assert!(source.is_ok() || source.is_err());
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_identity(endpoint, timeout, NominatimHttpIdentity::default())
    }

    /// Build an adapter with an explicit outbound identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_identity(
        endpoint: Url,
        timeout: Duration,
        identity: NominatimHttpIdentity,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            user_agent: identity.user_agent,
            contact: identity.contact,
        })
    }
}

#[async_trait]
impl BoundaryCandidateSource for NominatimHttpSource {
    async fn search(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<RawBoundaryCandidate>, BoundaryCandidateSourceError> {
        let params = build_search_params(query)?;
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header(reqwest::header::FROM, self.contact.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        parse_candidates(body.as_ref())
    }
}

fn build_search_params(
    query: &CandidateQuery,
) -> Result<Vec<(&'static str, String)>, BoundaryCandidateSourceError> {
    let city = query.city_name.trim();
    if city.is_empty() {
        return Err(BoundaryCandidateSourceError::invalid_request(
            "city name must not be blank",
        ));
    }

    let mut params = vec![
        ("format", "jsonv2".to_owned()),
        ("polygon_geojson", "1".to_owned()),
        ("extratags", "1".to_owned()),
        ("addressdetails", "1".to_owned()),
        ("city", city.to_owned()),
    ];
    let country = query.country.trim();
    if !country.is_empty() {
        params.push(("country", country.to_owned()));
    }
    if let Some(code) = query
        .country_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
    {
        params.push(("countrycodes", code.to_ascii_lowercase()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.max(1).to_string()));
    }
    Ok(params)
}

fn parse_candidates(body: &[u8]) -> Result<Vec<RawBoundaryCandidate>, BoundaryCandidateSourceError> {
    let decoded: Vec<Value> = serde_json::from_slice(body).map_err(|error| {
        BoundaryCandidateSourceError::decode(format!("invalid Nominatim JSON payload: {error}"))
    })?;

    let mut candidates = Vec::with_capacity(decoded.len());
    for entry in decoded {
        let place = match serde_json::from_value::<NominatimPlaceDto>(entry) {
            Ok(place) => place,
            Err(error) => {
                debug!(%error, "skipping undecodable Nominatim result");
                continue;
            }
        };
        match place.into_candidate() {
            Ok(candidate) => candidates.push(candidate),
            Err(Skipped::Node) => {}
            Err(Skipped::Unidentified(reason)) => {
                debug!(%reason, "skipping unidentified Nominatim result");
            }
        }
    }
    Ok(candidates)
}

fn map_transport_error(error: reqwest::Error) -> BoundaryCandidateSourceError {
    if error.is_timeout() {
        BoundaryCandidateSourceError::timeout(error.to_string())
    } else {
        BoundaryCandidateSourceError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> BoundaryCandidateSourceError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => BoundaryCandidateSourceError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            BoundaryCandidateSourceError::timeout(message)
        }
        _ if status.is_client_error() => BoundaryCandidateSourceError::invalid_request(message),
        _ => BoundaryCandidateSourceError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
