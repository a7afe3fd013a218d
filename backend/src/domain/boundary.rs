//! Boundary candidates and persisted boundary records.
//!
//! A search produces [`RawBoundaryCandidate`] values from the external
//! provider. Scoring turns them into [`OsmBoundary`] values, and
//! [`OsmBoundary::promote`] is the only way to obtain a [`NewBoundary`] ready
//! for persistence. Persisted rows come back as [`Boundary`].
//!
//! Areas and scores are kept as decimal text once persisted so a stored value
//! parses back to exactly the `f64` that was scored.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Free-form OSM tags attached to a boundary. Key order carries no meaning.
pub type BoundaryTags = BTreeMap<String, Value>;

/// Identifier of a city owned by the external city directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(Uuid);

impl CityId {
    /// Wrap an existing UUID.
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Generated identifier of a persisted boundary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryId(Uuid);

impl BoundaryId {
    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// OSM primitive kinds that can carry a city boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmType {
    /// Ordered node sequence, usually a closed ring.
    Way,
    /// Group of ways; the usual carrier of administrative boundaries.
    Relation,
}

impl OsmType {
    /// Stable lowercase spelling used on the wire and in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for OsmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when text does not name a supported OSM type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported OSM type: {0}")]
pub struct OsmTypeParseError(pub String);

impl FromStr for OsmType {
    type Err = OsmTypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "way" | "w" => Ok(Self::Way),
            "relation" | "r" => Ok(Self::Relation),
            _ => Err(OsmTypeParseError(value.to_owned())),
        }
    }
}

/// Search parameters describing the city a boundary is wanted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateQuery {
    /// City name as known to the city directory.
    pub city_name: String,
    /// Country name.
    pub country: String,
    /// Optional ISO 3166-1 alpha-2 code narrowing the search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Maximum number of candidates requested from the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl CandidateQuery {
    /// Build a query without a country code or limit.
    pub fn new(city_name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city_name: city_name.into(),
            country: country.into(),
            country_code: None,
            limit: None,
        }
    }

    /// Attach an ISO country code.
    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    /// Attach a result limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Opaque identity of whoever drives a selection, supplied by the external
/// authentication layer. Only used for structured logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor(String);

impl Actor {
    /// Wrap an identity string handed over by the auth collaborator.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identity used when the caller did not authenticate.
    pub fn anonymous() -> Self {
        Self("anonymous".to_owned())
    }

    /// Borrow the identity string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Boundary candidate exactly as returned by the provider.
///
/// Provider data is untrusted: `geometry` may be missing or malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBoundaryCandidate {
    /// Identifier inside the OSM dataset.
    pub osm_id: String,
    /// OSM primitive kind.
    pub osm_type: OsmType,
    /// Display name of the boundary.
    pub name: String,
    /// Parsed `admin_level` tag, when present and numeric.
    #[serde(default)]
    pub admin_level: Option<u8>,
    /// Free-form classification such as `administrative`.
    pub boundary_type: String,
    /// Enclosed area in square kilometres, when the provider knows it.
    #[serde(default)]
    pub area: Option<f64>,
    /// GeoJSON geometry object.
    #[serde(default)]
    pub geometry: Option<Value>,
    /// Raw OSM tags.
    #[serde(default)]
    pub tags: BoundaryTags,
}

/// A scored, not yet persisted, boundary candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OsmBoundary {
    /// Candidate data as received from the provider.
    #[serde(flatten)]
    pub candidate: RawBoundaryCandidate,
    /// Matching confidence in `[0, 1]`.
    pub score: f64,
}

/// Errors raised while promoting a candidate into a persistable row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromotionError {
    /// Only candidates with a geometry can be persisted.
    #[error("candidate {osm_type}/{osm_id} has no geometry")]
    MissingGeometry {
        /// OSM identifier of the rejected candidate.
        osm_id: String,
        /// OSM type of the rejected candidate.
        osm_type: OsmType,
    },
}

impl OsmBoundary {
    /// Turn the candidate into a row for `city_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::MissingGeometry`] when the provider did not
    /// supply a geometry.
    pub fn promote(
        self,
        city_id: CityId,
        id: BoundaryId,
        created_at: DateTime<Utc>,
    ) -> Result<NewBoundary, PromotionError> {
        let RawBoundaryCandidate {
            osm_id,
            osm_type,
            name,
            admin_level,
            boundary_type,
            area,
            geometry,
            tags,
        } = self.candidate;
        let Some(geometry) = geometry else {
            return Err(PromotionError::MissingGeometry { osm_id, osm_type });
        };

        Ok(NewBoundary {
            id,
            osm_id,
            osm_type,
            city_id,
            name,
            admin_level,
            boundary_type,
            area: area.and_then(decimal_text),
            geometry,
            tags,
            score: decimal_text(self.score),
            created_at,
        })
    }
}

/// A boundary row about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBoundary {
    /// Generated row identifier.
    pub id: BoundaryId,
    /// Identifier inside the OSM dataset.
    pub osm_id: String,
    /// OSM primitive kind.
    pub osm_type: OsmType,
    /// Owning city.
    pub city_id: CityId,
    /// Display name.
    pub name: String,
    /// Administrative level, if known.
    pub admin_level: Option<u8>,
    /// Free-form classification.
    pub boundary_type: String,
    /// Area in square kilometres as decimal text.
    pub area: Option<String>,
    /// GeoJSON geometry; never modified after insertion.
    pub geometry: Value,
    /// Raw OSM tags.
    pub tags: BoundaryTags,
    /// Matching confidence as decimal text.
    pub score: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl NewBoundary {
    /// Materialise the row with the given selection flag.
    pub fn into_boundary(self, is_selected: bool) -> Boundary {
        Boundary {
            id: self.id,
            osm_id: self.osm_id,
            osm_type: self.osm_type,
            city_id: self.city_id,
            name: self.name,
            admin_level: self.admin_level,
            boundary_type: self.boundary_type,
            area: self.area,
            geometry: self.geometry,
            tags: self.tags,
            score: self.score,
            is_selected,
            created_at: self.created_at,
        }
    }

    /// Key that identifies the candidate within its city.
    pub fn candidate_key(&self) -> CandidateKey<'_> {
        CandidateKey {
            osm_id: &self.osm_id,
            osm_type: self.osm_type,
            city_id: self.city_id,
        }
    }
}

/// A persisted boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    /// Row identifier.
    pub id: BoundaryId,
    /// Identifier inside the OSM dataset.
    pub osm_id: String,
    /// OSM primitive kind.
    pub osm_type: OsmType,
    /// Owning city.
    pub city_id: CityId,
    /// Display name.
    pub name: String,
    /// Administrative level, if known.
    pub admin_level: Option<u8>,
    /// Free-form classification.
    pub boundary_type: String,
    /// Area in square kilometres as decimal text.
    pub area: Option<String>,
    /// GeoJSON geometry.
    pub geometry: Value,
    /// Raw OSM tags.
    pub tags: BoundaryTags,
    /// Matching confidence as decimal text.
    pub score: Option<String>,
    /// Whether this row is the city's authoritative boundary.
    pub is_selected: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Boundary {
    /// Key that identifies the candidate within its city.
    pub fn candidate_key(&self) -> CandidateKey<'_> {
        CandidateKey {
            osm_id: &self.osm_id,
            osm_type: self.osm_type,
            city_id: self.city_id,
        }
    }
}

/// `(osm_id, osm_type, city_id)`; unique among persisted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateKey<'a> {
    /// Identifier inside the OSM dataset.
    pub osm_id: &'a str,
    /// OSM primitive kind.
    pub osm_type: OsmType,
    /// Owning city.
    pub city_id: CityId,
}

/// Render a finite `f64` as shortest round-trip decimal text.
///
/// # Examples
/// ```
/// use city_boundaries::domain::decimal_text;
///
/// assert_eq!(decimal_text(12.5).as_deref(), Some("12.5"));
/// assert_eq!(decimal_text(f64::NAN), None);
/// ```
pub fn decimal_text(value: f64) -> Option<String> {
    value.is_finite().then(|| value.to_string())
}
