//! DTOs for decoding Nominatim `jsonv2` search results.
//!
//! The adapter decodes each result independently so one malformed entry does
//! not discard the rest of the response, then maps survivors into
//! [`RawBoundaryCandidate`] values.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::geometry::area_km2;
use crate::domain::{BoundaryTags, OsmType, RawBoundaryCandidate};

#[derive(Debug, Deserialize)]
pub(super) struct NominatimPlaceDto {
    pub(super) osm_type: Option<String>,
    pub(super) osm_id: Option<Value>,
    #[serde(default)]
    pub(super) category: Option<String>,
    #[serde(rename = "type", default)]
    pub(super) place_type: Option<String>,
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) display_name: Option<String>,
    /// Not part of stock Nominatim; some compatible providers report km².
    /// Computed from `geojson` when absent.
    #[serde(default)]
    pub(super) area: Option<f64>,
    #[serde(default)]
    pub(super) geojson: Option<Value>,
    #[serde(default)]
    pub(super) extratags: Option<BTreeMap<String, Option<String>>>,
    #[serde(default)]
    pub(super) address: Option<NominatimAddressDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct NominatimAddressDto {
    #[serde(default)]
    pub(super) country_code: Option<String>,
}

/// Why a result was not turned into a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Skipped {
    /// Nodes never carry an area.
    Node,
    /// The result is missing an identifier or uses an unknown type.
    Unidentified(String),
}

impl NominatimPlaceDto {
    pub(super) fn into_candidate(self) -> Result<RawBoundaryCandidate, Skipped> {
        let osm_type = match self.osm_type.as_deref().map(str::parse::<OsmType>) {
            Some(Ok(osm_type)) => osm_type,
            Some(Err(_)) if matches!(self.osm_type.as_deref(), Some("node" | "N" | "n")) => {
                return Err(Skipped::Node);
            }
            _ => {
                return Err(Skipped::Unidentified(format!(
                    "unsupported osm_type {:?}",
                    self.osm_type
                )));
            }
        };
        let osm_id = match self.osm_id.as_ref() {
            Some(Value::Number(number)) => number.to_string(),
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_owned(),
            _ => return Err(Skipped::Unidentified("missing osm_id".to_owned())),
        };

        let extratags = self
            .extratags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect::<BTreeMap<_, _>>();

        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                self.display_name
                    .as_deref()
                    .and_then(|display| display.split(',').next())
                    .map(|first| first.trim().to_owned())
            })
            .unwrap_or_default();
        let admin_level = extratags
            .get("admin_level")
            .and_then(|level| level.trim().parse::<u8>().ok());
        let category = self.category.unwrap_or_default();
        let place_type = self.place_type.unwrap_or_default();
        let boundary_type = if category == "boundary" {
            place_type.clone()
        } else {
            extratags.get("boundary").cloned().unwrap_or_else(|| place_type.clone())
        };

        let mut tags: BoundaryTags = extratags
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        if !name.is_empty() {
            tags.entry("name".to_owned())
                .or_insert_with(|| Value::String(name.clone()));
        }
        match category.as_str() {
            "boundary" if !place_type.is_empty() => {
                tags.entry("boundary".to_owned())
                    .or_insert_with(|| Value::String(place_type.clone()));
            }
            "place" if !place_type.is_empty() => {
                tags.entry("place".to_owned())
                    .or_insert_with(|| Value::String(place_type.clone()));
            }
            _ => {}
        }
        if let Some(code) = self.address.and_then(|address| address.country_code) {
            tags.entry("addr:country".to_owned())
                .or_insert_with(|| Value::String(code.to_ascii_uppercase()));
        }

        let geometry = self.geojson.filter(|geometry| !geometry.is_null());
        let area = self
            .area
            .filter(|area| area.is_finite() && *area >= 0.0)
            .or_else(|| geometry.as_ref().and_then(area_km2));

        Ok(RawBoundaryCandidate {
            osm_id,
            osm_type,
            name,
            admin_level,
            boundary_type,
            area,
            geometry,
            tags,
        })
    }
}
