//! Diesel row models for the `boundaries` table.
//!
//! Rows are persistence-local; conversion into domain types validates the
//! columns the database cannot type precisely (`osm_type`, `admin_level`,
//! `tags`).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::ports::BoundaryRepositoryError;
use crate::domain::{Boundary, BoundaryId, BoundaryTags, CityId, NewBoundary};

use super::schema::boundaries;

/// Row struct for reading boundary records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = boundaries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct BoundaryRow {
    pub id: Uuid,
    pub osm_id: String,
    pub osm_type: String,
    pub city_id: Uuid,
    pub name: String,
    pub admin_level: Option<i16>,
    pub boundary_type: String,
    pub area: Option<String>,
    pub geometry: serde_json::Value,
    pub tags: serde_json::Value,
    pub score: Option<String>,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for new boundary records. Rows are always inserted
/// unselected; selection flips the flag afterwards.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = boundaries)]
pub(crate) struct NewBoundaryRow {
    pub id: Uuid,
    pub osm_id: String,
    pub osm_type: String,
    pub city_id: Uuid,
    pub name: String,
    pub admin_level: Option<i16>,
    pub boundary_type: String,
    pub area: Option<String>,
    pub geometry: serde_json::Value,
    pub tags: serde_json::Value,
    pub score: Option<String>,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<BoundaryRow> for Boundary {
    type Error = BoundaryRepositoryError;

    fn try_from(row: BoundaryRow) -> Result<Self, Self::Error> {
        let osm_type = row.osm_type.parse().map_err(|_| {
            BoundaryRepositoryError::query(format!(
                "boundary {} has unknown osm_type {:?}",
                row.id, row.osm_type
            ))
        })?;
        let admin_level = row
            .admin_level
            .map(u8::try_from)
            .transpose()
            .map_err(|_| {
                BoundaryRepositoryError::query(format!(
                    "boundary {} has out of range admin_level",
                    row.id
                ))
            })?;
        let tags: BoundaryTags = serde_json::from_value(row.tags).map_err(|error| {
            BoundaryRepositoryError::query(format!(
                "boundary {} has malformed tags: {error}",
                row.id
            ))
        })?;

        Ok(Self {
            id: BoundaryId::from_uuid(row.id),
            osm_id: row.osm_id,
            osm_type,
            city_id: CityId::from_uuid(row.city_id),
            name: row.name,
            admin_level,
            boundary_type: row.boundary_type,
            area: row.area,
            geometry: row.geometry,
            tags,
            score: row.score,
            is_selected: row.is_selected,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<&NewBoundary> for NewBoundaryRow {
    type Error = BoundaryRepositoryError;

    fn try_from(boundary: &NewBoundary) -> Result<Self, Self::Error> {
        let tags = serde_json::to_value(&boundary.tags).map_err(|error| {
            BoundaryRepositoryError::query(format!(
                "failed to serialise tags for {}/{}: {error}",
                boundary.osm_type, boundary.osm_id
            ))
        })?;

        Ok(Self {
            id: *boundary.id.as_uuid(),
            osm_id: boundary.osm_id.clone(),
            osm_type: boundary.osm_type.as_str().to_owned(),
            city_id: *boundary.city_id.as_uuid(),
            name: boundary.name.clone(),
            admin_level: boundary.admin_level.map(i16::from),
            boundary_type: boundary.boundary_type.clone(),
            area: boundary.area.clone(),
            geometry: boundary.geometry.clone(),
            tags,
            score: boundary.score.clone(),
            is_selected: false,
            created_at: boundary.created_at,
        })
    }
}
