//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Boundary candidates stored per city.
    ///
    /// `(osm_id, osm_type, city_id)` is unique and a partial unique index on
    /// `city_id WHERE is_selected` keeps at most one selected row per city.
    /// A trigger rejects updates to anything but `is_selected`.
    boundaries (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Identifier inside the OSM dataset.
        osm_id -> Varchar,
        /// `way` or `relation`.
        osm_type -> Varchar,
        /// City owned by the external city directory.
        city_id -> Uuid,
        /// Display name.
        name -> Varchar,
        /// OSM administrative level.
        admin_level -> Nullable<Int2>,
        /// Free-form classification.
        boundary_type -> Varchar,
        /// Area in km² as decimal text.
        area -> Nullable<Text>,
        /// GeoJSON geometry object.
        geometry -> Jsonb,
        /// OSM tag object.
        tags -> Jsonb,
        /// Matching confidence as decimal text.
        score -> Nullable<Text>,
        /// Authoritative boundary flag.
        is_selected -> Bool,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}
