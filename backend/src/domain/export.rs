//! GeoJSON download artifacts.

use serde::Serialize;
use thiserror::Error;

/// MIME type of exported geometries.
pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

/// A serialised geometry ready to be handed to the caller as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoJsonExport {
    filename: String,
    body: String,
}

impl GeoJsonExport {
    /// Caller-supplied file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Always [`GEOJSON_CONTENT_TYPE`].
    pub fn content_type(&self) -> &'static str {
        GEOJSON_CONTENT_TYPE
    }

    /// Pretty-printed JSON payload.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the export, returning the payload.
    pub fn into_body(self) -> String {
        self.body
    }
}

/// Reasons an export could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// The file name is blank or unsafe in a path or response header.
    #[error("invalid export file name: {filename:?}")]
    InvalidFilename {
        /// Rejected file name.
        filename: String,
    },
    /// The geometry could not be serialised as JSON.
    #[error("geometry could not be serialised: {message}")]
    Serialization {
        /// Serialiser error message.
        message: String,
    },
}

/// Serialise `geometry` as an indented GeoJSON download named `filename`.
///
/// A missing geometry exports the literal `null`.
///
/// # Errors
///
/// Returns [`ExportError::InvalidFilename`] for blank names and names with
/// path separators or control characters, and [`ExportError::Serialization`] when the value cannot be
/// expressed as JSON. No artifact is produced in either case.
///
/// # Examples
/// ```
/// use city_boundaries::domain::export::export_geojson;
///
/// let export = export_geojson::<serde_json::Value>(None, "city.geojson").expect("export");
/// assert_eq!(export.body(), "null");
/// assert_eq!(export.content_type(), "application/geo+json");
/// ```
pub fn export_geojson<T>(geometry: Option<&T>, filename: &str) -> Result<GeoJsonExport, ExportError>
where
    T: Serialize + ?Sized,
{
    let trimmed = filename.trim();
    if trimmed.is_empty()
        || trimmed.contains(['/', '\\'])
        || trimmed.chars().any(char::is_control)
        || trimmed == "."
        || trimmed == ".."
    {
        return Err(ExportError::InvalidFilename {
            filename: filename.to_owned(),
        });
    }

    let body = serde_json::to_string_pretty(&geometry).map_err(|error| {
        ExportError::Serialization {
            message: error.to_string(),
        }
    })?;

    Ok(GeoJsonExport {
        filename: trimmed.to_owned(),
        body,
    })
}
