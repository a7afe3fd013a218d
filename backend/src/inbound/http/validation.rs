//! Shared validation helpers for inbound HTTP adapters.

use std::str::FromStr;

use serde_json::json;
use uuid::Uuid;

use crate::domain::{BoundaryId, CityId, Error, OsmType};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    ConflictingFields,
    InvalidUuid,
    InvalidOsmType,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::ConflictingFields => "conflicting_fields",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidOsmType => "invalid_osm_type",
        }
    }
}

/// Newtype wrapper for HTTP field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &str {
        self.0
    }
}

/// Builder for validation errors with field context.
struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let field = field.as_str();
    ValidationError::new(field, format!("missing required field: {field}"))
        .with_code(ErrorCode::MissingField)
}

pub(crate) fn conflicting_fields_error(field: FieldName, other: FieldName) -> Error {
    let (field, other) = (field.as_str(), other.as_str());
    ValidationError::new(field, format!("{field} cannot be combined with {other}"))
        .with_code(ErrorCode::ConflictingFields)
}

pub(crate) fn parse_uuid(value: &str, field: FieldName) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| {
        let name = field.as_str();
        ValidationError::new(name, format!("{name} must be a valid UUID"))
            .with_value(ErrorCode::InvalidUuid, value)
    })
}

pub(crate) fn parse_city_id(value: &str) -> Result<CityId, Error> {
    parse_uuid(value, FieldName::new("cityId")).map(CityId::from_uuid)
}

pub(crate) fn parse_boundary_id(value: &str, field: FieldName) -> Result<BoundaryId, Error> {
    parse_uuid(value, field).map(BoundaryId::from_uuid)
}

pub(crate) fn parse_osm_type(value: &str, field: FieldName) -> Result<OsmType, Error> {
    OsmType::from_str(value).map_err(|_| {
        let name = field.as_str();
        ValidationError::new(name, format!("{name} must be way or relation"))
            .with_value(ErrorCode::InvalidOsmType, value)
    })
}
