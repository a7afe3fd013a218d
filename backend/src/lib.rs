//! City boundary resolution backend.
//!
//! Finds OpenStreetMap administrative boundary candidates for a city, ranks
//! them, and keeps exactly one selected boundary per city.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
