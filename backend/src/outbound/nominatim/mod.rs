//! Nominatim outbound adapters.
//!
//! This module provides a thin HTTP implementation of the
//! `BoundaryCandidateSource` port against a Nominatim-compatible search API.

mod dto;
mod http_source;

pub use http_source::{NominatimHttpIdentity, NominatimHttpSource};
