//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **nominatim**: HTTP boundary candidate source
//! - **persistence**: PostgreSQL-backed boundary repository using Diesel
//! - **memory**: in-process boundary repository for database-less runs
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations. They contain no business logic.

pub mod memory;
pub mod nominatim;
pub mod persistence;
