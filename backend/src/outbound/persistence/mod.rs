//! PostgreSQL persistence adapter using Diesel.
//!
//! Implements the boundary repository port on top of `diesel-async` with a
//! `bb8` connection pool. Row models (`models.rs`) and the table definition
//! (`schema.rs`) stay private to this module; callers only see domain types.
//! Migrations live in `backend/migrations` and are applied with
//! `diesel migration run`; integration tests embed them.
//!
//! # Example
//!
//! ```ignore
//! use city_boundaries::outbound::persistence::{DbPool, DieselBoundaryRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/boundaries")).await?;
//! let repository = DieselBoundaryRepository::new(pool);
//! ```

mod diesel_boundary_repository;
mod diesel_error_mapping;
mod models;
mod pool;
mod schema;

pub use diesel_boundary_repository::DieselBoundaryRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
