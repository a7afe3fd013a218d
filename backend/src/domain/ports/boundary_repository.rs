//! Port for boundary persistence.
//!
//! The [`BoundaryRepository`] stores the candidate set considered for each
//! city and tracks which row, if any, is selected. Adapters must keep at most
//! one selected row per city: [`BoundaryRepository::select`] demotes the
//! previous selection and promotes the new one as a single unit of work,
//! serialised per city. [`BoundaryRepository::select_if_unselected`] runs
//! under the same serialisation so an automatic choice never replaces one
//! committed concurrently.

use async_trait::async_trait;

use crate::domain::{Boundary, BoundaryId, CityId, NewBoundary};

use super::define_port_error;

define_port_error! {
    /// Errors raised by boundary repository adapters.
    pub enum BoundaryRepositoryError {
        /// Repository connection could not be established.
        Connection => "boundary repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "boundary repository query failed: {message}",
        /// The referenced boundary does not exist for the city.
        NotFound => "boundary not found: {message}",
        /// The write would leave the city with more than one selection.
        InvariantViolation => "boundary selection invariant violated: {message}",
    }
}

/// Row to mark as the city's selected boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundarySelection {
    /// A row already stored for the city.
    Existing(BoundaryId),
    /// A promoted candidate. When a row with the same
    /// `(osm_id, osm_type, city_id)` exists it is selected instead and the
    /// new row is discarded.
    New(NewBoundary),
}

/// Port for boundary storage and retrieval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BoundaryRepository: Send + Sync {
    /// All rows stored for a city, selected or not.
    async fn list_for_city(&self, city_id: &CityId)
    -> Result<Vec<Boundary>, BoundaryRepositoryError>;

    /// The selected row for a city. Never more than one.
    async fn find_selected(
        &self,
        city_id: &CityId,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError>;

    /// A single row, scoped to its city.
    async fn find(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError>;

    /// Insert candidates that are not stored yet, returning how many rows were
    /// added. Existing rows, including their selection flag, are untouched.
    async fn store_candidates(
        &self,
        city_id: &CityId,
        candidates: &[NewBoundary],
    ) -> Result<usize, BoundaryRepositoryError>;

    /// Make `selection` the city's only selected row.
    ///
    /// # Atomicity
    ///
    /// Demotion of the previous selection and promotion of the new row happen
    /// in one unit of work. On any error the prior selection is left as it
    /// was.
    ///
    /// # Errors
    ///
    /// [`BoundaryRepositoryError::NotFound`] when an
    /// [`BoundarySelection::Existing`] id is not stored for the city, and
    /// [`BoundaryRepositoryError::InvariantViolation`] when the write would
    /// not leave exactly one selected row.
    async fn select(
        &self,
        city_id: &CityId,
        selection: BoundarySelection,
    ) -> Result<Boundary, BoundaryRepositoryError>;

    /// Select `candidate` only when the city has no selection yet.
    ///
    /// The check and the write form one unit of work serialised with
    /// [`BoundaryRepository::select`]. When a selection exists it is returned
    /// unchanged and `candidate` is not stored.
    ///
    /// # Errors
    ///
    /// [`BoundaryRepositoryError::InvariantViolation`] when `candidate`
    /// belongs to another city or the write would not leave exactly one
    /// selected row.
    async fn select_if_unselected(
        &self,
        city_id: &CityId,
        candidate: NewBoundary,
    ) -> Result<Boundary, BoundaryRepositoryError>;

    /// Remove a row. Returns `false` when nothing matched. Deleting the
    /// selected row leaves the city without a selection.
    async fn delete(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<bool, BoundaryRepositoryError>;
}
