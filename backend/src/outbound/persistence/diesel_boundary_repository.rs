//! PostgreSQL-backed boundary repository.
//!
//! Selection runs in one transaction that first takes a transaction-scoped
//! advisory lock keyed on the city, so concurrent selections for the same
//! city queue up while other cities proceed. Conditional selection reads the
//! current selection only after taking that lock. The partial unique index on
//! selected rows backs this up if a writer bypasses the lock.

use diesel::OptionalExtension;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{BoundaryRepository, BoundaryRepositoryError, BoundarySelection};
use crate::domain::{Boundary, BoundaryId, CityId, NewBoundary};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{BoundaryRow, NewBoundaryRow};
use super::pool::DbPool;
use super::schema::boundaries;

const CITY_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))";

/// Diesel-backed implementation of the boundary repository port.
#[derive(Clone)]
pub struct DieselBoundaryRepository {
    pool: DbPool,
}

impl DieselBoundaryRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Failures raised inside the selection transaction. Any of them rolls the
/// transaction back.
#[derive(Debug)]
enum SelectionTxError {
    Diesel(diesel::result::Error),
    Repository(BoundaryRepositoryError),
}

impl From<diesel::result::Error> for SelectionTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

impl From<SelectionTxError> for BoundaryRepositoryError {
    fn from(error: SelectionTxError) -> Self {
        match error {
            SelectionTxError::Diesel(error) => map_diesel_error(error),
            SelectionTxError::Repository(error) => error,
        }
    }
}

/// Row to select, resolved before the transaction starts.
enum SelectionTarget {
    Existing(Uuid),
    New(NewBoundaryRow),
}

fn city_lock_key(city_id: &CityId) -> String {
    format!("boundaries:{city_id}")
}

fn new_target(
    city_id: &CityId,
    boundary: &NewBoundary,
) -> Result<SelectionTarget, BoundaryRepositoryError> {
    if boundary.city_id != *city_id {
        return Err(BoundaryRepositoryError::invariant_violation(format!(
            "boundary for city {} cannot be selected for city {city_id}",
            boundary.city_id
        )));
    }
    Ok(SelectionTarget::New(NewBoundaryRow::try_from(boundary)?))
}

fn to_insert_rows(
    city_id: &CityId,
    candidates: &[NewBoundary],
) -> Result<Vec<NewBoundaryRow>, BoundaryRepositoryError> {
    candidates
        .iter()
        .filter(|candidate| candidate.city_id == *city_id)
        .map(NewBoundaryRow::try_from)
        .collect()
}

impl DieselBoundaryRepository {
    async fn run_selection(
        &self,
        city_id: &CityId,
        target: SelectionTarget,
        keep_existing: bool,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let city_uuid = *city_id.as_uuid();
        let lock_key = city_lock_key(city_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Lock, resolve the target row, demote, promote and verify in one
        // transaction; any error rolls back to the prior selection. With
        // `keep_existing` a selection found after the lock wins.
        let row = conn
            .transaction::<_, SelectionTxError, _>(|conn| {
                async move {
                    sql_query(CITY_LOCK_SQL)
                        .bind::<Text, _>(&lock_key)
                        .execute(conn)
                        .await?;

                    if keep_existing {
                        let current = boundaries::table
                            .filter(boundaries::city_id.eq(city_uuid))
                            .filter(boundaries::is_selected.eq(true))
                            .select(BoundaryRow::as_select())
                            .first(conn)
                            .await
                            .optional()?;
                        if let Some(current) = current {
                            return Ok(current);
                        }
                    }

                    let target: Uuid = match target {
                        SelectionTarget::Existing(boundary_id) => boundaries::table
                            .filter(boundaries::city_id.eq(city_uuid))
                            .filter(boundaries::id.eq(boundary_id))
                            .select(boundaries::id)
                            .first(conn)
                            .await
                            .optional()?
                            .ok_or_else(|| {
                                SelectionTxError::Repository(BoundaryRepositoryError::not_found(
                                    format!("boundary {boundary_id} for city {city_uuid}"),
                                ))
                            })?,
                        SelectionTarget::New(new_row) => {
                            let existing: Option<Uuid> = boundaries::table
                                .filter(boundaries::city_id.eq(city_uuid))
                                .filter(boundaries::osm_id.eq(&new_row.osm_id))
                                .filter(boundaries::osm_type.eq(&new_row.osm_type))
                                .select(boundaries::id)
                                .first(conn)
                                .await
                                .optional()?;
                            match existing {
                                Some(id) => id,
                                None => {
                                    diesel::insert_into(boundaries::table)
                                        .values(&new_row)
                                        .execute(conn)
                                        .await?;
                                    new_row.id
                                }
                            }
                        }
                    };

                    diesel::update(
                        boundaries::table
                            .filter(boundaries::city_id.eq(city_uuid))
                            .filter(boundaries::is_selected.eq(true))
                            .filter(boundaries::id.ne(target)),
                    )
                    .set(boundaries::is_selected.eq(false))
                    .execute(conn)
                    .await?;

                    let selected = diesel::update(
                        boundaries::table
                            .filter(boundaries::city_id.eq(city_uuid))
                            .filter(boundaries::id.eq(target)),
                    )
                    .set(boundaries::is_selected.eq(true))
                    .returning(BoundaryRow::as_returning())
                    .get_result(conn)
                    .await?;

                    let selected_count: i64 = boundaries::table
                        .filter(boundaries::city_id.eq(city_uuid))
                        .filter(boundaries::is_selected.eq(true))
                        .count()
                        .get_result(conn)
                        .await?;
                    if selected_count != 1 {
                        return Err(SelectionTxError::Repository(
                            BoundaryRepositoryError::invariant_violation(format!(
                                "city {city_uuid} would have {selected_count} selected boundaries"
                            )),
                        ));
                    }

                    Ok(selected)
                }
                .scope_boxed()
            })
            .await
            .map_err(BoundaryRepositoryError::from)?;

        Boundary::try_from(row)
    }
}

#[async_trait::async_trait]
impl BoundaryRepository for DieselBoundaryRepository {
    async fn list_for_city(
        &self,
        city_id: &CityId,
    ) -> Result<Vec<Boundary>, BoundaryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = boundaries::table
            .filter(boundaries::city_id.eq(city_id.as_uuid()))
            .order((boundaries::created_at.asc(), boundaries::id.asc()))
            .select(BoundaryRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(Boundary::try_from).collect()
    }

    async fn find_selected(
        &self,
        city_id: &CityId,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut rows = boundaries::table
            .filter(boundaries::city_id.eq(city_id.as_uuid()))
            .filter(boundaries::is_selected.eq(true))
            .select(BoundaryRow::as_select())
            .limit(2)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if rows.len() > 1 {
            return Err(BoundaryRepositoryError::invariant_violation(format!(
                "city {city_id} has more than one selected boundary"
            )));
        }
        rows.pop().map(Boundary::try_from).transpose()
    }

    async fn find(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = boundaries::table
            .filter(boundaries::city_id.eq(city_id.as_uuid()))
            .filter(boundaries::id.eq(boundary_id.as_uuid()))
            .select(BoundaryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(Boundary::try_from).transpose()
    }

    async fn store_candidates(
        &self,
        city_id: &CityId,
        candidates: &[NewBoundary],
    ) -> Result<usize, BoundaryRepositoryError> {
        let rows = to_insert_rows(city_id, candidates)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(boundaries::table)
            .values(&rows)
            .on_conflict((boundaries::osm_id, boundaries::osm_type, boundaries::city_id))
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn select(
        &self,
        city_id: &CityId,
        selection: BoundarySelection,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        let target = match selection {
            BoundarySelection::Existing(boundary_id) => {
                SelectionTarget::Existing(*boundary_id.as_uuid())
            }
            BoundarySelection::New(boundary) => new_target(city_id, &boundary)?,
        };
        self.run_selection(city_id, target, false).await
    }

    async fn select_if_unselected(
        &self,
        city_id: &CityId,
        candidate: NewBoundary,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        let target = new_target(city_id, &candidate)?;
        self.run_selection(city_id, target, true).await
    }

    async fn delete(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<bool, BoundaryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(
            boundaries::table
                .filter(boundaries::city_id.eq(city_id.as_uuid()))
                .filter(boundaries::id.eq(boundary_id.as_uuid())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }
}
