//! In-process boundary repository.
//!
//! Used when no database is configured and by integration tests. One mutex
//! guards every city, so a selection's demote and promote steps are applied
//! together: the new row set is staged on a copy, checked, and only then
//! swapped in.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{BoundaryRepository, BoundaryRepositoryError, BoundarySelection};
use crate::domain::{Boundary, BoundaryId, CityId, NewBoundary};

/// Boundary store held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryBoundaryRepository {
    cities: Mutex<HashMap<CityId, Vec<Boundary>>>,
}

impl InMemoryBoundaryRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_selection(
        &self,
        city_id: &CityId,
        selection: BoundarySelection,
        keep_existing: bool,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        let mut cities = self.lock()?;
        let mut staged = cities.get(city_id).cloned().unwrap_or_default();
        if keep_existing {
            if let Some(current) = staged.iter().find(|row| row.is_selected) {
                return Ok(current.clone());
            }
        }

        let target = match selection {
            BoundarySelection::Existing(boundary_id) => staged
                .iter()
                .position(|row| row.id == boundary_id)
                .ok_or_else(|| {
                    BoundaryRepositoryError::not_found(format!(
                        "boundary {boundary_id} for city {city_id}"
                    ))
                })?,
            BoundarySelection::New(row) => {
                if row.city_id != *city_id {
                    return Err(BoundaryRepositoryError::invariant_violation(format!(
                        "boundary for city {} cannot be selected for city {city_id}",
                        row.city_id
                    )));
                }
                let key = row.candidate_key();
                match staged.iter().position(|existing| existing.candidate_key() == key) {
                    Some(index) => index,
                    None => {
                        staged.push(row.into_boundary(false));
                        staged.len() - 1
                    }
                }
            }
        };

        for row in &mut staged {
            row.is_selected = false;
        }
        let Some(chosen) = staged.get_mut(target) else {
            return Err(BoundaryRepositoryError::query("staged selection vanished"));
        };
        chosen.is_selected = true;
        let selected = chosen.clone();

        let selected_count = staged.iter().filter(|row| row.is_selected).count();
        if selected_count != 1 {
            return Err(BoundaryRepositoryError::invariant_violation(format!(
                "city {city_id} would have {selected_count} selected boundaries"
            )));
        }

        cities.insert(*city_id, staged);
        Ok(selected)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CityId, Vec<Boundary>>>, BoundaryRepositoryError> {
        self.cities
            .lock()
            .map_err(|_| BoundaryRepositoryError::connection("boundary store lock poisoned"))
    }
}

#[async_trait]
impl BoundaryRepository for InMemoryBoundaryRepository {
    async fn list_for_city(
        &self,
        city_id: &CityId,
    ) -> Result<Vec<Boundary>, BoundaryRepositoryError> {
        Ok(self.lock()?.get(city_id).cloned().unwrap_or_default())
    }

    async fn find_selected(
        &self,
        city_id: &CityId,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError> {
        let cities = self.lock()?;
        let mut selected = cities
            .get(city_id)
            .into_iter()
            .flatten()
            .filter(|row| row.is_selected);
        let first = selected.next().cloned();
        if selected.next().is_some() {
            return Err(BoundaryRepositoryError::invariant_violation(format!(
                "city {city_id} has more than one selected boundary"
            )));
        }
        Ok(first)
    }

    async fn find(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<Option<Boundary>, BoundaryRepositoryError> {
        Ok(self
            .lock()?
            .get(city_id)
            .and_then(|rows| rows.iter().find(|row| row.id == *boundary_id))
            .cloned())
    }

    async fn store_candidates(
        &self,
        city_id: &CityId,
        candidates: &[NewBoundary],
    ) -> Result<usize, BoundaryRepositoryError> {
        let mut cities = self.lock()?;
        let rows = cities.entry(*city_id).or_default();
        let mut inserted = 0;
        for candidate in candidates.iter().filter(|candidate| candidate.city_id == *city_id) {
            let key = candidate.candidate_key();
            if rows.iter().any(|row| row.candidate_key() == key) {
                continue;
            }
            rows.push(candidate.clone().into_boundary(false));
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn select(
        &self,
        city_id: &CityId,
        selection: BoundarySelection,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        self.apply_selection(city_id, selection, false)
    }

    async fn select_if_unselected(
        &self,
        city_id: &CityId,
        candidate: NewBoundary,
    ) -> Result<Boundary, BoundaryRepositoryError> {
        self.apply_selection(city_id, BoundarySelection::New(candidate), true)
    }

    async fn delete(
        &self,
        city_id: &CityId,
        boundary_id: &BoundaryId,
    ) -> Result<bool, BoundaryRepositoryError> {
        let mut cities = self.lock()?;
        let Some(rows) = cities.get_mut(city_id) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| row.id != *boundary_id);
        Ok(rows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    //! Behavioural coverage for the in-memory store.

    use std::collections::BTreeMap;

    use chrono::Utc;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::domain::OsmType;

    #[fixture]
    fn city_id() -> CityId {
        CityId::from_uuid(Uuid::new_v4())
    }

    fn row(city_id: CityId, osm_id: &str) -> NewBoundary {
        NewBoundary {
            id: BoundaryId::random(),
            osm_id: osm_id.to_owned(),
            osm_type: OsmType::Relation,
            city_id,
            name: format!("Boundary {osm_id}"),
            admin_level: Some(8),
            boundary_type: "administrative".to_owned(),
            area: Some("12.5".to_owned()),
            geometry: json!({ "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] }),
            tags: BTreeMap::new(),
            score: Some("0.9".to_owned()),
            created_at: Utc::now(),
        }
    }

    async fn selected_count(repository: &InMemoryBoundaryRepository, city_id: &CityId) -> usize {
        repository
            .list_for_city(city_id)
            .await
            .expect("list succeeds")
            .iter()
            .filter(|row| row.is_selected)
            .count()
    }

    #[rstest]
    #[tokio::test]
    async fn storing_twice_does_not_duplicate(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();
        let first = vec![row(city_id, "1"), row(city_id, "2")];
        let again = vec![row(city_id, "2"), row(city_id, "3")];

        let inserted = repository
            .store_candidates(&city_id, &first)
            .await
            .expect("store succeeds");
        let reinserted = repository
            .store_candidates(&city_id, &again)
            .await
            .expect("store succeeds");

        assert_eq!((inserted, reinserted), (2, 1));
        let rows = repository.list_for_city(&city_id).await.expect("list succeeds");
        assert_eq!(rows.len(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn reselection_demotes_previous_row(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();
        let first = repository
            .select(&city_id, BoundarySelection::New(row(city_id, "1")))
            .await
            .expect("first selection");
        let second = repository
            .select(&city_id, BoundarySelection::New(row(city_id, "2")))
            .await
            .expect("second selection");

        let stored_first = repository
            .find(&city_id, &first.id)
            .await
            .expect("lookup")
            .expect("row kept");
        assert!(!stored_first.is_selected);
        assert!(second.is_selected);
        assert_eq!(selected_count(&repository, &city_id).await, 1);
        let selected = repository
            .find_selected(&city_id)
            .await
            .expect("lookup")
            .expect("selection present");
        assert_eq!(selected.id, second.id);
    }

    #[rstest]
    #[tokio::test]
    async fn selecting_a_stored_candidate_reuses_its_row(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();
        let stored = row(city_id, "1");
        let stored_id = stored.id;
        repository
            .store_candidates(&city_id, &[stored])
            .await
            .expect("store succeeds");

        let selected = repository
            .select(&city_id, BoundarySelection::New(row(city_id, "1")))
            .await
            .expect("selection succeeds");

        assert_eq!(selected.id, stored_id);
        let rows = repository.list_for_city(&city_id).await.expect("list succeeds");
        assert_eq!(rows.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_selection_leaves_prior_selection(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();
        let prior = repository
            .select(&city_id, BoundarySelection::New(row(city_id, "1")))
            .await
            .expect("first selection");

        let error = repository
            .select(&city_id, BoundarySelection::Existing(BoundaryId::random()))
            .await
            .expect_err("unknown id rejected");

        assert!(matches!(error, BoundaryRepositoryError::NotFound { .. }));
        let selected = repository
            .find_selected(&city_id)
            .await
            .expect("lookup")
            .expect("prior selection kept");
        assert_eq!(selected.id, prior.id);
    }

    #[rstest]
    #[tokio::test]
    async fn conditional_selection_keeps_a_committed_choice(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();
        let chosen = repository
            .select(&city_id, BoundarySelection::New(row(city_id, "1")))
            .await
            .expect("user selection");

        let kept = repository
            .select_if_unselected(&city_id, row(city_id, "2"))
            .await
            .expect("conditional selection");

        assert_eq!(kept.id, chosen.id);
        assert!(kept.is_selected);
        let rows = repository.list_for_city(&city_id).await.expect("list succeeds");
        assert_eq!(rows.len(), 1, "the unselected candidate must not be stored");
    }

    #[rstest]
    #[tokio::test]
    async fn conditional_selection_fills_an_empty_city(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();

        let selected = repository
            .select_if_unselected(&city_id, row(city_id, "7"))
            .await
            .expect("conditional selection");

        assert_eq!(selected.osm_id, "7");
        assert!(selected.is_selected);
        assert_eq!(selected_count(&repository, &city_id).await, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn rows_for_other_cities_are_rejected(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();
        let other = CityId::from_uuid(Uuid::new_v4());

        let error = repository
            .select(&city_id, BoundarySelection::New(row(other, "1")))
            .await
            .expect_err("foreign row rejected");

        assert!(matches!(error, BoundaryRepositoryError::InvariantViolation { .. }));
        assert_eq!(selected_count(&repository, &city_id).await, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn deleting_the_selection_leaves_city_unselected(city_id: CityId) {
        let repository = InMemoryBoundaryRepository::new();
        let selected = repository
            .select(&city_id, BoundarySelection::New(row(city_id, "1")))
            .await
            .expect("selection");

        assert!(repository.delete(&city_id, &selected.id).await.expect("delete"));
        assert!(!repository.delete(&city_id, &selected.id).await.expect("delete"));
        assert!(repository.find_selected(&city_id).await.expect("lookup").is_none());
    }
}
