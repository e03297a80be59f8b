use std::sync::Arc;
use tracing::info;

use crate::error::{CinemaError, CinemaResult};
use crate::models::{Film, FilmFilter, Hall, NewFilm, SeatLayout, SeatPosition};
use crate::store::{CinemaStore, StoreError};

/// Admin-side film and hall management.
pub struct CatalogService<S> {
    store: Arc<S>,
}

impl<S: CinemaStore> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create_film(&self, film: NewFilm) -> CinemaResult<Film> {
        match self.store.add_film(film).await {
            Ok(film) => {
                info!(film_id = film.id, title = %film.title, "film added");
                Ok(film)
            }
            Err(StoreError::Duplicate(_)) => Err(CinemaError::FilmTitleTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the ids of the screenings deleted with the film.
    pub async fn delete_film(&self, title: &str) -> CinemaResult<Vec<i64>> {
        let screenings = self
            .store
            .delete_film_by_title(title)
            .await?
            .ok_or(CinemaError::FilmNotFound)?;
        info!(title, screenings = screenings.len(), "film deleted");
        Ok(screenings)
    }

    pub async fn list_films(&self, filter: &FilmFilter) -> CinemaResult<Vec<Film>> {
        Ok(self.store.list_films(filter).await?)
    }

    pub async fn create_hall(&self, seats: Vec<SeatPosition>) -> CinemaResult<Hall> {
        let layout = SeatLayout::new(seats)?;
        let hall = self.store.add_hall(&layout).await?;
        info!(hall_id = hall.id, seats = hall.seats.len(), "hall added");
        Ok(hall)
    }

    /// Returns the ids of the screenings deleted with the hall.
    pub async fn delete_hall(&self, hall_id: i64) -> CinemaResult<Vec<i64>> {
        let screenings = self
            .store
            .delete_hall(hall_id)
            .await?
            .ok_or(CinemaError::HallNotFound)?;
        info!(hall_id, screenings = screenings.len(), "hall deleted");
        Ok(screenings)
    }

    pub async fn list_halls(&self) -> CinemaResult<Vec<Hall>> {
        Ok(self.store.list_halls().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilmCategory, LayoutError};
    use crate::store::MemoryStore;

    fn catalog() -> CatalogService<MemoryStore> {
        CatalogService::new(Arc::new(MemoryStore::new()))
    }

    fn new_film(title: &str) -> NewFilm {
        NewFilm {
            title: title.into(),
            category: FilmCategory::Comedy,
            year: 1999,
            duration_in_minutes: 89,
        }
    }

    #[tokio::test]
    async fn film_titles_are_unique() {
        let catalog = catalog();
        catalog.create_film(new_film("Office Space")).await.unwrap();
        assert!(matches!(
            catalog.create_film(new_film("Office Space")).await,
            Err(CinemaError::FilmTitleTaken)
        ));
    }

    #[tokio::test]
    async fn delete_film_by_title() {
        let catalog = catalog();
        catalog.create_film(new_film("Clerks")).await.unwrap();
        catalog.delete_film("Clerks").await.unwrap();
        assert!(matches!(
            catalog.delete_film("Clerks").await,
            Err(CinemaError::FilmNotFound)
        ));
        assert!(catalog
            .list_films(&FilmFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn hall_layout_is_validated() {
        let catalog = catalog();
        let err = catalog
            .create_hall(vec![SeatPosition::new(1, 1), SeatPosition::new(1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CinemaError::InvalidHallLayout(LayoutError::Duplicate { row: 1, number: 1 })
        ));

        let hall = catalog
            .create_hall(vec![SeatPosition::new(2, 1), SeatPosition::new(1, 1)])
            .await
            .unwrap();
        assert_eq!(hall.seats[0].row, 1);
        assert_eq!(catalog.list_halls().await.unwrap().len(), 1);

        catalog.delete_hall(hall.id).await.unwrap();
        assert!(matches!(
            catalog.delete_hall(hall.id).await,
            Err(CinemaError::HallNotFound)
        ));
    }
}
