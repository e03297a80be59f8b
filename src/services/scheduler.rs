use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{info, warn};

use super::policy::ScreeningDatePolicy;
use crate::clock::Clock;
use crate::error::{CinemaError, CinemaResult};
use crate::models::{Screening, ScreeningDraft, ScreeningSummary, ScreeningWindow, SeatView};
use crate::store::{CinemaStore, StoreError};

/// Places screenings into a hall's time grid and exposes their seats.
pub struct ScreeningScheduler<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    date_policy: ScreeningDatePolicy,
}

impl<S: CinemaStore> ScreeningScheduler<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, date_policy: ScreeningDatePolicy) -> Self {
        Self {
            store,
            clock,
            date_policy,
        }
    }

    pub async fn create(
        &self,
        start_time: NaiveDateTime,
        film_id: i64,
        hall_id: i64,
    ) -> CinemaResult<Screening> {
        let film = self
            .store
            .film_by_id(film_id)
            .await?
            .ok_or(CinemaError::FilmNotFound)?;
        let hall = self
            .store
            .hall_by_id(hall_id)
            .await?
            .ok_or(CinemaError::HallNotFound)?;

        self.date_policy.check(self.clock.now(), start_time)?;

        let draft = ScreeningDraft {
            film_id: film.id,
            hall_id: hall.id,
            window: ScreeningWindow::new(start_time, film.duration()),
        };

        match self.store.insert_screening(draft).await {
            Ok(screening) => {
                info!(
                    screening_id = screening.id,
                    film = %film.title,
                    hall_id,
                    seats = hall.seats.len(),
                    start = %screening.start_time,
                    end = %screening.end_time,
                    "screening scheduled"
                );
                Ok(screening)
            }
            Err(StoreError::HallOverlap(_)) => {
                warn!(hall_id, start = %draft.window.start, end = %draft.window.end, "screening collision");
                Err(CinemaError::SchedulingConflict)
            }
            // Deleted between the lookup above and the insert.
            Err(StoreError::HallMissing(_)) => Err(CinemaError::HallNotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, screening_id: i64) -> CinemaResult<()> {
        if !self.store.delete_screening(screening_id).await? {
            return Err(CinemaError::ScreeningNotFound);
        }
        info!(screening_id, "screening deleted");
        Ok(())
    }

    pub async fn list(&self, date: Option<NaiveDate>) -> CinemaResult<Vec<ScreeningSummary>> {
        Ok(self.store.list_screenings(date).await?)
    }

    pub async fn seats(&self, screening_id: i64) -> CinemaResult<Vec<SeatView>> {
        let screening = self
            .store
            .screening_by_id(screening_id)
            .await?
            .ok_or(CinemaError::ScreeningNotFound)?;
        let slots = self.store.slots_for_screening(screening.id).await?;
        Ok(slots.into_iter().map(SeatView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{FilmCategory, NewFilm, SeatLayout, SeatPosition};
    use crate::store::{FilmStore, HallStore, MemoryStore};
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    async fn setup() -> (ScreeningScheduler<MemoryStore>, i64, i64) {
        let store = Arc::new(MemoryStore::new());
        let film = store
            .add_film(NewFilm {
                title: "Arrival".into(),
                category: FilmCategory::Drama,
                year: 2016,
                duration_in_minutes: 100,
            })
            .await
            .unwrap();
        let hall = store
            .add_hall(&SeatLayout::new([SeatPosition::new(1, 1), SeatPosition::new(1, 2)]).unwrap())
            .await
            .unwrap();
        let scheduler = ScreeningScheduler::new(
            store,
            Arc::new(FixedClock::new(now())),
            ScreeningDatePolicy::default(),
        );
        (scheduler, film.id, hall.id)
    }

    #[tokio::test]
    async fn create_materializes_one_free_slot_per_seat() {
        let (scheduler, film_id, hall_id) = setup().await;
        let start = now() + Duration::days(8);

        let screening = scheduler.create(start, film_id, hall_id).await.unwrap();
        assert_eq!(screening.end_time, start + Duration::minutes(100));

        let seats = scheduler.seats(screening.id).await.unwrap();
        assert_eq!(seats.len(), 2);
        assert!(seats.iter().all(|seat| seat.free));
    }

    #[tokio::test]
    async fn create_resolves_film_and_hall_before_the_date() {
        let (scheduler, film_id, hall_id) = setup().await;
        let bad_date = now() + Duration::days(2);
        assert!(matches!(
            scheduler.create(bad_date, 999, hall_id).await,
            Err(CinemaError::FilmNotFound)
        ));
        assert!(matches!(
            scheduler.create(bad_date, film_id, 999).await,
            Err(CinemaError::HallNotFound)
        ));
        assert!(matches!(
            scheduler.create(bad_date, film_id, hall_id).await,
            Err(CinemaError::DateOutOfRange)
        ));
    }

    #[tokio::test]
    async fn overlapping_screening_is_a_conflict_but_adjacent_is_fine() {
        let (scheduler, film_id, hall_id) = setup().await;
        let start = now() + Duration::days(10);
        scheduler.create(start, film_id, hall_id).await.unwrap();

        assert!(matches!(
            scheduler
                .create(start + Duration::minutes(99), film_id, hall_id)
                .await,
            Err(CinemaError::SchedulingConflict)
        ));
        assert!(matches!(
            scheduler
                .create(start - Duration::minutes(99), film_id, hall_id)
                .await,
            Err(CinemaError::SchedulingConflict)
        ));
        scheduler
            .create(start + Duration::minutes(100), film_id, hall_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_filters_by_day_and_sorts_by_start() {
        let (scheduler, film_id, hall_id) = setup().await;
        let day = now() + Duration::days(9);
        let late = scheduler
            .create(day + Duration::hours(6), film_id, hall_id)
            .await
            .unwrap();
        let early = scheduler.create(day, film_id, hall_id).await.unwrap();
        scheduler
            .create(day + Duration::days(1), film_id, hall_id)
            .await
            .unwrap();

        let listed = scheduler.list(Some(day.date())).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|summary| summary.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(listed[0].film_title, "Arrival");
        assert_eq!(scheduler.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_unknown_screening_is_not_found() {
        let (scheduler, film_id, hall_id) = setup().await;
        let screening = scheduler
            .create(now() + Duration::days(7), film_id, hall_id)
            .await
            .unwrap();
        scheduler.delete(screening.id).await.unwrap();
        assert!(matches!(
            scheduler.delete(screening.id).await,
            Err(CinemaError::ScreeningNotFound)
        ));
        assert!(matches!(
            scheduler.seats(screening.id).await,
            Err(CinemaError::ScreeningNotFound)
        ));
    }
}
