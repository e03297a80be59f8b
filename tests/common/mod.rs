#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::sync::Arc;

use cinema::clock::FixedClock;
use cinema::models::{Film, FilmCategory, Hall, NewFilm, SeatPosition};
use cinema::services::{
    CatalogService, ScreeningDatePolicy, ScreeningScheduler, TicketBookingPolicy,
    TicketCancellingPolicy, TicketLifecycle,
};
use cinema::store::MemoryStore;

pub struct Cinema {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub catalog: CatalogService<MemoryStore>,
    pub scheduler: Arc<ScreeningScheduler<MemoryStore>>,
    pub tickets: Arc<TicketLifecycle<MemoryStore>>,
}

pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 3, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid date")
}

/// A start time comfortably inside the scheduling window.
pub fn in_ten_days() -> NaiveDateTime {
    now() + Duration::days(10)
}

impl Cinema {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        Self {
            catalog: CatalogService::new(store.clone()),
            scheduler: Arc::new(ScreeningScheduler::new(
                store.clone(),
                clock.clone(),
                ScreeningDatePolicy::default(),
            )),
            tickets: Arc::new(TicketLifecycle::new(
                store.clone(),
                clock.clone(),
                TicketBookingPolicy::default(),
                TicketCancellingPolicy::default(),
            )),
            store,
            clock,
        }
    }

    pub async fn film(&self, title: &str, minutes: i32) -> Film {
        self.catalog
            .create_film(NewFilm {
                title: title.into(),
                category: FilmCategory::Drama,
                year: 2024,
                duration_in_minutes: minutes,
            })
            .await
            .expect("film")
    }

    /// Hall with a single row of `seats` seats.
    pub async fn hall(&self, seats: i32) -> Hall {
        self.catalog
            .create_hall((1..=seats).map(|n| SeatPosition::new(1, n)).collect())
            .await
            .expect("hall")
    }
}
