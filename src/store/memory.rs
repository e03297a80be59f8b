//! In-process backend with the same atomicity guarantees as `PgStore`: every
//! operation runs under one `tokio::sync::Mutex` guard, so check-then-act
//! sequences cannot interleave. Used by the test suite and for local runs
//! without Postgres.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    FilmStore, HallStore, ScreeningStore, SeatInventory, SlotClaim, StoreError, StoreResult,
    TicketStore, UserStore,
};
use crate::models::{
    Film, FilmFilter, Hall, HallSeat, NewFilm, NewUser, Screening, ScreeningDraft,
    ScreeningSummary, SeatLayout, SeatSlot, SlotConflict, Ticket, TicketStatus, TicketView, User,
};

#[derive(Debug, Default)]
struct State {
    last_id: i64,
    films: BTreeMap<i64, Film>,
    halls: BTreeMap<i64, Hall>,
    screenings: BTreeMap<i64, Screening>,
    slots: BTreeMap<i64, SeatSlot>,
    tickets: BTreeMap<i64, Ticket>,
    users: BTreeMap<i64, User>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn remove_screenings_where(&mut self, predicate: impl Fn(&Screening) -> bool) -> Vec<i64> {
        let doomed: BTreeSet<i64> = self
            .screenings
            .values()
            .filter(|screening| predicate(screening))
            .map(|screening| screening.id)
            .collect();
        if doomed.is_empty() {
            return Vec::new();
        }
        self.screenings.retain(|id, _| !doomed.contains(id));
        let dropped_slots: HashSet<i64> = self
            .slots
            .values()
            .filter(|slot| doomed.contains(&slot.screening_id))
            .map(|slot| slot.id)
            .collect();
        self.slots.retain(|id, _| !dropped_slots.contains(id));
        self.tickets
            .retain(|_, ticket| !dropped_slots.contains(&ticket.slot_id));
        doomed.into_iter().collect()
    }
}

fn conflict_to_error(slot_id: i64, conflict: SlotConflict) -> StoreError {
    match conflict {
        SlotConflict::AlreadyTaken => StoreError::SlotTaken(slot_id),
        SlotConflict::VersionConflict { expected, .. } => {
            StoreError::VersionConflict { slot_id, expected }
        }
    }
}

fn claim_in(
    slots: &mut BTreeMap<i64, SeatSlot>,
    slot_id: i64,
    expected_version: i32,
) -> StoreResult<SeatSlot> {
    let slot = slots
        .get_mut(&slot_id)
        .ok_or(StoreError::SlotNotFound(slot_id))?;
    slot.claim(expected_version)
        .map_err(|conflict| conflict_to_error(slot_id, conflict))?;
    Ok(slot.clone())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilmStore for MemoryStore {
    async fn add_film(&self, film: NewFilm) -> StoreResult<Film> {
        let mut state = self.state.lock().await;
        if state.films.values().any(|existing| existing.title == film.title) {
            return Err(StoreError::Duplicate("film title"));
        }
        let film = Film {
            id: state.next_id(),
            title: film.title,
            category: film.category,
            year: film.year,
            duration_in_minutes: film.duration_in_minutes,
        };
        state.films.insert(film.id, film.clone());
        Ok(film)
    }

    async fn film_by_id(&self, id: i64) -> StoreResult<Option<Film>> {
        Ok(self.state.lock().await.films.get(&id).cloned())
    }

    async fn list_films(&self, filter: &FilmFilter) -> StoreResult<Vec<Film>> {
        let state = self.state.lock().await;
        let mut films: Vec<Film> = state
            .films
            .values()
            .filter(|film| filter.matches(film))
            .cloned()
            .collect();
        films.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(films)
    }

    async fn delete_film_by_title(&self, title: &str) -> StoreResult<Option<Vec<i64>>> {
        let mut state = self.state.lock().await;
        let Some(id) = state
            .films
            .values()
            .find(|film| film.title == title)
            .map(|film| film.id)
        else {
            return Ok(None);
        };
        state.films.remove(&id);
        Ok(Some(
            state.remove_screenings_where(|screening| screening.film_id == id),
        ))
    }
}

#[async_trait]
impl HallStore for MemoryStore {
    async fn add_hall(&self, layout: &SeatLayout) -> StoreResult<Hall> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let seats = layout
            .positions()
            .iter()
            .map(|position| HallSeat {
                id: state.next_id(),
                row: position.row,
                number: position.number,
            })
            .collect();
        let hall = Hall { id, seats };
        state.halls.insert(id, hall.clone());
        Ok(hall)
    }

    async fn hall_by_id(&self, id: i64) -> StoreResult<Option<Hall>> {
        Ok(self.state.lock().await.halls.get(&id).cloned())
    }

    async fn list_halls(&self) -> StoreResult<Vec<Hall>> {
        Ok(self.state.lock().await.halls.values().cloned().collect())
    }

    async fn delete_hall(&self, id: i64) -> StoreResult<Option<Vec<i64>>> {
        let mut state = self.state.lock().await;
        if state.halls.remove(&id).is_none() {
            return Ok(None);
        }
        Ok(Some(
            state.remove_screenings_where(|screening| screening.hall_id == id),
        ))
    }
}

#[async_trait]
impl ScreeningStore for MemoryStore {
    async fn insert_screening(&self, draft: ScreeningDraft) -> StoreResult<Screening> {
        let mut state = self.state.lock().await;
        let collides = state
            .screenings
            .values()
            .filter(|existing| existing.hall_id == draft.hall_id)
            .any(|existing| existing.window().overlaps(&draft.window));
        if collides {
            return Err(StoreError::HallOverlap(draft.hall_id));
        }
        let seats = state
            .halls
            .get(&draft.hall_id)
            .map(|hall| hall.seats.clone())
            .ok_or(StoreError::HallMissing(draft.hall_id))?;

        let screening = Screening {
            id: state.next_id(),
            start_time: draft.window.start,
            end_time: draft.window.end,
            film_id: draft.film_id,
            hall_id: draft.hall_id,
        };
        for seat in seats {
            let slot = SeatSlot {
                id: state.next_id(),
                screening_id: screening.id,
                seat_id: seat.id,
                row: seat.row,
                number: seat.number,
                free: true,
                version: 0,
            };
            state.slots.insert(slot.id, slot);
        }
        state.screenings.insert(screening.id, screening.clone());
        Ok(screening)
    }

    async fn screening_by_id(&self, id: i64) -> StoreResult<Option<Screening>> {
        Ok(self.state.lock().await.screenings.get(&id).cloned())
    }

    async fn list_screenings(&self, date: Option<NaiveDate>) -> StoreResult<Vec<ScreeningSummary>> {
        let state = self.state.lock().await;
        let mut summaries: Vec<ScreeningSummary> = state
            .screenings
            .values()
            .filter(|screening| date.is_none_or(|day| screening.start_time.date() == day))
            .filter_map(|screening| {
                let film = state.films.get(&screening.film_id)?;
                Some(ScreeningSummary {
                    id: screening.id,
                    start_time: screening.start_time,
                    end_time: screening.end_time,
                    film_id: film.id,
                    film_title: film.title.clone(),
                    hall_id: screening.hall_id,
                })
            })
            .collect();
        summaries.sort_by_key(|summary| (summary.start_time, summary.id));
        Ok(summaries)
    }

    async fn delete_screening(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        Ok(!state.remove_screenings_where(|screening| screening.id == id) .is_empty())
    }
}

#[async_trait]
impl SeatInventory for MemoryStore {
    async fn slots_for_screening(&self, screening_id: i64) -> StoreResult<Vec<SeatSlot>> {
        let state = self.state.lock().await;
        let mut slots: Vec<SeatSlot> = state
            .slots
            .values()
            .filter(|slot| slot.screening_id == screening_id)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| (slot.row, slot.number));
        Ok(slots)
    }

    async fn slot_by_id(&self, slot_id: i64) -> StoreResult<Option<SeatSlot>> {
        Ok(self.state.lock().await.slots.get(&slot_id).cloned())
    }

    async fn claim(&self, slot_id: i64, expected_version: i32) -> StoreResult<SeatSlot> {
        let mut state = self.state.lock().await;
        claim_in(&mut state.slots, slot_id, expected_version)
    }

    async fn release(&self, slot_id: i64) -> StoreResult<SeatSlot> {
        let mut state = self.state.lock().await;
        let slot = state
            .slots
            .get_mut(&slot_id)
            .ok_or(StoreError::SlotNotFound(slot_id))?;
        slot.release();
        Ok(slot.clone())
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn book_slots(&self, user_id: i64, claims: &[SlotClaim]) -> StoreResult<Vec<Ticket>> {
        let mut state = self.state.lock().await;

        // Dry run on a copy of the touched slots; commit only if every claim holds.
        let mut staged: BTreeMap<i64, SeatSlot> = claims
            .iter()
            .filter_map(|claim| state.slots.get(&claim.slot_id))
            .map(|slot| (slot.id, slot.clone()))
            .collect();
        for claim in claims {
            claim_in(&mut staged, claim.slot_id, claim.expected_version)?;
        }
        state.slots.extend(staged);

        let mut tickets = Vec::with_capacity(claims.len());
        for claim in claims {
            let ticket = Ticket {
                id: state.next_id(),
                status: TicketStatus::Booked,
                slot_id: claim.slot_id,
                user_id,
            };
            state.tickets.insert(ticket.id, ticket.clone());
            tickets.push(ticket);
        }
        Ok(tickets)
    }

    async fn ticket_for_user(&self, ticket_id: i64, user_id: i64) -> StoreResult<Option<Ticket>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .get(&ticket_id)
            .filter(|ticket| ticket.user_id == user_id)
            .cloned())
    }

    async fn cancel_ticket(&self, ticket_id: i64) -> StoreResult<Ticket> {
        let mut state = self.state.lock().await;
        let ticket = state
            .tickets
            .get(&ticket_id)
            .filter(|ticket| ticket.status == TicketStatus::Booked)
            .cloned()
            .ok_or(StoreError::TicketNotBooked(ticket_id))?;
        let slot = state
            .slots
            .get_mut(&ticket.slot_id)
            .ok_or(StoreError::SlotNotFound(ticket.slot_id))?;
        slot.release();

        let cancelled = Ticket {
            status: TicketStatus::Cancelled,
            ..ticket
        };
        state.tickets.insert(ticket_id, cancelled.clone());
        Ok(cancelled)
    }

    async fn tickets_for_user(&self, user_id: i64) -> StoreResult<Vec<TicketView>> {
        let state = self.state.lock().await;
        let views = state
            .tickets
            .values()
            .filter(|ticket| ticket.user_id == user_id)
            .filter_map(|ticket| {
                let slot = state.slots.get(&ticket.slot_id)?;
                let screening = state.screenings.get(&slot.screening_id)?;
                let film = state.films.get(&screening.film_id)?;
                Some(TicketView {
                    id: ticket.id,
                    status: ticket.status,
                    screening_id: screening.id,
                    film_title: film.title.clone(),
                    start_time: screening.start_time,
                    hall_id: screening.hall_id,
                    row: slot.row,
                    number: slot.number,
                })
            })
            .collect();
        Ok(views)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn add_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|existing| existing.mail == user.mail) {
            return Err(StoreError::Duplicate("user mail"));
        }
        let user = User {
            id: state.next_id(),
            mail: user.mail,
            password_hash: user.password_hash,
            role: user.role,
            password_reset_token: None,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_mail(&self, mail: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|user| user.mail == mail).cloned())
    }

    async fn user_by_reset_token(&self, token: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|user| user.password_reset_token == Some(token))
            .cloned())
    }

    async fn set_reset_token(&self, user_id: i64, token: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_reset_token = Some(token);
        }
        Ok(())
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
            user.password_reset_token = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilmCategory, ScreeningWindow, SeatPosition};
    use chrono::Duration;

    async fn seeded() -> (MemoryStore, Screening) {
        let store = MemoryStore::new();
        let film = store
            .add_film(NewFilm {
                title: "Heat".into(),
                category: FilmCategory::Thriller,
                year: 1995,
                duration_in_minutes: 170,
            })
            .await
            .unwrap();
        let layout = SeatLayout::new([SeatPosition::new(1, 1), SeatPosition::new(1, 2)]).unwrap();
        let hall = store.add_hall(&layout).await.unwrap();
        let start = NaiveDate::from_ymd_opt(2030, 3, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let screening = store
            .insert_screening(ScreeningDraft {
                film_id: film.id,
                hall_id: hall.id,
                window: ScreeningWindow::new(start, film.duration()),
            })
            .await
            .unwrap();
        (store, screening)
    }

    #[tokio::test]
    async fn claim_reports_not_found_taken_and_stale_version() {
        let (store, screening) = seeded().await;
        let slots = store.slots_for_screening(screening.id).await.unwrap();
        let slot = &slots[0];

        assert!(matches!(store.claim(-1, 0).await, Err(StoreError::SlotNotFound(-1))));
        store.claim(slot.id, 0).await.unwrap();
        assert!(matches!(store.claim(slot.id, 1).await, Err(StoreError::SlotTaken(_))));

        store.release(slot.id).await.unwrap();
        assert!(matches!(
            store.claim(slot.id, 0).await,
            Err(StoreError::VersionConflict { expected: 0, .. })
        ));
    }

    #[tokio::test]
    async fn failed_batch_leaves_every_slot_untouched() {
        let (store, screening) = seeded().await;
        let slots = store.slots_for_screening(screening.id).await.unwrap();
        store.claim(slots[1].id, 0).await.unwrap();

        let claims = [
            SlotClaim { slot_id: slots[0].id, expected_version: 0 },
            SlotClaim { slot_id: slots[1].id, expected_version: 0 },
        ];
        assert!(matches!(
            store.book_slots(7, &claims).await,
            Err(StoreError::SlotTaken(id)) if id == slots[1].id
        ));

        let after = store.slots_for_screening(screening.id).await.unwrap();
        assert!(after[0].free);
        assert_eq!(after[0].version, 0);
        assert!(store.tickets_for_user(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_insert_is_rejected() {
        let (store, screening) = seeded().await;
        let err = store
            .insert_screening(ScreeningDraft {
                film_id: screening.film_id,
                hall_id: screening.hall_id,
                window: ScreeningWindow::new(
                    screening.end_time - Duration::minutes(1),
                    Duration::minutes(60),
                ),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::HallOverlap(id) if id == screening.hall_id));
    }

    #[tokio::test]
    async fn deleting_a_screening_drops_its_slots_and_tickets() {
        let (store, screening) = seeded().await;
        let slots = store.slots_for_screening(screening.id).await.unwrap();
        store
            .book_slots(3, &[SlotClaim { slot_id: slots[0].id, expected_version: 0 }])
            .await
            .unwrap();

        assert!(store.delete_screening(screening.id).await.unwrap());
        assert!(store.slots_for_screening(screening.id).await.unwrap().is_empty());
        assert!(store.tickets_for_user(3).await.unwrap().is_empty());
        assert!(!store.delete_screening(screening.id).await.unwrap());
    }

    #[tokio::test]
    async fn insert_into_deleted_hall_is_refused() {
        let (store, screening) = seeded().await;
        assert_eq!(
            store.delete_hall(screening.hall_id).await.unwrap(),
            Some(vec![screening.id])
        );

        let err = store
            .insert_screening(ScreeningDraft {
                film_id: screening.film_id,
                hall_id: screening.hall_id,
                window: ScreeningWindow::new(screening.start_time, Duration::minutes(90)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::HallMissing(id) if id == screening.hall_id));
        assert!(store.list_screenings(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn film_delete_reports_cascaded_screenings() {
        let (store, screening) = seeded().await;
        assert_eq!(
            store.delete_film_by_title("Heat").await.unwrap(),
            Some(vec![screening.id])
        );
        assert!(store.slots_for_screening(screening.id).await.unwrap().is_empty());
        assert_eq!(store.delete_film_by_title("Heat").await.unwrap(), None);
    }
}
