//! Persistence seams for the scheduling and booking core.
//!
//! Every operation that has to be atomic lives behind one trait method so the
//! backend can run it inside a single transaction or critical section:
//! overlap check + screening insert, compare-and-swap on a seat slot, the
//! all-or-nothing claim of a whole booking, and cancel + release.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Film, FilmFilter, Hall, NewFilm, NewUser, Screening, ScreeningDraft, ScreeningSummary,
    SeatLayout, SeatSlot, Ticket, TicketView, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seat slot {0} not found")]
    SlotNotFound(i64),
    #[error("seat slot {0} is already taken")]
    SlotTaken(i64),
    #[error("seat slot {slot_id} changed since version {expected}")]
    VersionConflict { slot_id: i64, expected: i32 },
    #[error("ticket {0} is not booked")]
    TicketNotBooked(i64),
    #[error("screening overlaps another one in hall {0}")]
    HallOverlap(i64),
    #[error("hall {0} no longer exists")]
    HallMissing(i64),
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A slot the caller wants to take, with the version it read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClaim {
    pub slot_id: i64,
    pub expected_version: i32,
}

#[async_trait]
pub trait FilmStore: Send + Sync {
    /// Fails with `Duplicate("film title")` when the title is already used.
    async fn add_film(&self, film: NewFilm) -> StoreResult<Film>;
    async fn film_by_id(&self, id: i64) -> StoreResult<Option<Film>>;
    async fn list_films(&self, filter: &FilmFilter) -> StoreResult<Vec<Film>>;
    /// Ids of the screenings removed along with the film, `None` when no
    /// film had that title.
    async fn delete_film_by_title(&self, title: &str) -> StoreResult<Option<Vec<i64>>>;
}

#[async_trait]
pub trait HallStore: Send + Sync {
    async fn add_hall(&self, layout: &SeatLayout) -> StoreResult<Hall>;
    async fn hall_by_id(&self, id: i64) -> StoreResult<Option<Hall>>;
    async fn list_halls(&self) -> StoreResult<Vec<Hall>>;
    /// Same contract as `delete_film_by_title`.
    async fn delete_hall(&self, id: i64) -> StoreResult<Option<Vec<i64>>>;
}

#[async_trait]
pub trait ScreeningStore: Send + Sync {
    /// Checks the hall for an overlapping `[start, end)` window and, if clear,
    /// inserts the screening plus one free slot per hall seat. Both steps run
    /// serialized per hall; fails with `HallOverlap` on a collision and with
    /// `HallMissing` if the hall was deleted meanwhile.
    async fn insert_screening(&self, draft: ScreeningDraft) -> StoreResult<Screening>;
    async fn screening_by_id(&self, id: i64) -> StoreResult<Option<Screening>>;
    async fn list_screenings(&self, date: Option<NaiveDate>) -> StoreResult<Vec<ScreeningSummary>>;
    /// Removes the screening with its slots and tickets.
    async fn delete_screening(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait SeatInventory: Send + Sync {
    async fn slots_for_screening(&self, screening_id: i64) -> StoreResult<Vec<SeatSlot>>;
    async fn slot_by_id(&self, slot_id: i64) -> StoreResult<Option<SeatSlot>>;
    /// Compare-and-swap FREE -> TAKEN at `expected_version`.
    /// Errors: `SlotNotFound`, `SlotTaken`, `VersionConflict`, in that order.
    async fn claim(&self, slot_id: i64, expected_version: i32) -> StoreResult<SeatSlot>;
    async fn release(&self, slot_id: i64) -> StoreResult<SeatSlot>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Claims every slot in order and issues one BOOKED ticket per slot.
    /// Any claim failure leaves no slot taken and no ticket written.
    async fn book_slots(&self, user_id: i64, claims: &[SlotClaim]) -> StoreResult<Vec<Ticket>>;
    async fn ticket_for_user(&self, ticket_id: i64, user_id: i64) -> StoreResult<Option<Ticket>>;
    /// BOOKED -> CANCELLED and release of the ticket's slot, atomically.
    /// Fails with `TicketNotBooked` when the ticket was cancelled concurrently.
    async fn cancel_ticket(&self, ticket_id: i64) -> StoreResult<Ticket>;
    async fn tickets_for_user(&self, user_id: i64) -> StoreResult<Vec<TicketView>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Duplicate("user mail")` when the mail is taken.
    async fn add_user(&self, user: NewUser) -> StoreResult<User>;
    async fn user_by_mail(&self, mail: &str) -> StoreResult<Option<User>>;
    async fn user_by_reset_token(&self, token: Uuid) -> StoreResult<Option<User>>;
    async fn set_reset_token(&self, user_id: i64, token: Uuid) -> StoreResult<()>;
    /// Stores the new hash and clears any reset token.
    async fn update_password(&self, user_id: i64, password_hash: &str) -> StoreResult<()>;
}

/// Everything the services need from a backend.
pub trait CinemaStore:
    FilmStore + HallStore + ScreeningStore + SeatInventory + TicketStore + UserStore
{
}

impl<T> CinemaStore for T where
    T: FilmStore + HallStore + ScreeningStore + SeatInventory + TicketStore + UserStore
{
}
