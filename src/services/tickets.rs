use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::policy::{TicketBookingPolicy, TicketCancellingPolicy};
use crate::clock::Clock;
use crate::error::{CinemaError, CinemaResult};
use crate::models::{SeatSlot, Ticket, TicketView};
use crate::store::{CinemaStore, SlotClaim, StoreError};

/// A cancelled ticket and the screening whose seat it gave back.
#[derive(Debug, Clone)]
pub struct Cancellation {
    pub ticket: Ticket,
    pub screening_id: i64,
}

/// Books and cancels tickets on top of the seat inventory.
pub struct TicketLifecycle<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    booking_policy: TicketBookingPolicy,
    cancelling_policy: TicketCancellingPolicy,
}

impl<S: CinemaStore> TicketLifecycle<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        booking_policy: TicketBookingPolicy,
        cancelling_policy: TicketCancellingPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            booking_policy,
            cancelling_policy,
        }
    }

    /// Books every requested seat or none of them.
    pub async fn book(
        &self,
        screening_id: i64,
        user_id: i64,
        seat_ids: &[i64],
    ) -> CinemaResult<Vec<Ticket>> {
        if seat_ids.is_empty() {
            return Err(CinemaError::NoSeatsRequested);
        }

        let screening = self
            .store
            .screening_by_id(screening_id)
            .await?
            .ok_or(CinemaError::ScreeningNotFound)?;

        self.booking_policy
            .check(screening.time_to_start(self.clock.now()))?;

        let slots: HashMap<i64, SeatSlot> = self
            .store
            .slots_for_screening(screening.id)
            .await?
            .into_iter()
            .map(|slot| (slot.id, slot))
            .collect();

        // Keep the caller's order; a repeated id would only fight itself.
        let mut seen = HashSet::new();
        let claims = seat_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .map(|id| {
                slots
                    .get(id)
                    .map(|slot| SlotClaim {
                        slot_id: slot.id,
                        expected_version: slot.version,
                    })
                    .ok_or(CinemaError::SeatNotFound)
            })
            .collect::<CinemaResult<Vec<_>>>()?;

        match self.store.book_slots(user_id, &claims).await {
            Ok(tickets) => {
                info!(
                    screening_id,
                    user_id,
                    tickets = tickets.len(),
                    "tickets booked"
                );
                Ok(tickets)
            }
            Err(StoreError::SlotTaken(slot_id)) => {
                debug!(screening_id, slot_id, "seat already taken");
                Err(CinemaError::SeatAlreadyTaken)
            }
            Err(StoreError::VersionConflict { slot_id, expected }) => {
                warn!(screening_id, slot_id, expected, "lost race for seat");
                Err(CinemaError::SeatAlreadyTaken)
            }
            Err(StoreError::SlotNotFound(_)) => Err(CinemaError::SeatNotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn cancel(&self, ticket_id: i64, user_id: i64) -> CinemaResult<Cancellation> {
        let ticket = self
            .store
            .ticket_for_user(ticket_id, user_id)
            .await?
            .ok_or(CinemaError::TicketNotFound)?;
        if ticket.is_cancelled() {
            return Err(CinemaError::TicketAlreadyCancelled);
        }

        let slot = self
            .store
            .slot_by_id(ticket.slot_id)
            .await?
            .ok_or(CinemaError::SeatNotFound)?;
        let screening = self
            .store
            .screening_by_id(slot.screening_id)
            .await?
            .ok_or(CinemaError::ScreeningNotFound)?;

        self.cancelling_policy
            .check(screening.time_to_start(self.clock.now()))?;

        match self.store.cancel_ticket(ticket.id).await {
            Ok(cancelled) => {
                info!(ticket_id, user_id, slot_id = slot.id, "ticket cancelled");
                Ok(Cancellation {
                    ticket: cancelled,
                    screening_id: screening.id,
                })
            }
            Err(StoreError::TicketNotBooked(_)) => Err(CinemaError::TicketAlreadyCancelled),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, user_id: i64) -> CinemaResult<Vec<TicketView>> {
        Ok(self.store.tickets_for_user(user_id).await?)
    }
}
