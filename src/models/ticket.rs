use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "ticket_status", rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Booked,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub status: TicketStatus,
    pub slot_id: i64,
    pub user_id: i64,
}

impl Ticket {
    pub fn is_cancelled(&self) -> bool {
        self.status == TicketStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TicketView {
    pub id: i64,
    pub status: TicketStatus,
    pub screening_id: i64,
    pub film_title: String,
    pub start_time: NaiveDateTime,
    pub hall_id: i64,
    pub row: i32,
    pub number: i32,
}
