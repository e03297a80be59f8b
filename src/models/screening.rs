use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Screening {
    pub id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub film_id: i64,
    pub hall_id: i64,
}

impl Screening {
    pub fn window(&self) -> ScreeningWindow {
        ScreeningWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Absolute distance between `now` and the start, in either direction.
    pub fn time_to_start(&self, now: NaiveDateTime) -> Duration {
        (self.start_time - now).abs()
    }
}

/// Half-open `[start, end)` interval a screening occupies in its hall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreeningWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ScreeningWindow {
    pub fn new(start: NaiveDateTime, duration: Duration) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    pub fn overlaps(&self, other: &ScreeningWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Everything needed to insert a screening; the store fills in ids and slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreeningDraft {
    pub film_id: i64,
    pub hall_id: i64,
    pub window: ScreeningWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ScreeningSummary {
    pub id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub film_id: i64,
    pub film_title: String,
    pub hall_id: i64,
}

/// Per-screening, per-seat claimable unit. `version` is bumped on every state change.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SeatSlot {
    pub id: i64,
    pub screening_id: i64,
    pub seat_id: i64,
    pub row: i32,
    pub number: i32,
    pub free: bool,
    pub version: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotConflict {
    AlreadyTaken,
    VersionConflict { expected: i32, actual: i32 },
}

impl SeatSlot {
    /// FREE -> TAKEN, only from the version the caller observed.
    pub fn claim(&mut self, expected_version: i32) -> Result<(), SlotConflict> {
        if !self.free {
            return Err(SlotConflict::AlreadyTaken);
        }
        if self.version != expected_version {
            return Err(SlotConflict::VersionConflict {
                expected: expected_version,
                actual: self.version,
            });
        }
        self.free = false;
        self.version += 1;
        Ok(())
    }

    /// TAKEN -> FREE.
    pub fn release(&mut self) {
        self.free = true;
        self.version += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat_id: i64,
    pub row: i32,
    pub number: i32,
    pub free: bool,
}

impl From<SeatSlot> for SeatView {
    fn from(slot: SeatSlot) -> Self {
        Self {
            seat_id: slot.id,
            row: slot.row,
            number: slot.number,
            free: slot.free,
        }
    }
}
