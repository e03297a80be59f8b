use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use thiserror::Error;

/// Physical position of a seat inside a hall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatPosition {
    pub row: i32,
    pub number: i32,
}

impl SeatPosition {
    pub fn new(row: i32, number: i32) -> Self {
        Self { row, number }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct HallSeat {
    pub id: i64,
    pub row: i32,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hall {
    pub id: i64,
    pub seats: Vec<HallSeat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("hall must have at least one seat")]
    Empty,
    #[error("seat row {row} number {number} is not a positive position")]
    InvalidPosition { row: i32, number: i32 },
    #[error("seat row {row} number {number} is listed twice")]
    Duplicate { row: i32, number: i32 },
}

/// Validated, immutable seat layout of a hall, ordered by row then number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatLayout {
    positions: Vec<SeatPosition>,
}

impl SeatLayout {
    pub fn new(positions: impl IntoIterator<Item = SeatPosition>) -> Result<Self, LayoutError> {
        let mut seen = HashSet::new();
        let mut positions: Vec<SeatPosition> = positions.into_iter().collect();
        if positions.is_empty() {
            return Err(LayoutError::Empty);
        }
        for position in &positions {
            if position.row < 1 || position.number < 1 {
                return Err(LayoutError::InvalidPosition {
                    row: position.row,
                    number: position.number,
                });
            }
            if !seen.insert(*position) {
                return Err(LayoutError::Duplicate {
                    row: position.row,
                    number: position.number,
                });
            }
        }
        positions.sort();
        Ok(Self { positions })
    }

    pub fn positions(&self) -> &[SeatPosition] {
        &self.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_sorted_by_row_then_number() {
        let layout = SeatLayout::new([
            SeatPosition::new(2, 1),
            SeatPosition::new(1, 2),
            SeatPosition::new(1, 1),
        ])
        .unwrap();
        assert_eq!(
            layout.positions(),
            &[
                SeatPosition::new(1, 1),
                SeatPosition::new(1, 2),
                SeatPosition::new(2, 1)
            ]
        );
    }

    #[test]
    fn layout_rejects_duplicates() {
        let err = SeatLayout::new([SeatPosition::new(1, 1), SeatPosition::new(1, 1)]).unwrap_err();
        assert_eq!(err, LayoutError::Duplicate { row: 1, number: 1 });
    }

    #[test]
    fn layout_rejects_empty_and_non_positive() {
        assert_eq!(SeatLayout::new([]).unwrap_err(), LayoutError::Empty);
        assert_eq!(
            SeatLayout::new([SeatPosition::new(0, 3)]).unwrap_err(),
            LayoutError::InvalidPosition { row: 0, number: 3 }
        );
    }
}
