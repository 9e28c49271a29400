use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct TheatreHall {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

impl TheatreHall {
    pub fn capacity(&self) -> i64 {
        self.dimensions().capacity()
    }

    pub fn dimensions(&self) -> HallDimensions {
        HallDimensions {
            rows: self.rows,
            seats_in_row: self.seats_in_row,
        }
    }
}

/// Physical size of a hall, all the seat checks need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct HallDimensions {
    pub rows: i32,
    pub seats_in_row: i32,
}

impl HallDimensions {
    pub fn new(rows: i32, seats_in_row: i32) -> Self {
        Self { rows, seats_in_row }
    }

    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }
}
