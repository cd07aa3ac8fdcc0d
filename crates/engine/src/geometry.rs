//! Box geometry and coordinate mapping.
//!
//! Coordinates are 1-based `(row, col)`; positions are 1-based row-major
//! indices. `position = (row-1) * cols + (col-1) + 1` holds for every cell
//! a grid produces, so the spatial grid and the flat table address a slot
//! identically.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DEFAULT_ROWS: u32 = 9;
pub const DEFAULT_COLS: u32 = 9;

/// Rows/cols the box form offers per axis.
pub const FORM_AXIS_RANGE: RangeInclusive<u32> = 6..=12;

/// Rectangular arrangement of slots in a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGeometry")]
pub struct BoxGeometry {
    rows: u32,
    cols: u32,
}

#[derive(Deserialize)]
struct RawGeometry {
    rows: u32,
    cols: u32,
}

impl TryFrom<RawGeometry> for BoxGeometry {
    type Error = EngineError;

    fn try_from(raw: RawGeometry) -> Result<Self, Self::Error> {
        BoxGeometry::new(raw.rows, raw.cols)
    }
}

impl Default for BoxGeometry {
    fn default() -> Self {
        Self { rows: DEFAULT_ROWS, cols: DEFAULT_COLS }
    }
}

impl BoxGeometry {
    /// Validate and create. Both axes must be positive and the slot count
    /// must fit a `u32` position.
    pub fn new(rows: u32, cols: u32) -> Result<Self, EngineError> {
        if rows == 0 || cols == 0 || rows.checked_mul(cols).is_none() {
            return Err(EngineError::InvalidGeometry { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Both axes inside the range the box form offers.
    pub fn within_form_range(&self) -> bool {
        FORM_AXIS_RANGE.contains(&self.rows) && FORM_AXIS_RANGE.contains(&self.cols)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (1..=self.rows).contains(&row) && (1..=self.cols).contains(&col)
    }

    /// 1-based position of a 1-based coordinate.
    pub fn position_of(&self, row: u32, col: u32) -> Option<u32> {
        if !self.contains(row, col) {
            return None;
        }
        Some((row - 1) * self.cols + (col - 1) + 1)
    }

    /// Inverse of [`position_of`](Self::position_of).
    pub fn coords_of(&self, position: u32) -> Option<(u32, u32)> {
        if position == 0 || position as usize > self.len() {
            return None;
        }
        let index = position - 1;
        Some((index / self.cols + 1, index % self.cols + 1))
    }

    /// Fail with `OutOfRange` unless the coordinate is inside the box.
    pub fn check(&self, row: u32, col: u32) -> Result<u32, EngineError> {
        self.position_of(row, col).ok_or(EngineError::OutOfRange {
            row,
            col,
            rows: self.rows,
            cols: self.cols,
        })
    }
}

/// Letter label of a 1-based row: 1=A, 2=B, ..., 26=Z, 27=AA.
pub fn row_label(row: u32) -> String {
    let mut result = String::new();
    let mut n = row.saturating_sub(1);
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Parse a row given either as its letter label ("C", "aa") or a 1-based number.
pub fn parse_row(input: &str) -> Option<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<u32>() {
        return (n > 0).then_some(n);
    }
    let mut n: u32 = 0;
    for ch in trimmed.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n)
}
