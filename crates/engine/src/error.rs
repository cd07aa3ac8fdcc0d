use std::fmt;

use crate::cell::CellStatus;
use crate::reservation::ReservationStatus;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Box geometry with a zero axis (or too many slots to address).
    InvalidGeometry { rows: u32, cols: u32 },
    /// A built grid has no cell at an in-range coordinate. Internal defect.
    CoordinateMiss { row: u32, col: u32 },
    /// Coordinate outside the box.
    OutOfRange { row: u32, col: u32, rows: u32, cols: u32 },
    /// Cell status change the lifecycle does not allow.
    InvalidTransition { from: CellStatus, to: CellStatus },
    /// Operation needs the cell in another status (update a full cell, release a reserved one).
    WrongStatus { expected: CellStatus, actual: CellStatus },
    /// Reservation status change the lifecycle does not allow.
    InvalidReservationTransition { from: ReservationStatus, to: ReservationStatus },
    /// Form input rejected (one entry per failing field).
    Validation(ValidationErrors),
    /// Unrecognised keyword for a tab, type or status.
    Parse { what: &'static str, value: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGeometry { rows, cols } => {
                write!(f, "invalid box geometry {rows}x{cols}: rows and cols must be positive")
            }
            Self::CoordinateMiss { row, col } => {
                write!(f, "internal error: no cell at in-range coordinate ({row}, {col})")
            }
            Self::OutOfRange { row, col, rows, cols } => {
                write!(f, "coordinate ({row}, {col}) is outside the {rows}x{cols} box")
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "cannot change cell status from {from} to {to}")
            }
            Self::WrongStatus { expected, actual } => {
                write!(f, "cell is {actual}, expected {expected}")
            }
            Self::InvalidReservationTransition { from, to } => {
                write!(f, "cannot change reservation status from {from} to {to}")
            }
            Self::Validation(errors) => write!(f, "{errors}"),
            Self::Parse { what, value } => write!(f, "unknown {what}: '{value}'"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
