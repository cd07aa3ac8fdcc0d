//! Form validation for cells, containers and reservations
//!
//! Each form collects every failing field instead of stopping at the first,
//! so a caller can report them together.
//!
//! ## Limits
//!
//! - Cell identifier: required, at most 64 characters
//! - Comments: at most 1000 characters
//! - Box name: required, at most 50 characters; grid axes within 6..=12

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellContents, CellStatus, CellType};
use crate::geometry::{BoxGeometry, DEFAULT_COLS, DEFAULT_ROWS, FORM_AXIS_RANGE};
use crate::inventory::{RackId, TankId};
use crate::reservation::ReservationStatus;

pub const MAX_IDENTIFIER_LEN: usize = 64;
pub const MAX_COMMENT_LEN: usize = 1000;
pub const MAX_BOX_NAME_LEN: usize = 50;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(ValidationError { field, message: message.into() });
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn check_comment(errors: &mut ValidationErrors, comment: Option<&str>) {
    if let Some(comment) = comment {
        if comment.chars().count() > MAX_COMMENT_LEN {
            errors.push("comment", format!("at most {MAX_COMMENT_LEN} characters"));
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

// ============================================================================
// Cell
// ============================================================================

/// Add/modify cell form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellForm {
    pub identifier: String,
    pub name: Option<String>,
    pub cell_type: Option<CellType>,
    /// Millions of cells
    pub cell_count: u32,
    /// Samples per patient
    pub sample_count: u32,
    pub keywords: String,
    pub freeze_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub owner: Option<String>,
    pub comment: Option<String>,
}

impl Default for CellForm {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            name: None,
            cell_type: None,
            cell_count: 1,
            sample_count: 0,
            keywords: String::new(),
            freeze_date: None,
            expiry_date: None,
            owner: None,
            comment: None,
        }
    }
}

impl CellForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if is_blank(&self.identifier) {
            errors.push("identifier", "required");
        } else if self.identifier.chars().count() > MAX_IDENTIFIER_LEN {
            errors.push("identifier", format!("at most {MAX_IDENTIFIER_LEN} characters"));
        }
        if self.cell_type.is_none() {
            errors.push("cell_type", "required");
        }
        if self.cell_count < 1 {
            errors.push("cell_count", "must be at least 1");
        }
        if let (Some(freeze), Some(expiry)) = (self.freeze_date, self.expiry_date) {
            if expiry < freeze {
                errors.push("expiry_date", "before the freeze date");
            }
        }
        check_comment(&mut errors, self.comment.as_deref());
        errors.into_result()
    }

    pub fn to_contents(&self) -> CellContents {
        CellContents {
            name: non_blank(&self.name),
            cell_type: self.cell_type,
            cell_count: self.cell_count,
            sample_count: self.sample_count,
            keywords: self.keywords.trim().to_string(),
            freeze_date: self.freeze_date,
            expiry_date: self.expiry_date,
            owner: non_blank(&self.owner),
            comment: non_blank(&self.comment),
        }
    }
}

// ============================================================================
// Containers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxForm {
    pub name: String,
    pub rack_id: Option<RackId>,
    pub rows: u32,
    pub cols: u32,
    pub description: Option<String>,
}

impl Default for BoxForm {
    fn default() -> Self {
        Self { name: String::new(), rack_id: None, rows: DEFAULT_ROWS, cols: DEFAULT_COLS, description: None }
    }
}

impl BoxForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if is_blank(&self.name) {
            errors.push("name", "required");
        } else if self.name.trim().chars().count() > MAX_BOX_NAME_LEN {
            errors.push("name", format!("at most {MAX_BOX_NAME_LEN} characters"));
        }
        if self.rack_id.is_none() {
            errors.push("rack", "select a rack");
        }
        if !FORM_AXIS_RANGE.contains(&self.rows) {
            errors.push("rows", format!("must be between {} and {}", FORM_AXIS_RANGE.start(), FORM_AXIS_RANGE.end()));
        }
        if !FORM_AXIS_RANGE.contains(&self.cols) {
            errors.push("cols", format!("must be between {} and {}", FORM_AXIS_RANGE.start(), FORM_AXIS_RANGE.end()));
        }
        errors.into_result()
    }

    /// Geometry of a validated form.
    pub fn geometry(&self) -> BoxGeometry {
        BoxGeometry::new(self.rows, self.cols).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RackForm {
    pub name: String,
    pub tank_id: Option<TankId>,
    pub capacity: Option<u32>,
    pub description: Option<String>,
}

impl RackForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if is_blank(&self.name) {
            errors.push("name", "required");
        }
        if self.tank_id.is_none() {
            errors.push("tank", "select a tank");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TankForm {
    pub name: String,
    pub location: String,
    pub capacity: Option<u32>,
    pub description: Option<String>,
}

impl TankForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if is_blank(&self.name) {
            errors.push("name", "required");
        }
        if is_blank(&self.location) {
            errors.push("location", "required");
        }
        errors.into_result()
    }
}

// ============================================================================
// Reservation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationForm {
    pub cell_id: String,
    pub reserved_by: String,
    pub reserved_for: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ReservationStatus,
    pub comment: String,
}

impl Default for ReservationForm {
    fn default() -> Self {
        Self {
            cell_id: String::new(),
            reserved_by: String::new(),
            reserved_for: String::new(),
            start_date: None,
            end_date: None,
            status: ReservationStatus::Pending,
            comment: String::new(),
        }
    }
}

impl ReservationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if is_blank(&self.cell_id) {
            errors.push("cell_id", "required");
        }
        if is_blank(&self.reserved_by) {
            errors.push("reserved_by", "required");
        }
        match (self.start_date, self.end_date) {
            (None, _) => errors.push("start_date", "required"),
            (Some(start), Some(end)) if end < start => errors.push("end_date", "before the start date"),
            _ => {}
        }
        if self.status.is_terminal() {
            errors.push("status", "a new reservation must be pending or active");
        }
        check_comment(&mut errors, Some(&self.comment));
        errors.into_result()
    }
}

// ============================================================================
// Stored records
// ============================================================================

/// Rules an occupied cell record must meet before it is stored without going
/// through a form (bulk import). Empty cells always pass.
pub fn validate_record(cell: &Cell) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if cell.is_empty() {
        return Ok(());
    }
    if is_blank(&cell.id) {
        errors.push("identifier", "required");
    } else if cell.id.chars().count() > MAX_IDENTIFIER_LEN {
        errors.push("identifier", format!("at most {MAX_IDENTIFIER_LEN} characters"));
    }
    match cell.status {
        CellStatus::Full => {
            if cell.cell_type.is_none() {
                errors.push("cell_type", "required for a full cell");
            }
            if cell.cell_count < 1 {
                errors.push("cell_count", "must be at least 1");
            }
            if let (Some(freeze), Some(expiry)) = (cell.freeze_date, cell.expiry_date) {
                if expiry < freeze {
                    errors.push("expiry_date", "before the freeze date");
                }
            }
        }
        CellStatus::Reserved => {
            if cell.reserved_by.as_deref().map_or(true, is_blank) {
                errors.push("reserved_by", "required for a reserved cell");
            }
        }
        CellStatus::Empty => {}
    }
    check_comment(&mut errors, cell.comment.as_deref());
    errors.into_result()
}
