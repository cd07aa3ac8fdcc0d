use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Occupancy status of a storage slot. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Full,
    Empty,
    Reserved,
}

impl CellStatus {
    pub const ALL: [CellStatus; 3] = [CellStatus::Full, CellStatus::Empty, CellStatus::Reserved];

    pub fn as_str(&self) -> &'static str {
        match self {
            CellStatus::Full => "full",
            CellStatus::Empty => "empty",
            CellStatus::Reserved => "reserved",
        }
    }

    /// Allowed lifecycle edges:
    /// Empty -> Reserved -> Full -> Empty, Empty -> Full, Reserved -> Empty (release).
    pub fn can_transition(self, to: CellStatus) -> bool {
        matches!(
            (self, to),
            (CellStatus::Empty, CellStatus::Reserved)
                | (CellStatus::Empty, CellStatus::Full)
                | (CellStatus::Reserved, CellStatus::Full)
                | (CellStatus::Reserved, CellStatus::Empty)
                | (CellStatus::Full, CellStatus::Empty)
        )
    }

    pub fn transition(self, to: CellStatus) -> Result<CellStatus, EngineError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(EngineError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(CellStatus::Full),
            "empty" => Ok(CellStatus::Empty),
            "reserved" => Ok(CellStatus::Reserved),
            _ => Err(EngineError::Parse { what: "cell status", value: s.to_string() }),
        }
    }
}

/// Stored cell type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    #[serde(rename = "LB")]
    Lb,
    #[serde(rename = "PBMC")]
    Pbmc,
}

impl CellType {
    pub const ALL: [CellType; 2] = [CellType::Lb, CellType::Pbmc];

    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Lb => "LB",
            CellType::Pbmc => "PBMC",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LB" => Ok(CellType::Lb),
            "PBMC" => Ok(CellType::Pbmc),
            _ => Err(EngineError::Parse { what: "cell type", value: s.to_string() }),
        }
    }
}

/// What a filled slot holds. Applied by [`Cell::fill`] and [`Cell::update_contents`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellContents {
    pub name: Option<String>,
    pub cell_type: Option<CellType>,
    pub cell_count: u32,
    pub sample_count: u32,
    pub keywords: String,
    pub freeze_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub owner: Option<String>,
    pub comment: Option<String>,
}

/// One storage slot within a box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Opaque identifier; not guaranteed unique.
    pub id: String,
    pub name: Option<String>,
    /// 1-based row
    pub row: u32,
    /// 1-based column
    pub col: u32,
    /// 1-based row-major index: (row-1) * cols + (col-1) + 1
    pub position: u32,
    pub status: CellStatus,
    pub cell_type: Option<CellType>,
    pub cell_count: u32,
    pub sample_count: u32,
    /// Comma-separated tags
    pub keywords: String,
    pub freeze_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub owner: Option<String>,
    pub reserved_by: Option<String>,
    pub reserved_for: Option<String>,
    pub comment: Option<String>,
}

impl Cell {
    /// An unoccupied slot.
    pub fn empty(id: impl Into<String>, row: u32, col: u32, position: u32) -> Self {
        Self {
            id: id.into(),
            name: None,
            row,
            col,
            position,
            status: CellStatus::Empty,
            cell_type: None,
            cell_count: 0,
            sample_count: 0,
            keywords: String::new(),
            freeze_date: None,
            expiry_date: None,
            owner: None,
            reserved_by: None,
            reserved_for: None,
            comment: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.status == CellStatus::Full
    }

    pub fn is_empty(&self) -> bool {
        self.status == CellStatus::Empty
    }

    pub fn is_reserved(&self) -> bool {
        self.status == CellStatus::Reserved
    }

    /// Keywords split on commas, trimmed, blanks dropped.
    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect()
    }

    /// Reserve this slot. Only an empty slot can be reserved.
    pub fn reserve(&mut self, by: impl Into<String>, purpose: Option<String>) -> Result<(), EngineError> {
        self.status = self.status.transition(CellStatus::Reserved)?;
        self.reserved_by = Some(by.into());
        self.reserved_for = purpose;
        Ok(())
    }

    /// Drop a reservation, returning the slot to empty.
    pub fn release(&mut self) -> Result<(), EngineError> {
        if !self.is_reserved() {
            return Err(EngineError::WrongStatus { expected: CellStatus::Reserved, actual: self.status });
        }
        self.status = self.status.transition(CellStatus::Empty)?;
        self.clear_fields();
        Ok(())
    }

    /// Store a sample in an empty or reserved slot.
    pub fn fill(&mut self, contents: CellContents) -> Result<(), EngineError> {
        self.status = self.status.transition(CellStatus::Full)?;
        self.reserved_by = None;
        self.reserved_for = None;
        self.apply_contents(contents);
        Ok(())
    }

    /// Modify what a full slot holds without changing its status.
    pub fn update_contents(&mut self, contents: CellContents) -> Result<(), EngineError> {
        if !self.is_full() {
            return Err(EngineError::WrongStatus { expected: CellStatus::Full, actual: self.status });
        }
        self.apply_contents(contents);
        Ok(())
    }

    /// Remove the sample from a full slot.
    pub fn clear(&mut self) -> Result<(), EngineError> {
        self.status = self.status.transition(CellStatus::Empty)?;
        self.clear_fields();
        Ok(())
    }

    /// Enforce the per-status field rules: counts only when full,
    /// reservation fields only when reserved, no type when empty.
    pub fn normalize(&mut self) {
        match self.status {
            CellStatus::Full => {
                self.reserved_by = None;
                self.reserved_for = None;
            }
            CellStatus::Reserved => {
                self.cell_count = 0;
                self.sample_count = 0;
            }
            CellStatus::Empty => self.clear_fields(),
        }
    }

    fn apply_contents(&mut self, contents: CellContents) {
        self.name = contents.name;
        self.cell_type = contents.cell_type;
        self.cell_count = contents.cell_count;
        self.sample_count = contents.sample_count;
        self.keywords = contents.keywords;
        self.freeze_date = contents.freeze_date;
        self.expiry_date = contents.expiry_date;
        self.owner = contents.owner;
        self.comment = contents.comment;
    }

    fn clear_fields(&mut self) {
        self.name = None;
        self.cell_type = None;
        self.cell_count = 0;
        self.sample_count = 0;
        self.keywords.clear();
        self.freeze_date = None;
        self.expiry_date = None;
        self.owner = None;
        self.reserved_by = None;
        self.reserved_for = None;
        self.comment = None;
    }
}
