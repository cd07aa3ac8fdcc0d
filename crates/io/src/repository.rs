// Inventory repository: the storage seam between the engine and a backend
//
// Only occupied slots (full or reserved) are stored. Empty slots are derived
// when a box grid is built, so a fresh box needs no cell rows at all.

use std::fmt;

use rustc_hash::FxHashMap;

use cryobank_engine::cell::{Cell, CellStatus};
use cryobank_engine::events::{CellChange, EventCallback};
use cryobank_engine::geometry::{row_label, BoxGeometry};
use cryobank_engine::grid::{slot_id, BoxGrid, RecordOccupancy};
use cryobank_engine::inventory::{BoxId, Inventory, Rack, StorageBox, Tank};
use cryobank_engine::reservation::{Reservation, ReservationStatus};
use cryobank_engine::stats::Summary;
use cryobank_engine::validation::{
    validate_record, BoxForm, CellForm, RackForm, ReservationForm, TankForm, ValidationError, ValidationErrors,
};
use cryobank_engine::EngineError;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum RepoError {
    /// No tank/rack/box/cell/reservation with that key.
    NotFound { entity: &'static str, id: String },
    /// The request collides with stored state (duplicate key, reserved slot).
    Conflict(String),
    /// Rejected by the engine: validation, lifecycle or geometry.
    Engine(EngineError),
    /// Backend failure (SQLite, corrupt row).
    Storage(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(msg) => write!(f, "{msg}"),
            Self::Engine(e) => write!(f, "{e}"),
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for RepoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for RepoError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<ValidationErrors> for RepoError {
    fn from(e: ValidationErrors) -> Self {
        Self::Engine(EngineError::Validation(e))
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }
}

// ============================================================================
// Trait
// ============================================================================

/// A group of writes run through [`InventoryRepository::atomically`].
pub type BatchWork<'a> = dyn FnMut(&mut dyn InventoryRepository) -> Result<(), RepoError> + 'a;

/// Persistent inventory: containers, occupied cells and reservations.
///
/// Cells are addressed by box and 1-based `(row, col)`. Every mutation
/// validates its form, checks the coordinate against the box geometry and
/// goes through the cell lifecycle before anything is written; a rejected
/// mutation leaves the store untouched and emits no event.
pub trait InventoryRepository {
    fn list_tanks(&self) -> Result<Vec<Tank>, RepoError>;
    fn create_tank(&mut self, form: &TankForm) -> Result<Tank, RepoError>;

    fn list_racks(&self) -> Result<Vec<Rack>, RepoError>;
    fn create_rack(&mut self, form: &RackForm) -> Result<Rack, RepoError>;

    fn list_boxes(&self) -> Result<Vec<StorageBox>, RepoError>;
    fn get_box(&self, id: BoxId) -> Result<StorageBox, RepoError>;
    fn create_box(&mut self, form: &BoxForm) -> Result<StorageBox, RepoError>;

    /// Stored (occupied) cells of a box, by position.
    fn list_cells(&self, box_id: BoxId) -> Result<Vec<Cell>, RepoError>;
    /// The cell at a slot; an unstored slot comes back empty.
    fn get_cell(&self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError>;
    /// Store a sample in an empty or reserved slot.
    fn create_cell(&mut self, box_id: BoxId, row: u32, col: u32, form: &CellForm) -> Result<Cell, RepoError>;
    /// Modify a full slot.
    fn update_cell(&mut self, box_id: BoxId, row: u32, col: u32, form: &CellForm) -> Result<Cell, RepoError>;
    /// Remove the sample from a full slot. Returns the cell as it was.
    fn delete_cell(&mut self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError>;
    /// Reserve an empty slot and record the reservation.
    fn reserve_cell(&mut self, box_id: BoxId, row: u32, col: u32, form: &ReservationForm) -> Result<Reservation, RepoError>;
    /// Drop the reservation on a reserved slot; open reservations on it are cancelled.
    fn release_cell(&mut self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError>;
    /// Bulk-store the occupied cells of a built grid. Returns how many were stored.
    fn import_cells(&mut self, box_id: BoxId, cells: &[Cell]) -> Result<usize, RepoError>;

    fn list_reservations(&self) -> Result<Vec<Reservation>, RepoError>;
    /// Store a reservation as-is, not linked to any slot.
    fn import_reservation(&mut self, reservation: Reservation) -> Result<(), RepoError>;
    /// Move a reservation through its lifecycle. Closing one releases its slot.
    fn set_reservation_status(&mut self, id: &str, status: ReservationStatus) -> Result<Reservation, RepoError>;

    fn set_event_callback(&mut self, callback: Option<EventCallback>);

    /// Run `work` as one unit: if it returns an error, every write it made is
    /// undone. Events already emitted inside the batch are not retracted.
    fn atomically(&mut self, work: &mut BatchWork<'_>) -> Result<(), RepoError>;

    fn load_inventory(&self) -> Result<Inventory, RepoError> {
        Ok(Inventory::new(self.list_tanks()?, self.list_racks()?, self.list_boxes()?))
    }

    /// Grid of a stored box, empty slots filled in.
    fn box_grid(&self, box_id: BoxId) -> Result<BoxGrid, RepoError> {
        let storage_box = self.get_box(box_id)?;
        let cells = self.list_cells(box_id)?;
        Ok(BoxGrid::build(storage_box.geometry, &mut RecordOccupancy::new(cells)))
    }

    /// Summary of every box, for rack and tank roll-ups.
    fn box_summaries(&self) -> Result<FxHashMap<BoxId, Summary>, RepoError> {
        let mut summaries = FxHashMap::default();
        for storage_box in self.list_boxes()? {
            let cells = self.list_cells(storage_box.id)?;
            let grid = BoxGrid::build(storage_box.geometry, &mut RecordOccupancy::new(cells));
            summaries.insert(storage_box.id, grid.summary());
        }
        Ok(summaries)
    }
}

// ============================================================================
// Shared mutation rules
//
// Backends look up the stored record, run it through one of these, then
// write the result. Keeping the rules here makes both backends agree.
// ============================================================================

/// Reservation status change produced by a cell mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusChange {
    pub id: String,
    pub from: ReservationStatus,
    pub to: ReservationStatus,
}

/// "B3"
pub fn slot_label(row: u32, col: u32) -> String {
    format!("{}{}", row_label(row), col)
}

fn slot_key(box_id: BoxId, row: u32, col: u32) -> String {
    format!("{} in box {}", slot_label(row, col), box_id)
}

/// The stored record at a slot, or the derived empty cell.
pub(crate) fn slot_cell(record: Option<Cell>, row: u32, col: u32, position: u32) -> Cell {
    record.unwrap_or_else(|| Cell::empty(slot_id(position), row, col, position))
}

pub(crate) fn filled(slot: Cell, form: &CellForm) -> Result<Cell, RepoError> {
    form.validate()?;
    let mut cell = slot;
    cell.fill(form.to_contents())?;
    cell.id = form.identifier.trim().to_string();
    Ok(cell)
}

pub(crate) fn updated(slot: Cell, form: &CellForm) -> Result<Cell, RepoError> {
    form.validate()?;
    let mut cell = slot;
    cell.update_contents(form.to_contents())?;
    cell.id = form.identifier.trim().to_string();
    Ok(cell)
}

pub(crate) fn cleared(box_id: BoxId, slot: Cell) -> Result<Cell, RepoError> {
    match slot.status {
        CellStatus::Empty => Err(RepoError::not_found("cell", slot_key(box_id, slot.row, slot.col))),
        CellStatus::Reserved => Err(RepoError::Conflict(format!(
            "cell {} is reserved; release it instead",
            slot_key(box_id, slot.row, slot.col)
        ))),
        CellStatus::Full => {
            let mut cell = slot;
            cell.clear()?;
            Ok(cell)
        }
    }
}

pub(crate) fn reserved(slot: Cell, form: &ReservationForm) -> Result<Cell, RepoError> {
    form.validate()?;
    let mut cell = slot;
    let purpose = Some(form.reserved_for.trim().to_string()).filter(|p| !p.is_empty());
    cell.reserve(form.reserved_by.trim(), purpose)?;
    cell.id = form.cell_id.trim().to_string();
    Ok(cell)
}

pub(crate) fn released(slot: Cell) -> Result<Cell, RepoError> {
    let mut cell = slot;
    cell.release()?;
    Ok(cell)
}

/// Close the open reservations of a slot. Filling the slot completes active
/// reservations; anything else cancels them.
pub(crate) fn closing_changes(open: &[Reservation], filled: bool) -> Vec<StatusChange> {
    open.iter()
        .filter(|r| !r.status.is_terminal())
        .map(|r| {
            let to = if filled && r.status == ReservationStatus::Active {
                ReservationStatus::Completed
            } else {
                ReservationStatus::Cancelled
            };
            StatusChange { id: r.id.clone(), from: r.status, to }
        })
        .collect()
}

/// Next `RES-NNN` id after the highest numeric suffix in use.
pub(crate) fn next_reservation_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let max = ids
        .into_iter()
        .filter_map(|id| id.strip_prefix("RES-"))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("RES-{:03}", max.saturating_add(1))
}

pub(crate) fn new_reservation(id: String, cell: &Cell, location: String, form: &ReservationForm) -> Reservation {
    Reservation {
        id,
        cell_id: cell.id.clone(),
        location,
        reserved_by: form.reserved_by.trim().to_string(),
        reserved_for: form.reserved_for.trim().to_string(),
        // validate() guarantees a start date
        start_date: form.start_date.unwrap_or_default(),
        end_date: form.end_date,
        status: form.status,
        comment: form.comment.trim().to_string(),
    }
}

pub(crate) fn cell_change(box_id: BoxId, cell: &Cell) -> CellChange {
    CellChange { box_id, position: cell.position, cell_id: cell.id.clone(), status: cell.status }
}

/// Occupied cells of `cells`, checked against the box and re-addressed.
///
/// Every record must pass `validate_record`; failures from all rows are
/// reported together, tagged with their slot, and nothing is returned.
pub(crate) fn importable(geometry: BoxGeometry, cells: &[Cell]) -> Result<Vec<Cell>, RepoError> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    let mut errors = ValidationErrors::default();
    for cell in cells.iter().filter(|c| !c.is_empty()) {
        let position = geometry.check(cell.row, cell.col)?;
        if seen.contains(&position) {
            return Err(RepoError::Conflict(format!("two cells at {}", slot_label(cell.row, cell.col))));
        }
        seen.push(position);
        let mut cell = cell.clone();
        cell.position = position;
        cell.normalize();
        if let Err(rejected) = validate_record(&cell) {
            let slot = slot_label(cell.row, cell.col);
            errors.0.extend(
                rejected
                    .0
                    .into_iter()
                    .map(|e| ValidationError { field: e.field, message: format!("{} ({})", e.message, slot) }),
            );
        }
        out.push(cell);
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cryobank_engine::cell::CellType;

    fn form(identifier: &str) -> CellForm {
        CellForm { identifier: identifier.into(), cell_type: Some(CellType::Lb), cell_count: 10, ..CellForm::default() }
    }

    fn reservation(id: &str, status: ReservationStatus) -> Reservation {
        Reservation {
            id: id.into(),
            cell_id: "CELL-A1".into(),
            location: String::new(),
            reserved_by: "Dr. Martin".into(),
            reserved_for: String::new(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            end_date: None,
            status,
            comment: String::new(),
        }
    }

    #[test]
    fn test_slot_label() {
        assert_eq!(slot_label(2, 3), "B3");
        assert_eq!(slot_label(12, 12), "L12");
    }

    #[test]
    fn test_filled_sets_identifier() {
        let cell = filled(slot_cell(None, 1, 2, 2), &form(" 900002ABC ")).unwrap();
        assert!(cell.is_full());
        assert_eq!(cell.id, "900002ABC");
    }

    #[test]
    fn test_filled_rejects_full_slot() {
        let full = filled(slot_cell(None, 1, 1, 1), &form("a")).unwrap();
        let err = filled(full, &form("b")).unwrap_err();
        assert!(matches!(
            err,
            RepoError::Engine(EngineError::InvalidTransition { from: CellStatus::Full, to: CellStatus::Full })
        ));
    }

    #[test]
    fn test_cleared_rules() {
        assert!(matches!(cleared(1, slot_cell(None, 1, 1, 1)), Err(RepoError::NotFound { .. })));

        let mut slot = slot_cell(None, 1, 1, 1);
        slot.reserve("Dr. Martin", None).unwrap();
        assert!(matches!(cleared(1, slot), Err(RepoError::Conflict(_))));
    }

    #[test]
    fn test_closing_changes() {
        let open = vec![
            reservation("RES-001", ReservationStatus::Active),
            reservation("RES-002", ReservationStatus::Pending),
            reservation("RES-003", ReservationStatus::Completed),
        ];
        let on_fill = closing_changes(&open, true);
        assert_eq!(on_fill.len(), 2);
        assert_eq!(on_fill[0].to, ReservationStatus::Completed);
        assert_eq!(on_fill[1].to, ReservationStatus::Cancelled);

        let on_release = closing_changes(&open, false);
        assert!(on_release.iter().all(|c| c.to == ReservationStatus::Cancelled));
    }

    #[test]
    fn test_next_reservation_id() {
        assert_eq!(next_reservation_id(Vec::<&str>::new()), "RES-001");
        assert_eq!(next_reservation_id(vec!["RES-001", "RES-005", "other"]), "RES-006");
        assert_eq!(next_reservation_id(vec!["RES-4294967295"]), "RES-4294967296");
        assert_eq!(next_reservation_id(vec!["RES-18446744073709551615"]), "RES-18446744073709551615");
    }

    #[test]
    fn test_importable_skips_empty_and_rejects_out_of_range() {
        let geometry = BoxGeometry::new(2, 2).unwrap();
        let mut full = Cell::empty("x", 2, 2, 0);
        full.status = CellStatus::Full;
        full.cell_type = Some(CellType::Lb);
        full.cell_count = 10;
        let cells = vec![Cell::empty("e", 1, 1, 1), full.clone()];
        let out = importable(geometry, &cells).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].position, 4);

        full.row = 3;
        assert!(importable(geometry, &[full]).is_err());
    }

    #[test]
    fn test_importable_rejects_incomplete_records() {
        let geometry = BoxGeometry::new(2, 2).unwrap();
        // "row,col,status\n1,1,full\n" reads back as a bare full cell
        let mut bare = Cell::empty("", 1, 1, 0);
        bare.status = CellStatus::Full;
        let mut unclaimed = Cell::empty("900004", 2, 2, 0);
        unclaimed.status = CellStatus::Reserved;

        let err = importable(geometry, &[bare, unclaimed]).unwrap_err();
        let RepoError::Engine(EngineError::Validation(errors)) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        for field in ["identifier", "cell_type", "cell_count", "reserved_by"] {
            assert!(errors.has(field), "missing {field}: {errors}");
        }
        assert!(errors.to_string().contains("(A1)"));
        assert!(errors.to_string().contains("(B2)"));
    }
}
