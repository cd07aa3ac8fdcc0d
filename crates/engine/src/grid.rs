//! Grid Model Builder.
//!
//! Produces the row-major cell collection of one box. What occupies each
//! slot comes from an [`OccupancySource`]; the builder owns the addressing
//! (row, col, position) and the per-status field rules, so every source
//! yields cells that satisfy the same invariants.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellStatus, CellType};
use crate::error::EngineError;
use crate::geometry::BoxGeometry;
use crate::stats::{summarize, Summary};

/// Upper bound (inclusive) of the draw band that maps to `Empty`.
pub const EMPTY_BAND_END: f64 = 0.21;
/// Upper bound (inclusive) of the draw band that maps to `Full`.
pub const FULL_BAND_END: f64 = 0.95;

/// Coordinates of the slot being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub row: u32,
    pub col: u32,
    pub position: u32,
}

/// Decides what occupies each slot while a grid is built.
///
/// Called once per slot, in row-major order. The builder overwrites the
/// returned cell's coordinates with the slot's and normalizes its fields.
pub trait OccupancySource {
    fn cell_for(&mut self, slot: Slot) -> Cell;
}

/// Identifier prefix derived from a position: `900` + 3-digit position.
pub fn slot_id(position: u32) -> String {
    format!("900{:03}", position)
}

/// Map a draw in `[0, 1)` onto the three contiguous status bands
/// (21% empty, 74% full, 5% reserved).
pub fn status_for_draw(r: f64) -> CellStatus {
    if r <= EMPTY_BAND_END {
        CellStatus::Empty
    } else if r <= FULL_BAND_END {
        CellStatus::Full
    } else {
        CellStatus::Reserved
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Placeholder occupancy drawn from a random source.
///
/// Seeded sources are reproducible: the same seed and geometry always
/// produce the same grid.
pub struct RandomOccupancy<R: Rng = StdRng> {
    rng: R,
}

impl RandomOccupancy<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }
}

impl<R: Rng> OccupancySource for RandomOccupancy<R> {
    fn cell_for(&mut self, slot: Slot) -> Cell {
        let status = status_for_draw(self.rng.gen::<f64>());
        let suffix: u32 = self.rng.gen_range(0..999_999);
        let id = format!("{}{:06}", slot_id(slot.position), suffix);
        let mut cell = Cell::empty(id, slot.row, slot.col, slot.position);
        cell.status = status;

        if status != CellStatus::Empty {
            let types = CellType::ALL;
            cell.cell_type = Some(types[self.rng.gen_range(0..types.len())]);
            cell.name = Some(format!("Cell-{}", slot.position));
            cell.freeze_date = NaiveDate::from_ymd_opt(2024, 4, 16);
        }
        if status == CellStatus::Full {
            cell.cell_count = self.rng.gen_range(50..150);
            cell.sample_count = self.rng.gen_range(1..16);
        }
        if status == CellStatus::Reserved {
            cell.reserved_by = Some("Dr. Martin".to_string());
        }
        cell
    }
}

/// Occupancy read from stored cell records, keyed by position.
///
/// Slots without a record are empty. This is the deterministic source
/// used for persisted boxes.
#[derive(Debug, Default)]
pub struct RecordOccupancy {
    by_position: FxHashMap<u32, Cell>,
}

impl RecordOccupancy {
    pub fn new(records: impl IntoIterator<Item = Cell>) -> Self {
        let mut by_position = FxHashMap::default();
        for record in records {
            let position = record.position;
            if by_position.contains_key(&position) {
                log::warn!("duplicate cell record at position {}; keeping the first", position);
                continue;
            }
            by_position.insert(position, record);
        }
        Self { by_position }
    }

    pub fn len(&self) -> usize {
        self.by_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }
}

impl OccupancySource for RecordOccupancy {
    fn cell_for(&mut self, slot: Slot) -> Cell {
        self.by_position
            .remove(&slot.position)
            .unwrap_or_else(|| Cell::empty(slot_id(slot.position), slot.row, slot.col, slot.position))
    }
}

// =============================================================================
// BoxGrid
// =============================================================================

/// The derived cell collection of one box, in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxGrid {
    geometry: BoxGeometry,
    cells: Vec<Cell>,
}

/// Build a grid for `rows x cols`. Rejects non-positive geometry.
pub fn build_grid(rows: u32, cols: u32, source: &mut dyn OccupancySource) -> Result<BoxGrid, EngineError> {
    let geometry = BoxGeometry::new(rows, cols)?;
    Ok(BoxGrid::build(geometry, source))
}

impl BoxGrid {
    pub fn build(geometry: BoxGeometry, source: &mut dyn OccupancySource) -> Self {
        let mut cells = Vec::with_capacity(geometry.len());
        let mut position = 0;
        for row in 1..=geometry.rows() {
            for col in 1..=geometry.cols() {
                position += 1;
                let slot = Slot { row, col, position };
                let mut cell = source.cell_for(slot);
                cell.row = row;
                cell.col = col;
                cell.position = position;
                cell.normalize();
                cells.push(cell);
            }
        }
        log::debug!("built {}x{} grid ({} cells)", geometry.rows(), geometry.cols(), cells.len());
        Self { geometry, cells }
    }

    pub fn geometry(&self) -> BoxGeometry {
        self.geometry
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.cells)
    }

    /// Grid rows as slices, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.geometry.cols() as usize)
    }

    /// Resolve a coordinate. `None` when outside the box.
    pub fn locate(&self, row: u32, col: u32) -> Option<&Cell> {
        let position = self.geometry.position_of(row, col)?;
        match self.cells.get(position as usize - 1) {
            Some(cell) if cell.row == row && cell.col == col => Some(cell),
            _ => locate(&self.cells, row, col),
        }
    }

    /// Resolve an in-range coordinate. A miss inside the box is a defect and
    /// reported as `CoordinateMiss`.
    pub fn cell_at(&self, row: u32, col: u32) -> Result<&Cell, EngineError> {
        self.geometry.check(row, col)?;
        self.locate(row, col).ok_or_else(|| {
            log::error!("grid invariant violated: no cell at ({}, {})", row, col);
            EngineError::CoordinateMiss { row, col }
        })
    }

    pub fn cell_at_position(&self, position: u32) -> Option<&Cell> {
        let (row, col) = self.geometry.coords_of(position)?;
        self.locate(row, col)
    }
}

/// Find the cell at `(row, col)` in any collection.
pub fn locate(cells: &[Cell], row: u32, col: u32) -> Option<&Cell> {
    cells.iter().find(|c| c.row == row && c.col == col)
}
