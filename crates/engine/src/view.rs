//! Render-mode agnostic view over a built grid.
//!
//! A `GridView` is what the parent view hands to either renderer: the full
//! collection, the filtered subset, the summary of the full collection and
//! the visibility mask. Switching between grid and table never changes
//! which cells are visible or how they are counted.

use serde::Serialize;

use crate::cell::Cell;
use crate::error::EngineError;
use crate::filter::{FilterState, VisibilityMask};
use crate::geometry::{row_label, BoxGeometry};
use crate::grid::BoxGrid;
use crate::stats::Summary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    Table,
}

/// Receives the cell a user picked, in either render mode. Fire-and-forget.
pub trait CellSelectionHandler {
    fn on_cell_selected(&mut self, cell: &Cell);
}

impl<F: FnMut(&Cell)> CellSelectionHandler for F {
    fn on_cell_selected(&mut self, cell: &Cell) {
        self(cell)
    }
}

pub struct GridView<'a> {
    grid: &'a BoxGrid,
    state: FilterState,
    mask: VisibilityMask,
    summary: Summary,
}

impl<'a> GridView<'a> {
    pub fn new(grid: &'a BoxGrid, state: FilterState) -> Self {
        let mask = VisibilityMask::compute(grid.cells(), &state);
        let summary = grid.summary();
        Self { grid, state, mask, summary }
    }

    pub fn geometry(&self) -> BoxGeometry {
        self.grid.geometry()
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.state
    }

    /// Every cell of the box, row-major.
    pub fn all(&self) -> &'a [Cell] {
        self.grid.cells()
    }

    /// Cells matching the filter, row-major. Table mode renders these.
    pub fn visible(&self) -> Vec<&'a Cell> {
        self.all()
            .iter()
            .filter(|c| self.mask.is_visible(c.position))
            .collect()
    }

    /// Summary of the full collection (the badges do not follow the filter).
    pub fn summary(&self) -> Summary {
        self.summary
    }

    pub fn filtered_count(&self) -> usize {
        self.mask.visible_count()
    }

    /// True when the filter matches nothing; renderers show an empty state.
    pub fn is_empty_result(&self) -> bool {
        self.filtered_count() == 0
    }

    pub fn is_visible(&self, cell: &Cell) -> bool {
        self.mask.is_visible(cell.position)
    }

    /// Grid mode rows: label plus every cell with its visibility flag.
    pub fn grid_rows(&self) -> impl Iterator<Item = (String, Vec<(&'a Cell, bool)>)> + '_ {
        self.grid.rows().enumerate().map(move |(i, row)| {
            let cells = row.iter().map(|c| (c, self.mask.is_visible(c.position))).collect();
            (row_label(i as u32 + 1), cells)
        })
    }

    /// Resolve a click at `(row, col)` and forward the cell to `handler`.
    pub fn select(&self, row: u32, col: u32, handler: &mut dyn CellSelectionHandler) -> Result<(), EngineError> {
        let cell = self.grid.cell_at(row, col)?;
        log::debug!("cell {} selected at ({}, {})", cell.id, row, col);
        handler.on_cell_selected(cell);
        Ok(())
    }

    /// Owned, serializable copy of what the view shows.
    pub fn snapshot(&self, mode: ViewMode) -> GridSnapshot {
        GridSnapshot {
            rows: self.geometry().rows(),
            cols: self.geometry().cols(),
            mode,
            filter: self.state.clone(),
            summary: self.summary,
            filtered_count: self.filtered_count(),
            cells: self.visible().into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub rows: u32,
    pub cols: u32,
    pub mode: ViewMode,
    pub filter: FilterState,
    pub summary: Summary,
    pub filtered_count: usize,
    pub cells: Vec<Cell>,
}
