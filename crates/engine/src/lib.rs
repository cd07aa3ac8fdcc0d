//! `cryobank-engine`: storage-box grid model.
//!
//! Pure engine crate: builds the cell grid of a box, classifies and filters
//! cells, and summarises occupancy. No storage or CLI dependencies.

pub mod cell;
pub mod error;
pub mod events;
pub mod filter;
pub mod geometry;
pub mod grid;
pub mod inventory;
pub mod reservation;
pub mod stats;
pub mod validation;
pub mod view;

pub use cell::{Cell, CellStatus, CellType};
pub use error::EngineError;
pub use filter::{CellCriteria, FilterState, Tab, TypeFilter};
pub use geometry::BoxGeometry;
pub use grid::{build_grid, locate, BoxGrid, OccupancySource, RandomOccupancy, RecordOccupancy};
pub use stats::{summarize, Summary};
pub use view::{CellSelectionHandler, GridView};
