//! Event types for inventory change notifications.
//!
//! Repositories emit one event per successful mutation. The CLI turns them
//! into the confirmation line it prints; tests use them to check that a
//! rejected mutation emits nothing.

use crate::cell::CellStatus;
use crate::inventory::BoxId;
use crate::reservation::ReservationStatus;

/// Kind of container created on the hierarchy pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Tank,
    Rack,
    Box,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Tank => "tank",
            ContainerKind::Rack => "rack",
            ContainerKind::Box => "box",
        }
    }
}

/// Events emitted by a repository after a mutation is committed.
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    CellCreated(CellChange),
    CellUpdated(CellChange),
    CellDeleted(CellChange),
    CellReserved(CellChange),
    CellReleased(CellChange),
    ContainerCreated { kind: ContainerKind, id: i64, name: String },
    ReservationCreated { id: String, cell_id: String },
    ReservationStatusChanged { id: String, from: ReservationStatus, to: ReservationStatus },
}

/// A single cell mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    pub box_id: BoxId,
    pub position: u32,
    pub cell_id: String,
    /// Status after the mutation.
    pub status: CellStatus,
}

impl InventoryEvent {
    /// One-line confirmation shown to the user.
    pub fn notice(&self) -> String {
        match self {
            InventoryEvent::CellCreated(c) => format!("Cell {} stored at position {}", c.cell_id, c.position),
            InventoryEvent::CellUpdated(c) => format!("Cell {} updated", c.cell_id),
            InventoryEvent::CellDeleted(c) => format!("Cell {} removed from position {}", c.cell_id, c.position),
            InventoryEvent::CellReserved(c) => format!("Cell {} reserved", c.cell_id),
            InventoryEvent::CellReleased(c) => format!("Reservation on cell {} released", c.cell_id),
            InventoryEvent::ContainerCreated { kind, id, name } => {
                format!("Created {} {} (id {})", kind.as_str(), name, id)
            }
            InventoryEvent::ReservationCreated { id, cell_id } => format!("Reservation {} created for {}", id, cell_id),
            InventoryEvent::ReservationStatusChanged { id, from, to } => {
                format!("Reservation {}: {} -> {}", id, from, to)
            }
        }
    }
}

/// Callback type for receiving inventory events.
pub type EventCallback = Box<dyn FnMut(InventoryEvent) + Send>;

/// Simple event collector for testing.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<InventoryEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: InventoryEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[InventoryEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Only the cell mutations, in emission order.
    pub fn cell_changes(&self) -> Vec<&CellChange> {
        self.events
            .iter()
            .filter_map(|e| match e {
                InventoryEvent::CellCreated(c)
                | InventoryEvent::CellUpdated(c)
                | InventoryEvent::CellDeleted(c)
                | InventoryEvent::CellReserved(c)
                | InventoryEvent::CellReleased(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}
