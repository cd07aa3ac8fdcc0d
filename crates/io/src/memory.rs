// In-memory repository, used by tests and ad-hoc sessions

use std::collections::BTreeMap;

use cryobank_engine::cell::Cell;
use cryobank_engine::events::{ContainerKind, EventCallback, InventoryEvent};
use cryobank_engine::inventory::{BoxId, Inventory, Rack, RackId, StorageBox, Tank, TankId};
use cryobank_engine::reservation::{Reservation, ReservationStatus};
use cryobank_engine::validation::{BoxForm, CellForm, RackForm, ReservationForm, TankForm};

use crate::repository::{
    cell_change, cleared, closing_changes, filled, importable, new_reservation, next_reservation_id, released,
    reserved, slot_cell, updated, BatchWork, InventoryRepository, RepoError, StatusChange,
};

#[derive(Clone)]
struct StoredReservation {
    reservation: Reservation,
    /// Slot the reservation holds; None for imported records.
    slot: Option<(BoxId, u32)>,
}

#[derive(Default)]
pub struct MemoryRepository {
    tanks: BTreeMap<TankId, Tank>,
    racks: BTreeMap<RackId, Rack>,
    boxes: BTreeMap<BoxId, StorageBox>,
    cells: BTreeMap<(BoxId, u32), Cell>,
    reservations: BTreeMap<String, StoredReservation>,
    last_id: i64,
    on_event: Option<EventCallback>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn emit(&mut self, event: InventoryEvent) {
        if let Some(callback) = self.on_event.as_mut() {
            callback(event);
        }
    }

    fn storage_box(&self, id: BoxId) -> Result<&StorageBox, RepoError> {
        self.boxes.get(&id).ok_or_else(|| RepoError::not_found("box", id))
    }

    /// Position of `(row, col)` in a box plus the cell currently there.
    fn slot(&self, box_id: BoxId, row: u32, col: u32) -> Result<(u32, Cell), RepoError> {
        let position = self.storage_box(box_id)?.geometry.check(row, col)?;
        let record = self.cells.get(&(box_id, position)).cloned();
        Ok((position, slot_cell(record, row, col, position)))
    }

    fn open_reservations(&self, box_id: BoxId, position: u32) -> Vec<Reservation> {
        self.reservations
            .values()
            .filter(|s| s.slot == Some((box_id, position)) && !s.reservation.status.is_terminal())
            .map(|s| s.reservation.clone())
            .collect()
    }

    fn apply_status_changes(&mut self, changes: Vec<StatusChange>) {
        for change in changes {
            if let Some(stored) = self.reservations.get_mut(&change.id) {
                stored.reservation.status = change.to;
            }
            self.emit(InventoryEvent::ReservationStatusChanged { id: change.id, from: change.from, to: change.to });
        }
    }
}

impl InventoryRepository for MemoryRepository {
    fn list_tanks(&self) -> Result<Vec<Tank>, RepoError> {
        Ok(self.tanks.values().cloned().collect())
    }

    fn create_tank(&mut self, form: &TankForm) -> Result<Tank, RepoError> {
        form.validate()?;
        let tank = Tank {
            id: self.next_id(),
            name: form.name.trim().to_string(),
            location: form.location.trim().to_string(),
            capacity: form.capacity,
            description: form.description.clone(),
        };
        self.tanks.insert(tank.id, tank.clone());
        self.emit(InventoryEvent::ContainerCreated { kind: ContainerKind::Tank, id: tank.id, name: tank.name.clone() });
        Ok(tank)
    }

    fn list_racks(&self) -> Result<Vec<Rack>, RepoError> {
        Ok(self.racks.values().cloned().collect())
    }

    fn create_rack(&mut self, form: &RackForm) -> Result<Rack, RepoError> {
        form.validate()?;
        let tank_id = form.tank_id.unwrap_or_default();
        if !self.tanks.contains_key(&tank_id) {
            return Err(RepoError::not_found("tank", tank_id));
        }
        let rack = Rack {
            id: self.next_id(),
            name: form.name.trim().to_string(),
            tank_id,
            capacity: form.capacity,
            description: form.description.clone(),
        };
        self.racks.insert(rack.id, rack.clone());
        self.emit(InventoryEvent::ContainerCreated { kind: ContainerKind::Rack, id: rack.id, name: rack.name.clone() });
        Ok(rack)
    }

    fn list_boxes(&self) -> Result<Vec<StorageBox>, RepoError> {
        Ok(self.boxes.values().cloned().collect())
    }

    fn get_box(&self, id: BoxId) -> Result<StorageBox, RepoError> {
        self.storage_box(id).cloned()
    }

    fn create_box(&mut self, form: &BoxForm) -> Result<StorageBox, RepoError> {
        form.validate()?;
        let rack_id = form.rack_id.unwrap_or_default();
        if !self.racks.contains_key(&rack_id) {
            return Err(RepoError::not_found("rack", rack_id));
        }
        let storage_box = StorageBox {
            id: self.next_id(),
            name: form.name.trim().to_string(),
            rack_id,
            geometry: form.geometry(),
            description: form.description.clone(),
        };
        self.boxes.insert(storage_box.id, storage_box.clone());
        self.emit(InventoryEvent::ContainerCreated {
            kind: ContainerKind::Box,
            id: storage_box.id,
            name: storage_box.name.clone(),
        });
        Ok(storage_box)
    }

    fn list_cells(&self, box_id: BoxId) -> Result<Vec<Cell>, RepoError> {
        self.storage_box(box_id)?;
        Ok(self.cells.range((box_id, 0)..=(box_id, u32::MAX)).map(|(_, c)| c.clone()).collect())
    }

    fn get_cell(&self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError> {
        self.slot(box_id, row, col).map(|(_, cell)| cell)
    }

    fn create_cell(&mut self, box_id: BoxId, row: u32, col: u32, form: &CellForm) -> Result<Cell, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let cell = filled(slot, form)?;
        let changes = closing_changes(&self.open_reservations(box_id, position), true);

        self.cells.insert((box_id, position), cell.clone());
        self.emit(InventoryEvent::CellCreated(cell_change(box_id, &cell)));
        self.apply_status_changes(changes);
        Ok(cell)
    }

    fn update_cell(&mut self, box_id: BoxId, row: u32, col: u32, form: &CellForm) -> Result<Cell, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let cell = updated(slot, form)?;
        self.cells.insert((box_id, position), cell.clone());
        self.emit(InventoryEvent::CellUpdated(cell_change(box_id, &cell)));
        Ok(cell)
    }

    fn delete_cell(&mut self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let before = slot.clone();
        let after = cleared(box_id, slot)?;
        self.cells.remove(&(box_id, position));
        self.emit(InventoryEvent::CellDeleted(cell_change(box_id, &after)));
        Ok(before)
    }

    fn reserve_cell(
        &mut self,
        box_id: BoxId,
        row: u32,
        col: u32,
        form: &ReservationForm,
    ) -> Result<Reservation, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let cell = reserved(slot, form)?;

        let id = next_reservation_id(self.reservations.keys().map(String::as_str));
        let location = self.load_inventory()?.location_of(box_id).unwrap_or_default();
        let reservation = new_reservation(id, &cell, location, form);

        self.cells.insert((box_id, position), cell.clone());
        self.reservations.insert(
            reservation.id.clone(),
            StoredReservation { reservation: reservation.clone(), slot: Some((box_id, position)) },
        );
        self.emit(InventoryEvent::CellReserved(cell_change(box_id, &cell)));
        self.emit(InventoryEvent::ReservationCreated { id: reservation.id.clone(), cell_id: cell.id });
        Ok(reservation)
    }

    fn release_cell(&mut self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let cell = released(slot)?;
        let changes = closing_changes(&self.open_reservations(box_id, position), false);

        self.cells.remove(&(box_id, position));
        self.emit(InventoryEvent::CellReleased(cell_change(box_id, &cell)));
        self.apply_status_changes(changes);
        Ok(cell)
    }

    fn import_cells(&mut self, box_id: BoxId, cells: &[Cell]) -> Result<usize, RepoError> {
        let geometry = self.storage_box(box_id)?.geometry;
        let cells = importable(geometry, cells)?;
        if let Some(taken) = cells.iter().find(|c| self.cells.contains_key(&(box_id, c.position))) {
            return Err(RepoError::Conflict(format!("box {} already has a cell at position {}", box_id, taken.position)));
        }
        let count = cells.len();
        for cell in cells {
            self.cells.insert((box_id, cell.position), cell);
        }
        log::debug!("imported {} cells into box {}", count, box_id);
        Ok(count)
    }

    fn list_reservations(&self) -> Result<Vec<Reservation>, RepoError> {
        Ok(self.reservations.values().map(|s| s.reservation.clone()).collect())
    }

    fn import_reservation(&mut self, reservation: Reservation) -> Result<(), RepoError> {
        if self.reservations.contains_key(&reservation.id) {
            return Err(RepoError::Conflict(format!("reservation {} already exists", reservation.id)));
        }
        self.reservations.insert(reservation.id.clone(), StoredReservation { reservation, slot: None });
        Ok(())
    }

    fn set_reservation_status(&mut self, id: &str, status: ReservationStatus) -> Result<Reservation, RepoError> {
        let stored = self.reservations.get(id).ok_or_else(|| RepoError::not_found("reservation", id))?;
        let mut reservation = stored.reservation.clone();
        let slot = stored.slot;
        let from = reservation.status;
        reservation.set_status(status)?;

        // A closed reservation frees the slot it still holds.
        let mut freed = None;
        if status.is_terminal() {
            if let Some((box_id, position)) = slot {
                if let Some(cell) = self.cells.get(&(box_id, position)).filter(|c| c.is_reserved()) {
                    freed = Some((box_id, position, released(cell.clone())?));
                }
            }
        }

        if let Some(stored) = self.reservations.get_mut(id) {
            stored.reservation = reservation.clone();
        }
        self.emit(InventoryEvent::ReservationStatusChanged { id: id.to_string(), from, to: status });
        if let Some((box_id, position, cell)) = freed {
            self.cells.remove(&(box_id, position));
            self.emit(InventoryEvent::CellReleased(cell_change(box_id, &cell)));
        }
        Ok(reservation)
    }

    fn set_event_callback(&mut self, callback: Option<EventCallback>) {
        self.on_event = callback;
    }

    fn atomically(&mut self, work: &mut BatchWork<'_>) -> Result<(), RepoError> {
        let snapshot = (
            self.tanks.clone(),
            self.racks.clone(),
            self.boxes.clone(),
            self.cells.clone(),
            self.reservations.clone(),
            self.last_id,
        );
        let result = work(self);
        if result.is_err() {
            (self.tanks, self.racks, self.boxes, self.cells, self.reservations, self.last_id) = snapshot;
        }
        result
    }

    fn load_inventory(&self) -> Result<Inventory, RepoError> {
        Ok(Inventory::new(
            self.tanks.values().cloned().collect(),
            self.racks.values().cloned().collect(),
            self.boxes.values().cloned().collect(),
        ))
    }
}
