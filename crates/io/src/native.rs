// SQLite inventory store
//
// One database file holds the whole inventory. Cells carry a synthetic
// integer key: the user-facing cell id is free text and may repeat, while
// (box_id, position) is the real uniqueness constraint.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use cryobank_engine::cell::{Cell, CellType};
use cryobank_engine::events::{ContainerKind, EventCallback, InventoryEvent};
use cryobank_engine::geometry::BoxGeometry;
use cryobank_engine::inventory::{BoxId, Rack, StorageBox, Tank};
use cryobank_engine::reservation::{Reservation, ReservationStatus};
use cryobank_engine::validation::{BoxForm, CellForm, RackForm, ReservationForm, TankForm};

use crate::repository::{
    cell_change, cleared, closing_changes, filled, importable, new_reservation, next_reservation_id, released,
    reserved, slot_cell, updated, BatchWork, InventoryRepository, RepoError, StatusChange,
};
use crate::STORE_FORMAT_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tanks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    capacity INTEGER,              -- racks
    description TEXT
);

CREATE TABLE IF NOT EXISTS racks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    tank_id INTEGER NOT NULL REFERENCES tanks(id),
    capacity INTEGER,              -- boxes
    description TEXT
);

CREATE TABLE IF NOT EXISTS boxes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    rack_id INTEGER NOT NULL REFERENCES racks(id),
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS cells (
    key INTEGER PRIMARY KEY AUTOINCREMENT,
    box_id INTEGER NOT NULL REFERENCES boxes(id),
    row INTEGER NOT NULL,
    col INTEGER NOT NULL,
    position INTEGER NOT NULL,
    cell_id TEXT NOT NULL,
    name TEXT,
    status TEXT NOT NULL,          -- full | reserved (empty slots are not stored)
    cell_type TEXT,                -- LB | PBMC
    cell_count INTEGER NOT NULL DEFAULT 0,
    sample_count INTEGER NOT NULL DEFAULT 0,
    keywords TEXT NOT NULL DEFAULT '',
    freeze_date TEXT,
    expiry_date TEXT,
    owner TEXT,
    reserved_by TEXT,
    reserved_for TEXT,
    comment TEXT,
    UNIQUE (box_id, position)
);

CREATE TABLE IF NOT EXISTS reservations (
    id TEXT PRIMARY KEY,
    cell_id TEXT NOT NULL,
    box_id INTEGER,                -- NULL for imported records
    position INTEGER,
    location TEXT NOT NULL DEFAULT '',
    reserved_by TEXT NOT NULL,
    reserved_for TEXT NOT NULL DEFAULT '',
    start_date TEXT NOT NULL,
    end_date TEXT,
    status TEXT NOT NULL,
    comment TEXT NOT NULL DEFAULT ''
);
"#;

const CELL_COLUMNS: &str = "row, col, position, cell_id, name, status, cell_type, cell_count, sample_count, \
     keywords, freeze_date, expiry_date, owner, reserved_by, reserved_for, comment";

const RESERVATION_COLUMNS: &str =
    "id, cell_id, location, reserved_by, reserved_for, start_date, end_date, status, comment";

impl From<rusqlite::Error> for RepoError {
    fn from(e: rusqlite::Error) -> Self {
        RepoError::Storage(e.to_string())
    }
}

fn conversion<E: std::error::Error + Send + Sync + 'static>(idx: usize, e: E) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn cell_from_row(row: &Row) -> rusqlite::Result<Cell> {
    let status: String = row.get(5)?;
    let cell_type: Option<String> = row.get(6)?;
    Ok(Cell {
        row: row.get(0)?,
        col: row.get(1)?,
        position: row.get(2)?,
        id: row.get(3)?,
        name: row.get(4)?,
        status: status.parse().map_err(|e| conversion(5, e))?,
        cell_type: cell_type
            .map(|t| t.parse::<CellType>())
            .transpose()
            .map_err(|e| conversion(6, e))?,
        cell_count: row.get(7)?,
        sample_count: row.get(8)?,
        keywords: row.get(9)?,
        freeze_date: row.get(10)?,
        expiry_date: row.get(11)?,
        owner: row.get(12)?,
        reserved_by: row.get(13)?,
        reserved_for: row.get(14)?,
        comment: row.get(15)?,
    })
}

fn reservation_from_row(row: &Row) -> rusqlite::Result<Reservation> {
    let status: String = row.get(7)?;
    Ok(Reservation {
        id: row.get(0)?,
        cell_id: row.get(1)?,
        location: row.get(2)?,
        reserved_by: row.get(3)?,
        reserved_for: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        status: status.parse().map_err(|e| conversion(7, e))?,
        comment: row.get(8)?,
    })
}

fn box_from_row(row: &Row) -> rusqlite::Result<StorageBox> {
    let rows: u32 = row.get(3)?;
    let cols: u32 = row.get(4)?;
    Ok(StorageBox {
        id: row.get(0)?,
        name: row.get(1)?,
        rack_id: row.get(2)?,
        geometry: BoxGeometry::new(rows, cols).map_err(|e| conversion(3, e))?,
        description: row.get(5)?,
    })
}

/// Insert or overwrite the record at the cell's slot.
fn put_cell(conn: &Connection, box_id: BoxId, cell: &Cell) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO cells (box_id, row, col, position, cell_id, name, status, cell_type, cell_count, sample_count, \
         keywords, freeze_date, expiry_date, owner, reserved_by, reserved_for, comment) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17) \
         ON CONFLICT (box_id, position) DO UPDATE SET \
         row = excluded.row, col = excluded.col, cell_id = excluded.cell_id, name = excluded.name, \
         status = excluded.status, cell_type = excluded.cell_type, cell_count = excluded.cell_count, \
         sample_count = excluded.sample_count, keywords = excluded.keywords, freeze_date = excluded.freeze_date, \
         expiry_date = excluded.expiry_date, owner = excluded.owner, reserved_by = excluded.reserved_by, \
         reserved_for = excluded.reserved_for, comment = excluded.comment",
        params![
            box_id,
            cell.row,
            cell.col,
            cell.position,
            cell.id,
            cell.name,
            cell.status.as_str(),
            cell.cell_type.map(|t| t.as_str()),
            cell.cell_count,
            cell.sample_count,
            cell.keywords,
            cell.freeze_date,
            cell.expiry_date,
            cell.owner,
            cell.reserved_by,
            cell.reserved_for,
            cell.comment,
        ],
    )?;
    Ok(())
}

fn remove_cell(conn: &Connection, box_id: BoxId, position: u32) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM cells WHERE box_id = ?1 AND position = ?2", params![box_id, position])?;
    Ok(())
}

fn put_reservation(conn: &Connection, r: &Reservation, slot: Option<(BoxId, u32)>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO reservations (id, cell_id, box_id, position, location, reserved_by, reserved_for, \
         start_date, end_date, status, comment) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            r.id,
            r.cell_id,
            slot.map(|(b, _)| b),
            slot.map(|(_, p)| p),
            r.location,
            r.reserved_by,
            r.reserved_for,
            r.start_date,
            r.end_date,
            r.status.as_str(),
            r.comment,
        ],
    )?;
    Ok(())
}

fn apply_status_changes(conn: &Connection, changes: &[StatusChange]) -> rusqlite::Result<()> {
    for change in changes {
        conn.execute(
            "UPDATE reservations SET status = ?1 WHERE id = ?2",
            params![change.to.as_str(), change.id],
        )?;
    }
    Ok(())
}

/// Inventory stored in a SQLite database.
pub struct SqliteRepository {
    conn: Connection,
    on_event: Option<EventCallback>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RepoError::Storage(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        log::debug!("opened inventory database {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepoError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RepoError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('format_version', ?1)",
            params![STORE_FORMAT_VERSION.to_string()],
        )?;
        let version: u32 = conn
            .query_row("SELECT value FROM meta WHERE key = 'format_version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })?;
        if version > STORE_FORMAT_VERSION {
            return Err(RepoError::Storage(format!(
                "database format version {} is newer than supported version {}",
                version, STORE_FORMAT_VERSION
            )));
        }
        Ok(Self { conn, on_event: None })
    }

    fn emit(&mut self, event: InventoryEvent) {
        if let Some(callback) = self.on_event.as_mut() {
            callback(event);
        }
    }

    fn emit_status_changes(&mut self, changes: Vec<StatusChange>) {
        for change in changes {
            self.emit(InventoryEvent::ReservationStatusChanged { id: change.id, from: change.from, to: change.to });
        }
    }

    fn exists(&self, table: &str, id: i64) -> Result<bool, RepoError> {
        let found = self
            .conn
            .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?1"), params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn stored_cell(&self, box_id: BoxId, position: u32) -> Result<Option<Cell>, RepoError> {
        let cell = self
            .conn
            .query_row(
                &format!("SELECT {CELL_COLUMNS} FROM cells WHERE box_id = ?1 AND position = ?2"),
                params![box_id, position],
                cell_from_row,
            )
            .optional()?;
        Ok(cell)
    }

    fn slot(&self, box_id: BoxId, row: u32, col: u32) -> Result<(u32, Cell), RepoError> {
        let position = self.get_box(box_id)?.geometry.check(row, col)?;
        let record = self.stored_cell(box_id, position)?;
        Ok((position, slot_cell(record, row, col, position)))
    }

    fn open_reservations(&self, box_id: BoxId, position: u32) -> Result<Vec<Reservation>, RepoError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE box_id = ?1 AND position = ?2 AND status IN ('pending', 'active') ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![box_id, position], reservation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl InventoryRepository for SqliteRepository {
    fn list_tanks(&self) -> Result<Vec<Tank>, RepoError> {
        let mut stmt = self.conn.prepare("SELECT id, name, location, capacity, description FROM tanks ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Tank {
                id: row.get(0)?,
                name: row.get(1)?,
                location: row.get(2)?,
                capacity: row.get(3)?,
                description: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_tank(&mut self, form: &TankForm) -> Result<Tank, RepoError> {
        form.validate()?;
        let name = form.name.trim().to_string();
        let location = form.location.trim().to_string();
        self.conn.execute(
            "INSERT INTO tanks (name, location, capacity, description) VALUES (?1, ?2, ?3, ?4)",
            params![name, location, form.capacity, form.description],
        )?;
        let tank = Tank {
            id: self.conn.last_insert_rowid(),
            name,
            location,
            capacity: form.capacity,
            description: form.description.clone(),
        };
        self.emit(InventoryEvent::ContainerCreated { kind: ContainerKind::Tank, id: tank.id, name: tank.name.clone() });
        Ok(tank)
    }

    fn list_racks(&self) -> Result<Vec<Rack>, RepoError> {
        let mut stmt = self.conn.prepare("SELECT id, name, tank_id, capacity, description FROM racks ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Rack {
                id: row.get(0)?,
                name: row.get(1)?,
                tank_id: row.get(2)?,
                capacity: row.get(3)?,
                description: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_rack(&mut self, form: &RackForm) -> Result<Rack, RepoError> {
        form.validate()?;
        let tank_id = form.tank_id.unwrap_or_default();
        if !self.exists("tanks", tank_id)? {
            return Err(RepoError::not_found("tank", tank_id));
        }
        let name = form.name.trim().to_string();
        self.conn.execute(
            "INSERT INTO racks (name, tank_id, capacity, description) VALUES (?1, ?2, ?3, ?4)",
            params![name, tank_id, form.capacity, form.description],
        )?;
        let rack = Rack {
            id: self.conn.last_insert_rowid(),
            name,
            tank_id,
            capacity: form.capacity,
            description: form.description.clone(),
        };
        self.emit(InventoryEvent::ContainerCreated { kind: ContainerKind::Rack, id: rack.id, name: rack.name.clone() });
        Ok(rack)
    }

    fn list_boxes(&self) -> Result<Vec<StorageBox>, RepoError> {
        let mut stmt = self.conn.prepare("SELECT id, name, rack_id, rows, cols, description FROM boxes ORDER BY id")?;
        let rows = stmt.query_map([], box_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_box(&self, id: BoxId) -> Result<StorageBox, RepoError> {
        self.conn
            .query_row(
                "SELECT id, name, rack_id, rows, cols, description FROM boxes WHERE id = ?1",
                params![id],
                box_from_row,
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("box", id))
    }

    fn create_box(&mut self, form: &BoxForm) -> Result<StorageBox, RepoError> {
        form.validate()?;
        let rack_id = form.rack_id.unwrap_or_default();
        if !self.exists("racks", rack_id)? {
            return Err(RepoError::not_found("rack", rack_id));
        }
        let name = form.name.trim().to_string();
        let geometry = form.geometry();
        self.conn.execute(
            "INSERT INTO boxes (name, rack_id, rows, cols, description) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, rack_id, geometry.rows(), geometry.cols(), form.description],
        )?;
        let storage_box = StorageBox {
            id: self.conn.last_insert_rowid(),
            name,
            rack_id,
            geometry,
            description: form.description.clone(),
        };
        self.emit(InventoryEvent::ContainerCreated {
            kind: ContainerKind::Box,
            id: storage_box.id,
            name: storage_box.name.clone(),
        });
        Ok(storage_box)
    }

    fn list_cells(&self, box_id: BoxId) -> Result<Vec<Cell>, RepoError> {
        self.get_box(box_id)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CELL_COLUMNS} FROM cells WHERE box_id = ?1 ORDER BY position"))?;
        let rows = stmt.query_map(params![box_id], cell_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_cell(&self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError> {
        self.slot(box_id, row, col).map(|(_, cell)| cell)
    }

    fn create_cell(&mut self, box_id: BoxId, row: u32, col: u32, form: &CellForm) -> Result<Cell, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let cell = filled(slot, form)?;
        let changes = closing_changes(&self.open_reservations(box_id, position)?, true);

        let tx = self.conn.savepoint()?;
        put_cell(&tx, box_id, &cell)?;
        apply_status_changes(&tx, &changes)?;
        tx.commit()?;

        self.emit(InventoryEvent::CellCreated(cell_change(box_id, &cell)));
        self.emit_status_changes(changes);
        Ok(cell)
    }

    fn update_cell(&mut self, box_id: BoxId, row: u32, col: u32, form: &CellForm) -> Result<Cell, RepoError> {
        let (_, slot) = self.slot(box_id, row, col)?;
        let cell = updated(slot, form)?;
        put_cell(&self.conn, box_id, &cell)?;
        self.emit(InventoryEvent::CellUpdated(cell_change(box_id, &cell)));
        Ok(cell)
    }

    fn delete_cell(&mut self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let before = slot.clone();
        let after = cleared(box_id, slot)?;
        remove_cell(&self.conn, box_id, position)?;
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

        let ids: Vec<String> = {
            let mut stmt = self.conn.prepare("SELECT id FROM reservations")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        let id = next_reservation_id(ids.iter().map(String::as_str));
        let location = self.load_inventory()?.location_of(box_id).unwrap_or_default();
        let reservation = new_reservation(id, &cell, location, form);

        let tx = self.conn.savepoint()?;
        put_cell(&tx, box_id, &cell)?;
        put_reservation(&tx, &reservation, Some((box_id, position)))?;
        tx.commit()?;

        self.emit(InventoryEvent::CellReserved(cell_change(box_id, &cell)));
        self.emit(InventoryEvent::ReservationCreated { id: reservation.id.clone(), cell_id: cell.id });
        Ok(reservation)
    }

    fn release_cell(&mut self, box_id: BoxId, row: u32, col: u32) -> Result<Cell, RepoError> {
        let (position, slot) = self.slot(box_id, row, col)?;
        let cell = released(slot)?;
        let changes = closing_changes(&self.open_reservations(box_id, position)?, false);

        let tx = self.conn.savepoint()?;
        remove_cell(&tx, box_id, position)?;
        apply_status_changes(&tx, &changes)?;
        tx.commit()?;

        self.emit(InventoryEvent::CellReleased(cell_change(box_id, &cell)));
        self.emit_status_changes(changes);
        Ok(cell)
    }

    fn import_cells(&mut self, box_id: BoxId, cells: &[Cell]) -> Result<usize, RepoError> {
        let geometry = self.get_box(box_id)?.geometry;
        let cells = importable(geometry, cells)?;

        let tx = self.conn.savepoint()?;
        for cell in &cells {
            let taken = tx
                .query_row(
                    "SELECT 1 FROM cells WHERE box_id = ?1 AND position = ?2",
                    params![box_id, cell.position],
                    |_| Ok(()),
                )
                .optional()?;
            if taken.is_some() {
                return Err(RepoError::Conflict(format!(
                    "box {} already has a cell at position {}",
                    box_id, cell.position
                )));
            }
            put_cell(&tx, box_id, cell)?;
        }
        tx.commit()?;
        log::debug!("imported {} cells into box {}", cells.len(), box_id);
        Ok(cells.len())
    }

    fn list_reservations(&self) -> Result<Vec<Reservation>, RepoError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RESERVATION_COLUMNS} FROM reservations ORDER BY id"))?;
        let rows = stmt.query_map([], reservation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn import_reservation(&mut self, reservation: Reservation) -> Result<(), RepoError> {
        let taken = self
            .conn
            .query_row("SELECT 1 FROM reservations WHERE id = ?1", params![reservation.id], |_| Ok(()))
            .optional()?;
        if taken.is_some() {
            return Err(RepoError::Conflict(format!("reservation {} already exists", reservation.id)));
        }
        put_reservation(&self.conn, &reservation, None)?;
        Ok(())
    }

    fn set_reservation_status(&mut self, id: &str, status: ReservationStatus) -> Result<Reservation, RepoError> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {RESERVATION_COLUMNS}, box_id, position FROM reservations WHERE id = ?1"),
                params![id],
                |row| {
                    let slot: (Option<BoxId>, Option<u32>) = (row.get(9)?, row.get(10)?);
                    Ok((reservation_from_row(row)?, slot))
                },
            )
            .optional()?;
        let (mut reservation, slot) = found.ok_or_else(|| RepoError::not_found("reservation", id))?;
        let from = reservation.status;
        reservation.set_status(status)?;

        // A closed reservation frees the slot it still holds.
        let mut freed = None;
        if let (true, (Some(box_id), Some(position))) = (status.is_terminal(), slot) {
            if let Some(cell) = self.stored_cell(box_id, position)?.filter(|c| c.is_reserved()) {
                freed = Some((box_id, position, released(cell)?));
            }
        }

        let tx = self.conn.savepoint()?;
        tx.execute("UPDATE reservations SET status = ?1 WHERE id = ?2", params![status.as_str(), id])?;
        if let Some((box_id, position, _)) = &freed {
            remove_cell(&tx, *box_id, *position)?;
        }
        tx.commit()?;

        self.emit(InventoryEvent::ReservationStatusChanged { id: id.to_string(), from, to: status });
        if let Some((box_id, _, cell)) = freed {
            self.emit(InventoryEvent::CellReleased(cell_change(box_id, &cell)));
        }
        Ok(reservation)
    }

    fn set_event_callback(&mut self, callback: Option<EventCallback>) {
        self.on_event = callback;
    }

    // Single-call writes use nested savepoints, so they run inside a batch too.
    fn atomically(&mut self, work: &mut BatchWork<'_>) -> Result<(), RepoError> {
        self.conn.execute_batch("SAVEPOINT batch")?;
        match work(self) {
            Ok(()) => {
                self.conn.execute_batch("RELEASE batch")?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK TO batch; RELEASE batch") {
                    log::error!("rolling back batch failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}
