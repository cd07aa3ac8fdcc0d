// Demo inventory: the tanks, racks, boxes and reservations of a sample lab

use chrono::NaiveDate;

use cryobank_engine::grid::{BoxGrid, RandomOccupancy};
use cryobank_engine::reservation::{Reservation, ReservationStatus};
use cryobank_engine::validation::{BoxForm, RackForm, TankForm};

use crate::repository::{InventoryRepository, RepoError};

/// (name, location, rack capacity)
const TANKS: [(&str, &str, u32); 6] = [
    ("Tank 1", "Zone A", 12),
    ("Tank 2", "Zone A", 10),
    ("Tank 3", "Zone B", 8),
    ("Tank 4", "Zone B", 15),
    ("Tank 5", "Zone C", 3),
    ("Tank 6", "Zone C", 0),
];

/// (name, tank, box capacity)
const RACKS: [(&str, &str, u32); 8] = [
    ("Rack 1", "Tank 1", 27),
    ("Rack 2", "Tank 3", 10),
    ("Rack 3", "Tank 1", 15),
    ("Rack 4", "Tank 2", 20),
    ("Rack 5", "Tank 2", 12),
    ("Rack 6", "Tank 4", 0),
    ("Rack 7", "Tank 3", 18),
    ("Rack 8", "Tank 4", 30),
];

/// (name, rack)
const BOXES: [(&str, &str); 10] = [
    ("Box 1", "Rack 1"),
    ("Box 2", "Rack 2"),
    ("Box 3", "Rack 1"),
    ("Box 4", "Rack 3"),
    ("Box 5", "Rack 2"),
    ("Box 6", "Rack 4"),
    ("Box 7", "Rack 3"),
    ("Box 8", "Rack 5"),
    ("Box 9", "Rack 4"),
    ("Box 10", "Rack 6"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub tanks: usize,
    pub racks: usize,
    pub boxes: usize,
    pub cells: usize,
    pub reservations: usize,
}

/// (id, cell, location, by, for, start, end, status, comment)
const RESERVATIONS: [(&str, &str, &str, &str, &str, (i32, u32, u32), (i32, u32, u32), ReservationStatus, &str); 5] = [
    ("RES-001", "CELL-A1", "Tank 1 > Rack 2 > Box 3", "Dr. Martin", "Projet Alpha", (2024, 1, 15), (2024, 2, 15), ReservationStatus::Active, "Échantillons pour analyse ADN"),
    ("RES-002", "CELL-B5", "Tank 2 > Rack 1 > Box 1", "Dr. Dupont", "Étude clinique", (2024, 1, 20), (2024, 3, 20), ReservationStatus::Pending, "En attente de validation"),
    ("RES-003", "CELL-C3", "Tank 1 > Rack 4 > Box 2", "Dr. Bernard", "Recherche PBMC", (2024, 1, 10), (2024, 1, 25), ReservationStatus::Completed, "Terminé avec succès"),
    ("RES-004", "CELL-D7", "Tank 3 > Rack 2 > Box 5", "Dr. Leroy", "Test qualité", (2024, 1, 18), (2024, 2, 1), ReservationStatus::Cancelled, "Annulé - échantillon non disponible"),
    ("RES-005", "CELL-E2", "Tank 2 > Rack 3 > Box 4", "Dr. Martin", "Projet Beta", (2024, 2, 1), (2024, 3, 1), ReservationStatus::Active, "Suivi mensuel"),
];

fn date((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn reservations() -> Vec<Reservation> {
    RESERVATIONS
        .into_iter()
        .map(|(id, cell, location, by, purpose, start, end, status, comment)| Reservation {
            id: id.into(),
            cell_id: cell.into(),
            location: location.into(),
            reserved_by: by.into(),
            reserved_for: purpose.into(),
            start_date: date(start),
            end_date: Some(date(end)),
            status,
            comment: comment.into(),
        })
        .collect()
}

/// Populate an empty repository with the demo lab. Each box is filled from
/// a `RandomOccupancy` seeded with `seed` plus the box's index, so the same
/// seed always yields the same inventory.
///
/// Runs as one batch: a failure part way leaves the repository empty.
pub fn seed_demo(repo: &mut dyn InventoryRepository, seed: u64) -> Result<SeedReport, RepoError> {
    if !repo.list_tanks()?.is_empty() {
        return Err(RepoError::Conflict("inventory is not empty; refusing to seed demo data".to_string()));
    }
    let mut report = SeedReport::default();
    repo.atomically(&mut |repo: &mut dyn InventoryRepository| seed_into(repo, seed, &mut report))?;

    log::info!(
        "seeded demo inventory: {} tanks, {} racks, {} boxes, {} occupied cells",
        report.tanks,
        report.racks,
        report.boxes,
        report.cells
    );
    Ok(report)
}

fn seed_into(repo: &mut dyn InventoryRepository, seed: u64, report: &mut SeedReport) -> Result<(), RepoError> {
    let mut tank_ids = Vec::new();
    for (name, location, capacity) in TANKS {
        let tank = repo.create_tank(&TankForm {
            name: name.into(),
            location: location.into(),
            capacity: Some(capacity),
            description: None,
        })?;
        tank_ids.push((name, tank.id));
        report.tanks += 1;
    }

    let mut rack_ids = Vec::new();
    for (name, tank, capacity) in RACKS {
        let tank_id = tank_ids.iter().find(|(n, _)| *n == tank).map(|(_, id)| *id);
        let rack = repo.create_rack(&RackForm { name: name.into(), tank_id, capacity: Some(capacity), description: None })?;
        rack_ids.push((name, rack.id));
        report.racks += 1;
    }

    for (index, (name, rack)) in BOXES.into_iter().enumerate() {
        let rack_id = rack_ids.iter().find(|(n, _)| *n == rack).map(|(_, id)| *id);
        let storage_box = repo.create_box(&BoxForm { name: name.into(), rack_id, ..BoxForm::default() })?;
        let grid = BoxGrid::build(storage_box.geometry, &mut RandomOccupancy::seeded(seed.wrapping_add(index as u64)));
        report.cells += repo.import_cells(storage_box.id, grid.cells())?;
        report.boxes += 1;
    }

    for reservation in reservations() {
        repo.import_reservation(reservation)?;
        report.reservations += 1;
    }
    Ok(())
}
