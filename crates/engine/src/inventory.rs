//! Storage hierarchy: Tank > Rack > Box.
//!
//! Occupancy of racks and tanks is never stored; it is rolled up from the
//! summaries of the boxes they contain.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::geometry::BoxGeometry;
use crate::stats::Summary;

pub type TankId = i64;
pub type RackId = i64;
pub type BoxId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: TankId,
    pub name: String,
    pub location: String,
    /// Number of racks the tank holds
    pub capacity: Option<u32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rack {
    pub id: RackId,
    pub name: String,
    pub tank_id: TankId,
    /// Number of boxes the rack holds
    pub capacity: Option<u32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageBox {
    pub id: BoxId,
    pub name: String,
    pub rack_id: RackId,
    pub geometry: BoxGeometry,
    pub description: Option<String>,
}

/// Parent filter of a list page; `All` is the "no filter" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentFilter {
    #[default]
    All,
    Named(String),
}

impl ParentFilter {
    pub fn parse(value: &str) -> Self {
        if value.trim().is_empty() || value.trim().eq_ignore_ascii_case("all") {
            ParentFilter::All
        } else {
            ParentFilter::Named(value.to_string())
        }
    }

    fn matches(&self, parent_name: &str) -> bool {
        match self {
            ParentFilter::All => true,
            ParentFilter::Named(name) => name == parent_name,
        }
    }
}

/// Case-insensitive substring test; an empty query matches everything.
fn contains_ci(haystack: &str, query: &str) -> bool {
    haystack.to_lowercase().contains(&query.to_lowercase())
}

/// Loaded tanks, racks and boxes with parent lookups.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    tanks: Vec<Tank>,
    racks: Vec<Rack>,
    boxes: Vec<StorageBox>,
}

impl Inventory {
    pub fn new(tanks: Vec<Tank>, racks: Vec<Rack>, boxes: Vec<StorageBox>) -> Self {
        Self { tanks, racks, boxes }
    }

    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    pub fn racks(&self) -> &[Rack] {
        &self.racks
    }

    pub fn boxes(&self) -> &[StorageBox] {
        &self.boxes
    }

    pub fn tank(&self, id: TankId) -> Option<&Tank> {
        self.tanks.iter().find(|t| t.id == id)
    }

    pub fn rack(&self, id: RackId) -> Option<&Rack> {
        self.racks.iter().find(|r| r.id == id)
    }

    pub fn storage_box(&self, id: BoxId) -> Option<&StorageBox> {
        self.boxes.iter().find(|b| b.id == id)
    }

    pub fn racks_in(&self, tank_id: TankId) -> impl Iterator<Item = &Rack> {
        self.racks.iter().filter(move |r| r.tank_id == tank_id)
    }

    pub fn boxes_in(&self, rack_id: RackId) -> impl Iterator<Item = &StorageBox> {
        self.boxes.iter().filter(move |b| b.rack_id == rack_id)
    }

    pub fn tank_name(&self, id: TankId) -> &str {
        self.tank(id).map(|t| t.name.as_str()).unwrap_or("")
    }

    pub fn rack_name(&self, id: RackId) -> &str {
        self.rack(id).map(|r| r.name.as_str()).unwrap_or("")
    }

    /// Breadcrumb of a box: "Tank 1 > Rack 2 > Box 3".
    pub fn location_of(&self, box_id: BoxId) -> Option<String> {
        let b = self.storage_box(box_id)?;
        let rack = self.rack(b.rack_id)?;
        let tank = self.tank(rack.tank_id)?;
        Some(format!("{} > {} > {}", tank.name, rack.name, b.name))
    }

    // -------------------------------------------------------------------------
    // List-page search
    // -------------------------------------------------------------------------

    /// Tanks whose name or location contains `query`.
    pub fn search_tanks(&self, query: &str) -> Vec<&Tank> {
        self.tanks
            .iter()
            .filter(|t| contains_ci(&t.name, query) || contains_ci(&t.location, query))
            .collect()
    }

    /// Racks whose name or tank name contains `query`, limited to one tank.
    pub fn search_racks(&self, query: &str, tank: &ParentFilter) -> Vec<&Rack> {
        self.racks
            .iter()
            .filter(|r| {
                let tank_name = self.tank_name(r.tank_id);
                (contains_ci(&r.name, query) || contains_ci(tank_name, query)) && tank.matches(tank_name)
            })
            .collect()
    }

    /// Boxes whose name or rack name contains `query`, limited to one rack.
    pub fn search_boxes(&self, query: &str, rack: &ParentFilter) -> Vec<&StorageBox> {
        self.boxes
            .iter()
            .filter(|b| {
                let rack_name = self.rack_name(b.rack_id);
                (contains_ci(&b.name, query) || contains_ci(rack_name, query)) && rack.matches(rack_name)
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Occupancy roll-up
    // -------------------------------------------------------------------------

    pub fn rack_summary(&self, rack_id: RackId, box_summaries: &FxHashMap<BoxId, Summary>) -> Summary {
        self.boxes_in(rack_id)
            .filter_map(|b| box_summaries.get(&b.id).copied())
            .fold(Summary::default(), |acc, s| acc + s)
    }

    pub fn tank_summary(&self, tank_id: TankId, box_summaries: &FxHashMap<BoxId, Summary>) -> Summary {
        self.racks_in(tank_id)
            .map(|r| self.rack_summary(r.id, box_summaries))
            .fold(Summary::default(), |acc, s| acc + s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Inventory {
        let tanks = vec![
            Tank { id: 1, name: "Tank 1".into(), location: "Zone A".into(), capacity: Some(12), description: None },
            Tank { id: 2, name: "Tank 2".into(), location: "Zone B".into(), capacity: Some(10), description: None },
        ];
        let racks = vec![
            Rack { id: 10, name: "Rack 1".into(), tank_id: 1, capacity: Some(27), description: None },
            Rack { id: 11, name: "Rack 2".into(), tank_id: 2, capacity: Some(10), description: None },
            Rack { id: 12, name: "Rack 3".into(), tank_id: 1, capacity: Some(15), description: None },
        ];
        let boxes = vec![
            StorageBox { id: 100, name: "Box 1".into(), rack_id: 10, geometry: BoxGeometry::default(), description: None },
            StorageBox { id: 101, name: "Box 2".into(), rack_id: 11, geometry: BoxGeometry::default(), description: None },
            StorageBox { id: 102, name: "Box 3".into(), rack_id: 10, geometry: BoxGeometry::default(), description: None },
        ];
        Inventory::new(tanks, racks, boxes)
    }

    #[test]
    fn test_location_breadcrumb() {
        let inv = inventory();
        assert_eq!(inv.location_of(101).as_deref(), Some("Tank 2 > Rack 2 > Box 2"));
        assert_eq!(inv.location_of(999), None);
    }

    #[test]
    fn test_search_tanks_by_location() {
        let inv = inventory();
        let found: Vec<&str> = inv.search_tanks("zone b").iter().map(|t| t.name.as_str()).collect();
        assert_eq!(found, vec!["Tank 2"]);
        assert_eq!(inv.search_tanks("").len(), 2);
    }

    #[test]
    fn test_search_racks_with_tank_filter() {
        let inv = inventory();
        let all_in_tank_1 = inv.search_racks("", &ParentFilter::parse("Tank 1"));
        assert_eq!(all_in_tank_1.len(), 2);

        let by_parent_name = inv.search_racks("tank 2", &ParentFilter::All);
        assert_eq!(by_parent_name.len(), 1);
        assert_eq!(by_parent_name[0].name, "Rack 2");

        assert!(inv.search_racks("rack 2", &ParentFilter::parse("Tank 1")).is_empty());
    }

    #[test]
    fn test_search_boxes() {
        let inv = inventory();
        let found = inv.search_boxes("box", &ParentFilter::parse("Rack 1"));
        let names: Vec<&str> = found.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Box 1", "Box 3"]);
        assert_eq!(ParentFilter::parse("all"), ParentFilter::All);
    }

    #[test]
    fn test_rollup() {
        let inv = inventory();
        let mut summaries = FxHashMap::default();
        summaries.insert(100, Summary { total: 81, full: 60, empty: 17, reserved: 4 });
        summaries.insert(102, Summary { total: 81, full: 0, empty: 81, reserved: 0 });
        summaries.insert(101, Summary { total: 81, full: 81, empty: 0, reserved: 0 });

        let rack = inv.rack_summary(10, &summaries);
        assert_eq!(rack, Summary { total: 162, full: 60, empty: 98, reserved: 4 });

        let tank = inv.tank_summary(1, &summaries);
        assert_eq!(tank, rack);
        assert_eq!(inv.tank_summary(2, &summaries).occupancy_percent(), 100);
    }
}
