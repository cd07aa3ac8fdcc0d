use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellStatus};

/// Status counts of a cell collection.
///
/// Always computed by enumeration; `full + empty + reserved == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    #[serde(rename = "fullCount")]
    pub full: usize,
    #[serde(rename = "emptyCount")]
    pub empty: usize,
    #[serde(rename = "reservedCount")]
    pub reserved: usize,
}

impl Summary {
    /// Slots that are not available (full or reserved).
    pub fn occupied(&self) -> usize {
        self.full + self.reserved
    }

    /// Occupied share in whole percent, rounded. 0 for an empty collection.
    pub fn occupancy_percent(&self) -> u8 {
        self.percent_of(self.occupied())
    }

    /// Share of one status in whole percent, rounded.
    pub fn share(&self, status: CellStatus) -> u8 {
        self.percent_of(self.count(status))
    }

    fn percent_of(&self, count: usize) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((count as f64 * 100.0) / self.total as f64).round() as u8
    }

    pub fn count(&self, status: CellStatus) -> usize {
        match status {
            CellStatus::Full => self.full,
            CellStatus::Empty => self.empty,
            CellStatus::Reserved => self.reserved,
        }
    }

    pub fn level(&self) -> OccupancyLevel {
        OccupancyLevel::from_percent(self.occupancy_percent())
    }
}

impl Add for Summary {
    type Output = Summary;

    fn add(self, other: Summary) -> Summary {
        Summary {
            total: self.total + other.total,
            full: self.full + other.full,
            empty: self.empty + other.empty,
            reserved: self.reserved + other.reserved,
        }
    }
}

impl AddAssign for Summary {
    fn add_assign(&mut self, other: Summary) {
        *self = *self + other;
    }
}

/// Count statuses by walking the collection.
pub fn summarize<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Summary {
    let mut summary = Summary::default();
    for cell in cells {
        summary.total += 1;
        match cell.status {
            CellStatus::Full => summary.full += 1,
            CellStatus::Empty => summary.empty += 1,
            CellStatus::Reserved => summary.reserved += 1,
        }
    }
    summary
}

/// Container status shown for boxes, racks and tanks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyLevel {
    Active,
    Full,
    Empty,
}

impl OccupancyLevel {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0 => OccupancyLevel::Empty,
            p if p >= 100 => OccupancyLevel::Full,
            _ => OccupancyLevel::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OccupancyLevel::Active => "active",
            OccupancyLevel::Full => "full",
            OccupancyLevel::Empty => "empty",
        }
    }
}

/// How many containers sit at each occupancy level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub active: usize,
    pub full: usize,
    pub empty: usize,
}

impl LevelCounts {
    pub fn tally(summaries: impl IntoIterator<Item = Summary>) -> Self {
        let mut counts = LevelCounts::default();
        for summary in summaries {
            match summary.level() {
                OccupancyLevel::Active => counts.active += 1,
                OccupancyLevel::Full => counts.full += 1,
                OccupancyLevel::Empty => counts.empty += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(position: u32, status: CellStatus) -> Cell {
        let mut c = Cell::empty(format!("c{position}"), 1, position, position);
        c.status = status;
        c
    }

    fn mixed() -> Vec<Cell> {
        use CellStatus::*;
        [Full, Full, Full, Empty, Empty, Reserved]
            .into_iter()
            .enumerate()
            .map(|(i, s)| cell(i as u32 + 1, s))
            .collect()
    }

    #[test]
    fn test_summarize_concrete() {
        let summary = summarize(&mixed());
        assert_eq!(summary, Summary { total: 6, full: 3, empty: 2, reserved: 1 });
        assert_eq!(summary.full + summary.empty + summary.reserved, summary.total);
    }

    #[test]
    fn test_summarize_empty_collection() {
        let summary = summarize(&Vec::<Cell>::new());
        assert_eq!(summary, Summary::default());
        assert_eq!(summary.occupancy_percent(), 0);
        assert_eq!(summary.level(), OccupancyLevel::Empty);
    }

    #[test]
    fn test_occupancy_percent() {
        let summary = summarize(&mixed());
        // 4 of 6 occupied
        assert_eq!(summary.occupancy_percent(), 67);
        assert_eq!(summary.level(), OccupancyLevel::Active);

        let full = Summary { total: 4, full: 4, empty: 0, reserved: 0 };
        assert_eq!(full.level(), OccupancyLevel::Full);
    }

    #[test]
    fn test_share() {
        let summary = summarize(&mixed());
        assert_eq!(summary.share(CellStatus::Full), 50);
        assert_eq!(summary.share(CellStatus::Empty), 33);
        assert_eq!(summary.share(CellStatus::Reserved), 17);
        assert_eq!(Summary::default().share(CellStatus::Full), 0);
    }

    #[test]
    fn test_add_summaries() {
        let mut total = summarize(&mixed());
        total += summarize(&mixed());
        assert_eq!(total, Summary { total: 12, full: 6, empty: 4, reserved: 2 });
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(summarize(&mixed())).unwrap();
        assert_eq!(json["total"], 6);
        assert_eq!(json["fullCount"], 3);
        assert_eq!(json["emptyCount"], 2);
        assert_eq!(json["reservedCount"], 1);
    }

    #[test]
    fn test_level_counts() {
        let full = Summary { total: 4, full: 3, empty: 0, reserved: 1 };
        let active = summarize(&mixed());
        let counts = LevelCounts::tally([full, active, Summary::default(), active]);
        assert_eq!(counts, LevelCounts { active: 2, full: 1, empty: 1 });
    }
}
