//! Tab and criteria filters - Cell View Layer
//!
//! Filters are pure predicates over cells. Both render modes read the same
//! predicates:
//! - the table keeps only matching cells (`filter_by_tab`, `filter_by_criteria`)
//! - the spatial grid keeps every cell and dims the rest (`VisibilityMask`)
//!
//! Key invariants:
//! - Filtering never mutates or reorders the source collection
//! - Tab and criteria predicates are independent, so composition order
//!   does not change the result
//! - The visibility mask is indexed by POSITION (1-based), not by
//!   index in a filtered list

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellStatus, CellType};
use crate::error::EngineError;

// =============================================================================
// Tab
// =============================================================================

/// Status subset selected in the tab bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    All,
    Empty,
    Reserved,
    Full,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::All, Tab::Empty, Tab::Reserved, Tab::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::All => "all",
            Tab::Empty => "empty",
            Tab::Reserved => "reserved",
            Tab::Full => "full",
        }
    }

    pub fn matches(self, status: CellStatus) -> bool {
        match self {
            Tab::All => true,
            Tab::Empty => status == CellStatus::Empty,
            Tab::Reserved => status == CellStatus::Reserved,
            Tab::Full => status == CellStatus::Full,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Tab::All),
            "empty" => Ok(Tab::Empty),
            "reserved" => Ok(Tab::Reserved),
            "full" => Ok(Tab::Full),
            _ => Err(EngineError::Parse { what: "tab", value: s.to_string() }),
        }
    }
}

// =============================================================================
// Criteria
// =============================================================================

/// Cell type filter; `All` is the "no filter" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFilter {
    #[default]
    All,
    Only(CellType),
}

impl TypeFilter {
    pub fn matches(self, cell_type: Option<CellType>) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(wanted) => cell_type == Some(wanted),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(TypeFilter::All);
        }
        s.parse::<CellType>().map(TypeFilter::Only)
    }
}

/// Free-text and type criteria from the filter bar. Empty text means inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCriteria {
    /// Case-sensitive substring of `id`
    pub identifier: Option<String>,
    pub cell_type: TypeFilter,
    /// Case-insensitive substring of `owner`
    pub owner: Option<String>,
}

impl CellCriteria {
    pub fn new(identifier: Option<String>, cell_type: TypeFilter, owner: Option<String>) -> Self {
        Self { identifier, cell_type, owner }
    }

    pub fn is_active(&self) -> bool {
        active_text(&self.identifier).is_some()
            || self.cell_type != TypeFilter::All
            || active_text(&self.owner).is_some()
    }

    /// All active criteria must hold.
    pub fn matches(&self, cell: &Cell) -> bool {
        if let Some(needle) = active_text(&self.identifier) {
            if !cell.id.contains(needle) {
                return false;
            }
        }
        if !self.cell_type.matches(cell.cell_type) {
            return false;
        }
        if let Some(needle) = active_text(&self.owner) {
            let owner = cell.owner.as_deref().unwrap_or("").to_lowercase();
            if !owner.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

fn active_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Complete filter-bar state handed in by the parent view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub tab: Tab,
    pub criteria: CellCriteria,
}

impl FilterState {
    pub fn new(tab: Tab, criteria: CellCriteria) -> Self {
        Self { tab, criteria }
    }

    pub fn is_active(&self) -> bool {
        self.tab != Tab::All || self.criteria.is_active()
    }

    pub fn matches(&self, cell: &Cell) -> bool {
        self.tab.matches(cell.status) && self.criteria.matches(cell)
    }
}

// =============================================================================
// Filter operations
// =============================================================================

/// Keep cells whose status belongs to `tab`. Stable.
pub fn filter_by_tab<'a, I>(cells: I, tab: Tab) -> Vec<&'a Cell>
where
    I: IntoIterator<Item = &'a Cell>,
{
    cells.into_iter().filter(|c| tab.matches(c.status)).collect()
}

/// Keep cells matching every active criterion. Stable.
pub fn filter_by_criteria<'a, I>(cells: I, criteria: &CellCriteria) -> Vec<&'a Cell>
where
    I: IntoIterator<Item = &'a Cell>,
{
    cells.into_iter().filter(|c| criteria.matches(c)).collect()
}

/// Tab and criteria together. Stable.
pub fn apply<'a, I>(cells: I, state: &FilterState) -> Vec<&'a Cell>
where
    I: IntoIterator<Item = &'a Cell>,
{
    cells.into_iter().filter(|c| state.matches(c)).collect()
}

// =============================================================================
// VisibilityMask: grid-mode view of a filter
// =============================================================================

/// Per-position visibility for the spatial grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityMask {
    /// Indexed by position - 1. true = matches the filter
    visible: Vec<bool>,
    /// Cached visible positions, in row-major order
    visible_positions: Vec<u32>,
}

impl VisibilityMask {
    /// Mask for a row-major grid collection.
    pub fn compute(cells: &[Cell], state: &FilterState) -> Self {
        let len = cells.iter().map(|c| c.position as usize).max().unwrap_or(0);
        let mut visible = vec![false; len];
        for cell in cells {
            if cell.position > 0 && state.matches(cell) {
                visible[cell.position as usize - 1] = true;
            }
        }
        let visible_positions = visible
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| v.then_some(i as u32 + 1))
            .collect();
        Self { visible, visible_positions }
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn is_visible(&self, position: u32) -> bool {
        position > 0 && self.visible.get(position as usize - 1).copied().unwrap_or(false)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_positions.len()
    }

    pub fn visible_positions(&self) -> &[u32] {
        &self.visible_positions
    }

    /// Is anything dimmed?
    pub fn is_filtered(&self) -> bool {
        self.visible_count() < self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(id: &str, position: u32, status: CellStatus, cell_type: Option<CellType>, owner: Option<&str>) -> Cell {
        let mut c = Cell::empty(id, 1, position, position);
        c.status = status;
        c.cell_type = cell_type;
        c.owner = owner.map(String::from);
        c
    }

    fn sample() -> Vec<Cell> {
        use CellStatus::*;
        vec![
            cell("900433160424", 1, Full, Some(CellType::Lb), None),
            cell("900208230424", 2, Full, Some(CellType::Pbmc), Some("Dr. Dupont")),
            cell("900208230425", 3, Full, Some(CellType::Lb), Some("dr. martin")),
            cell("900455240424", 4, Empty, None, None),
            cell("900208230426", 5, Reserved, Some(CellType::Pbmc), Some("Dr. Martin")),
            cell("900005000001", 6, Empty, None, None),
        ]
    }

    fn ids(cells: &[&Cell]) -> Vec<String> {
        cells.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_tab_all_is_identity() {
        let cells = sample();
        let all = filter_by_tab(&cells, Tab::All);
        assert_eq!(all.len(), cells.len());
        for (a, b) in all.iter().zip(cells.iter()) {
            assert_eq!(*a, b);
        }
    }

    #[test]
    fn test_tab_subsets() {
        let cells = sample();
        assert_eq!(filter_by_tab(&cells, Tab::Empty).len(), 2);
        assert_eq!(filter_by_tab(&cells, Tab::Full).len(), 3);

        let reserved = filter_by_tab(&cells, Tab::Reserved);
        assert_eq!(ids(&reserved), vec!["900208230426"]);
    }

    #[test]
    fn test_tab_is_stable() {
        let cells = sample();
        let full = filter_by_tab(&cells, Tab::Full);
        let positions: Vec<u32> = full.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_identifier_and_type() {
        let cells = sample();
        let criteria = CellCriteria::new(Some("900208".into()), TypeFilter::Only(CellType::Pbmc), None);
        let result = filter_by_criteria(&cells, &criteria);
        assert_eq!(ids(&result), vec!["900208230424", "900208230426"]);
        assert!(result.iter().all(|c| c.id.contains("900208") && c.cell_type == Some(CellType::Pbmc)));
    }

    #[test]
    fn test_identifier_is_case_sensitive() {
        let mut cells = sample();
        cells[0].id = "ABC-1".into();
        let lower = CellCriteria::new(Some("abc".into()), TypeFilter::All, None);
        assert!(filter_by_criteria(&cells, &lower).is_empty());
        let upper = CellCriteria::new(Some("ABC".into()), TypeFilter::All, None);
        assert_eq!(filter_by_criteria(&cells, &upper).len(), 1);
    }

    #[test]
    fn test_owner_is_case_insensitive() {
        let cells = sample();
        let criteria = CellCriteria::new(None, TypeFilter::All, Some("MARTIN".into()));
        let result = filter_by_criteria(&cells, &criteria);
        assert_eq!(ids(&result), vec!["900208230425", "900208230426"]);
    }

    #[test]
    fn test_empty_text_is_inactive() {
        let cells = sample();
        let criteria = CellCriteria::new(Some(String::new()), TypeFilter::All, Some(String::new()));
        assert!(!criteria.is_active());
        assert_eq!(filter_by_criteria(&cells, &criteria).len(), cells.len());
    }

    #[test]
    fn test_composition_order_independent() {
        let cells = sample();
        let criteria = CellCriteria::new(Some("900208".into()), TypeFilter::All, None);
        for tab in Tab::ALL {
            let a = filter_by_tab(filter_by_criteria(&cells, &criteria), tab);
            let b = filter_by_criteria(filter_by_tab(&cells, tab), &criteria);
            assert_eq!(a, b, "tab {tab}");
            let c = apply(&cells, &FilterState::new(tab, criteria.clone()));
            assert_eq!(a, c, "tab {tab}");
        }
    }

    #[test]
    fn test_no_results_is_not_an_error() {
        let cells = sample();
        let criteria = CellCriteria::new(Some("nope".into()), TypeFilter::All, None);
        assert!(filter_by_criteria(&cells, &criteria).is_empty());
    }

    #[test]
    fn test_parse_tab_and_type() {
        assert_eq!("Reserved".parse::<Tab>().unwrap(), Tab::Reserved);
        assert!("booked".parse::<Tab>().is_err());
        assert_eq!("all".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!("PBMC".parse::<TypeFilter>().unwrap(), TypeFilter::Only(CellType::Pbmc));
        assert!("T-cell".parse::<TypeFilter>().is_err());
    }

    #[test]
    fn test_visibility_mask() {
        let cells = sample();
        let state = FilterState::new(Tab::Empty, CellCriteria::default());
        let mask = VisibilityMask::compute(&cells, &state);

        assert_eq!(mask.len(), 6);
        assert_eq!(mask.visible_positions(), &[4, 6]);
        assert!(mask.is_visible(4));
        assert!(!mask.is_visible(1));
        assert!(!mask.is_visible(0));
        assert!(!mask.is_visible(7));
        assert!(mask.is_filtered());

        let all = VisibilityMask::compute(&cells, &FilterState::default());
        assert_eq!(all.visible_count(), 6);
        assert!(!all.is_filtered());
    }
}
