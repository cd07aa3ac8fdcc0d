// Plain-text rendering of box grids, cell tables and list pages

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use cryobank_engine::cell::{Cell, CellStatus};
use cryobank_engine::stats::{LevelCounts, Summary};
use cryobank_engine::view::GridView;
use cryobank_io::csv::table_record;
use cryobank_io::repository::slot_label;

/// Shown instead of an empty table or next to an all-dimmed grid.
pub(crate) const EMPTY_STATE: &str = "No cells match the current filters.";

/// Widest a table column may grow before its values are truncated.
const MAX_COLUMN_WIDTH: usize = 32;

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub(crate) struct Style {
    /// Stand-in for absent values
    pub placeholder: String,
    /// ANSI dimming for filtered-out grid cells; without it they print as `·`
    pub color: bool,
}

// ============================================================================
// Width helpers
// ============================================================================

fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Cut `s` to at most `width` display columns, ending in ".." when cut.
fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    let budget = width.saturating_sub(2);
    let mut used = 0;
    let mut out = String::new();
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        out.push(ch);
    }
    if width >= 2 {
        out.push_str("..");
    }
    out
}

fn pad_right(s: &str, width: usize) -> String {
    let s = truncate_display(s, width);
    let pad = width.saturating_sub(display_width(&s));
    format!("{}{}", s, " ".repeat(pad))
}

// ============================================================================
// Grid
// ============================================================================

fn glyph(status: CellStatus) -> &'static str {
    match status {
        CellStatus::Full => "●",
        CellStatus::Reserved => "◐",
        CellStatus::Empty => "○",
    }
}

/// Spatial grid: column numbers across, row letters down. Every cell is drawn;
/// cells outside the filter are dimmed rather than dropped.
pub(crate) fn grid(view: &GridView<'_>, style: &Style) -> String {
    let geometry = view.geometry();
    let rows: Vec<_> = view.grid_rows().collect();
    let label_width = rows.iter().map(|(label, _)| display_width(label)).max().unwrap_or(1);
    let col_width = geometry.cols().to_string().len().max(1) + 1;

    let mut out = String::new();
    out.push_str(&" ".repeat(label_width));
    for col in 1..=geometry.cols() {
        out.push_str(&format!("{:>width$}", col, width = col_width));
    }
    out.push('\n');

    for (label, cells) in rows {
        out.push_str(&pad_right(&label, label_width));
        for (cell, visible) in cells {
            out.push_str(&" ".repeat(col_width - 1));
            match (visible, style.color) {
                (true, _) => out.push_str(glyph(cell.status)),
                (false, true) => {
                    out.push_str(DIM);
                    out.push_str(glyph(cell.status));
                    out.push_str(RESET);
                }
                (false, false) => out.push('·'),
            }
        }
        out.push('\n');
    }

    out.push_str("● full  ◐ reserved  ○ empty\n");
    if view.is_empty_result() {
        out.push_str(EMPTY_STATE);
        out.push('\n');
    }
    out
}

// ============================================================================
// Summary badges
// ============================================================================

pub(crate) fn badges(summary: &Summary) -> String {
    format!(
        "Full {}  Reserved {}  Empty {}  Total {}  ({}% occupied)",
        summary.full,
        summary.reserved,
        summary.empty,
        summary.total,
        summary.occupancy_percent()
    )
}

/// Count line above a container list: how many are active, full or empty.
pub(crate) fn level_badges(counts: &LevelCounts) -> String {
    format!("Active {}  Full {}  Empty {}", counts.active, counts.full, counts.empty)
}

/// Badges of the whole box plus, when a filter is on, how much of it shows.
pub(crate) fn summary_lines(view: &GridView<'_>) -> String {
    let mut out = badges(&view.summary());
    if view.filter_state().is_active() {
        out.push_str(&format!("\nShowing {} of {} cells", view.filtered_count(), view.summary().total));
    }
    out
}

// ============================================================================
// Tables
// ============================================================================

/// Columns of the cell table: (header, index into `table_record`).
const CELL_COLUMNS: [(&str, usize); 11] = [
    ("ID", 0),
    ("NAME", 4),
    ("STATUS", 5),
    ("TYPE", 6),
    ("CELLS", 7),
    ("SAMPLES", 8),
    ("KEYWORDS", 9),
    ("FROZEN", 10),
    ("EXPIRES", 11),
    ("OWNER", 12),
    ("RESERVED BY", 13),
];

pub(crate) fn cell_table(cells: &[&Cell], style: &Style) -> String {
    if cells.is_empty() {
        return format!("{EMPTY_STATE}\n");
    }
    let mut headers = vec!["SLOT"];
    headers.extend(CELL_COLUMNS.iter().map(|(h, _)| *h));

    let rows: Vec<Vec<String>> = cells
        .iter()
        .map(|cell| {
            let record = table_record(cell, &style.placeholder);
            let mut row = vec![slot_label(cell.row, cell.col)];
            row.extend(CELL_COLUMNS.iter().map(|(_, i)| record[*i].clone()));
            row
        })
        .collect();
    table(&headers, &rows)
}

/// Left-aligned columns separated by two spaces, header first.
pub(crate) fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (w, value) in widths.iter_mut().zip(row) {
            *w = (*w).max(display_width(value).min(MAX_COLUMN_WIDTH));
        }
    }

    let mut out = line(headers.iter().copied(), &widths);
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let cols: Vec<String> = values.zip(widths).map(|(v, w)| pad_right(v, *w)).collect();
    let mut line = cols.join("  ");
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryobank_engine::filter::{CellCriteria, FilterState, Tab};
    use cryobank_engine::geometry::BoxGeometry;
    use cryobank_engine::grid::{BoxGrid, RecordOccupancy};

    fn plain() -> Style {
        Style { placeholder: "-".into(), color: false }
    }

    fn sample_grid() -> BoxGrid {
        let mut full = Cell::empty("S-1", 1, 2, 2);
        full.status = CellStatus::Full;
        full.owner = Some("Alice".into());
        let mut reserved = Cell::empty("S-2", 2, 1, 3);
        reserved.status = CellStatus::Reserved;
        reserved.reserved_by = Some("Bob".into());
        let geometry = BoxGeometry::new(2, 2).unwrap();
        BoxGrid::build(geometry, &mut RecordOccupancy::new(vec![full, reserved]))
    }

    #[test]
    fn test_truncate_display() {
        assert_eq!(truncate_display("abc", 5), "abc");
        assert_eq!(truncate_display("abcdef", 5), "abc..");
        assert_eq!(pad_right("ab", 4), "ab  ");
        // "世界你好" is 8 columns wide
        assert_eq!(truncate_display("\u{4e16}\u{754c}\u{4f60}\u{597d}", 6), "\u{4e16}\u{754c}..");
    }

    #[test]
    fn test_grid_draws_every_cell() {
        let grid = sample_grid();
        let view = GridView::new(&grid, FilterState::default());
        let text = super::grid(&view, &plain());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "  1 2");
        assert_eq!(lines[1], "A ○ ●");
        assert_eq!(lines[2], "B ◐ ○");
        assert!(!text.contains(EMPTY_STATE));
    }

    #[test]
    fn test_grid_dims_filtered_cells() {
        let grid = sample_grid();
        let view = GridView::new(&grid, FilterState::new(Tab::Full, CellCriteria::default()));
        let text = super::grid(&view, &plain());
        assert!(text.contains("A · ●"));
        assert!(text.contains("B · ·"));

        let colored = super::grid(&view, &Style { color: true, ..plain() });
        assert!(colored.contains(DIM));
    }

    #[test]
    fn test_grid_empty_state() {
        let grid = sample_grid();
        let criteria = CellCriteria { owner: Some("nobody".into()), ..CellCriteria::default() };
        let view = GridView::new(&grid, FilterState::new(Tab::All, criteria));
        assert!(super::grid(&view, &plain()).ends_with(&format!("{EMPTY_STATE}\n")));
    }

    #[test]
    fn test_cell_table() {
        let grid = sample_grid();
        let view = GridView::new(&grid, FilterState::new(Tab::Reserved, CellCriteria::default()));
        let text = cell_table(&view.visible(), &plain());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("SLOT  ID"));
        assert!(lines[1].starts_with("B1    S-2"));
        assert!(lines[1].ends_with("Bob"));

        assert_eq!(cell_table(&[], &plain()), format!("{EMPTY_STATE}\n"));
    }

    #[test]
    fn test_summary_lines() {
        let grid = sample_grid();
        let view = GridView::new(&grid, FilterState::default());
        assert_eq!(summary_lines(&view), "Full 1  Reserved 1  Empty 2  Total 4  (50% occupied)");

        let view = GridView::new(&grid, FilterState::new(Tab::Empty, CellCriteria::default()));
        assert!(summary_lines(&view).ends_with("Showing 2 of 4 cells"));
    }

    #[test]
    fn test_level_badges() {
        let counts = LevelCounts { active: 3, full: 1, empty: 2 };
        assert_eq!(level_badges(&counts), "Active 3  Full 1  Empty 2");
    }

    #[test]
    fn test_table_aligns_wide_text() {
        let rows = vec![vec!["1".to_string(), "\u{4e16}\u{754c}".to_string()], vec!["22".to_string(), "x".to_string()]];
        let text = table(&["ID", "NAME"], &rows);
        assert_eq!(text, "ID  NAME\n1   \u{4e16}\u{754c}\n22  x\n");
    }
}
