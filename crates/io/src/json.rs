// JSON export

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// Pretty-print any serializable view (grid snapshot, summary, reservations) to a file.
pub fn export<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| e.to_string())?;
    writer.write_all(b"\n").map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}

pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use cryobank_engine::filter::{CellCriteria, FilterState, Tab};
    use cryobank_engine::grid::{build_grid, RandomOccupancy};
    use cryobank_engine::view::{GridView, ViewMode};

    #[test]
    fn test_snapshot_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.json");

        let grid = build_grid(6, 6, &mut RandomOccupancy::seeded(8)).unwrap();
        let view = GridView::new(&grid, FilterState::new(Tab::Empty, CellCriteria::default()));
        export(&view.snapshot(ViewMode::Table), &path).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["rows"], 6);
        assert_eq!(parsed["mode"], "table");
        assert_eq!(parsed["filter"]["tab"], "empty");
        assert_eq!(parsed["summary"]["total"], 36);

        let empty = parsed["summary"]["emptyCount"].as_u64().unwrap() as usize;
        assert_eq!(parsed["cells"].as_array().unwrap().len(), empty);
        assert_eq!(parsed["filtered_count"].as_u64().unwrap() as usize, empty);
    }

    #[test]
    fn test_to_string_summary() {
        let grid = build_grid(2, 3, &mut RandomOccupancy::seeded(1)).unwrap();
        let text = to_string(&grid.summary()).unwrap();
        assert!(text.contains("\"fullCount\""));
        assert!(text.contains("\"total\": 6"));
    }
}
