// End-to-end tests for the `cryo` binary.
// Run with: cargo test -p cryobank-cli --test cli_tests
//
// Every test works on its own database and settings file in a temp dir.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

struct Lab {
    dir: TempDir,
}

impl Lab {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            "{\n  // test settings\n  \"display.placeholder\": \"-\",\n  \"display.color\": false\n}\n",
        )
        .unwrap();
        Lab { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cryo(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cryo"))
            .arg("--db")
            .arg(self.path("inventory.db"))
            .arg("--config")
            .arg(self.path("settings.json"))
            .args(args)
            .env_remove("CRYOBANK_LOG")
            .env_remove("CRYOBANK_DB")
            .env_remove("CRYOBANK_CONFIG")
            .output()
            .expect("failed to run cryo")
    }

    fn ok(&self, args: &[&str]) -> String {
        let out = self.cryo(args);
        assert!(
            out.status.success(),
            "cryo {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8(out.stdout).unwrap()
    }

    fn json(&self, args: &[&str]) -> Value {
        serde_json::from_str(&self.ok(args)).expect("valid JSON on stdout")
    }

    /// Fresh tank, rack and 9x9 box; returns the box id.
    fn empty_box(&self) -> String {
        self.ok(&["create", "tank", "--name", "Tank A", "--location", "Room 1"]);
        let tank = self.json(&["tanks", "--json"])[0]["tank"]["id"].to_string();
        self.ok(&["create", "rack", "--name", "Rack A", "--tank", &tank]);
        let rack = self.json(&["racks", "--json"])[0]["rack"]["id"].to_string();
        self.ok(&["create", "box", "--name", "Box A", "--rack", &rack]);
        self.json(&["boxes", "--json"])[0]["box"]["id"].to_string()
    }
}

fn code(out: &Output) -> Option<i32> {
    out.status.code()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

// ---------------------------------------------------------------------------
// Placeholder grids
// ---------------------------------------------------------------------------

#[test]
fn grid_with_seed_is_reproducible() {
    let lab = Lab::new();
    let a = lab.ok(&["grid", "--rows", "6", "--cols", "8", "--seed", "11"]);
    let b = lab.ok(&["grid", "--rows", "6", "--cols", "8", "--seed", "11"]);
    assert_eq!(a, b);

    let lines: Vec<&str> = a.lines().collect();
    assert_eq!(lines[0], "Placeholder box 6x8");
    assert!(lines[1].trim_start().starts_with("1 2 3"));
    assert!(lines[2].starts_with('A'));
    assert!(lines[7].starts_with('F'));
    assert!(a.contains("Total 48"));
}

#[test]
fn summary_partitions_the_grid() {
    let lab = Lab::new();
    let v = lab.json(&["summary", "--rows", "9", "--cols", "9", "--seed", "5", "--json"]);
    let s = &v["summary"];
    assert_eq!(s["total"], 81);
    let sum = s["fullCount"].as_u64().unwrap() + s["emptyCount"].as_u64().unwrap() + s["reservedCount"].as_u64().unwrap();
    assert_eq!(sum, 81);
    // No filter: the filtered summary is the whole box.
    assert_eq!(v["filtered"], v["summary"]);
}

#[test]
fn table_json_keeps_only_matching_cells() {
    let lab = Lab::new();
    let v = lab.json(&["table", "--rows", "7", "--cols", "7", "--seed", "2", "--tab", "empty", "--json"]);
    let cells = v["cells"].as_array().unwrap();
    assert_eq!(cells.len() as u64, v["filtered_count"].as_u64().unwrap());
    assert_eq!(v["summary"]["emptyCount"], v["filtered_count"]);
    assert!(cells.iter().all(|c| c["status"] == "empty"));

    // Positions stay in row-major order.
    let positions: Vec<u64> = cells.iter().map(|c| c["position"].as_u64().unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn filter_with_no_match_prints_empty_state() {
    let lab = Lab::new();
    let out = lab.ok(&["table", "--rows", "6", "--cols", "6", "--seed", "3", "--owner", "no-such-owner"]);
    assert!(out.contains("No cells match the current filters."));
    assert!(out.contains("Showing 0 of 36 cells"));

    let grid = lab.ok(&["grid", "--rows", "6", "--cols", "6", "--seed", "3", "--owner", "no-such-owner"]);
    assert!(grid.contains("No cells match the current filters."));
}

#[test]
fn locate_resolves_letters_and_numbers() {
    let lab = Lab::new();
    let by_letter = lab.json(&["locate", "C", "4", "--rows", "9", "--cols", "9", "--seed", "8", "--json"]);
    let by_number = lab.json(&["locate", "3", "4", "--rows", "9", "--cols", "9", "--seed", "8", "--json"]);
    assert_eq!(by_letter, by_number);
    assert_eq!(by_letter["position"], 22);
}

#[test]
fn out_of_range_and_bad_geometry() {
    let lab = Lab::new();
    let out = lab.cryo(&["locate", "J", "1", "--rows", "9", "--cols", "9", "--seed", "1"]);
    assert_eq!(code(&out), Some(5));
    assert!(stderr(&out).contains("outside the 9x9 box"));

    let out = lab.cryo(&["grid", "--rows", "0", "--cols", "4"]);
    assert_eq!(code(&out), Some(4));
    assert!(stderr(&out).contains("invalid box geometry"));
}

#[test]
fn unknown_filter_values_are_usage_errors() {
    let lab = Lab::new();
    assert_eq!(code(&lab.cryo(&["grid", "--tab", "half"])), Some(2));
    assert_eq!(code(&lab.cryo(&["grid", "--type", "RBC"])), Some(2));
    assert_eq!(code(&lab.cryo(&["grid", "--box", "1", "--rows", "9"])), Some(2));
}

// ---------------------------------------------------------------------------
// Demo inventory
// ---------------------------------------------------------------------------

#[test]
fn demo_inventory_lists() {
    let lab = Lab::new();
    let out = lab.ok(&["init", "--demo", "--seed", "7"]);
    assert!(out.contains("6 tanks, 8 racks, 10 boxes"));

    let tanks = lab.json(&["tanks", "--search", "zone c", "--json"]);
    assert_eq!(tanks.as_array().unwrap().len(), 2);
    // Zone C tanks hold no boxes.
    assert!(tanks.as_array().unwrap().iter().all(|t| t["level"] == "empty"));

    let racks = lab.json(&["racks", "--tank", "Tank 1", "--json"]);
    assert_eq!(racks.as_array().unwrap().len(), 2);

    let boxes = lab.ok(&["boxes"]);
    let lines: Vec<&str> = boxes.lines().collect();
    assert_eq!(lines.len(), 12);
    assert!(lines[0].starts_with("Active "));
    let per_level: usize = lines[0]
        .split_whitespace()
        .filter_map(|word| word.parse::<usize>().ok())
        .sum();
    assert_eq!(per_level, 10);
    assert!(lines[1].starts_with("ID"));
    assert!(lines[1].contains("STATUS"));

    let boxes = lab.json(&["boxes", "--json"]);
    assert!(boxes
        .as_array()
        .unwrap()
        .iter()
        .all(|b| ["active", "full", "empty"].contains(&b["level"].as_str().unwrap())));

    let active = lab.json(&["reservations", "--status", "active", "--json"]);
    assert_eq!(active["stats"]["total"], 5);
    assert_eq!(active["stats"]["active"], 2);
    assert_eq!(active["reservations"].as_array().unwrap().len(), 2);

    // A second demo seed is refused.
    assert_eq!(code(&lab.cryo(&["init", "--demo"])), Some(6));
}

#[test]
fn demo_box_summary_matches_roll_up() {
    let lab = Lab::new();
    lab.ok(&["init", "--demo", "--seed", "3"]);
    let boxes = lab.json(&["boxes", "--rack", "Rack 1", "--json"]);
    let occupied: u64 = boxes
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["summary"]["fullCount"].as_u64().unwrap() + b["summary"]["reservedCount"].as_u64().unwrap())
        .sum();
    let total: u64 = boxes.as_array().unwrap().iter().map(|b| b["summary"]["total"].as_u64().unwrap()).sum();

    let racks = lab.json(&["racks", "--search", "Rack 1", "--json"]);
    let rack = racks.as_array().unwrap().iter().find(|r| r["rack"]["name"] == "Rack 1").unwrap();
    let rolled = &rack["summary"];
    assert_eq!(rolled["total"].as_u64().unwrap(), total);
    assert_eq!(
        rolled["fullCount"].as_u64().unwrap() + rolled["reservedCount"].as_u64().unwrap(),
        occupied
    );
}

#[test]
fn stats_overview_of_demo_lab() {
    let lab = Lab::new();
    lab.ok(&["init", "--demo", "--seed", "7"]);
    let v = lab.json(&["stats", "--json"]);
    assert_eq!((v["tanks"].as_u64(), v["racks"].as_u64(), v["boxes"].as_u64()), (Some(6), Some(8), Some(10)));

    let cells = &v["cells"];
    assert_eq!(cells["total"], 810);
    let parts = ["fullCount", "reservedCount", "emptyCount"].iter().map(|k| cells[k].as_u64().unwrap()).sum::<u64>();
    assert_eq!(parts, 810);

    // Same numbers as adding up the box list.
    let boxes = lab.json(&["boxes", "--json"]);
    let full: u64 = boxes.as_array().unwrap().iter().map(|b| b["summary"]["fullCount"].as_u64().unwrap()).sum();
    assert_eq!(cells["fullCount"].as_u64().unwrap(), full);

    let levels = &v["boxLevels"];
    let level_total = ["active", "full", "empty"].iter().map(|k| levels[k].as_u64().unwrap()).sum::<u64>();
    assert_eq!(level_total, 10);
    assert_eq!(v["reservations"]["total"], 5);
    assert_eq!(v["reservations"]["active"], 2);

    let text = lab.ok(&["stats"]);
    assert!(text.starts_with("Tanks 6  Racks 8  Boxes 10  Cells 810\n"));
    assert!(text.contains("STATUS"));
    assert!(text.contains("Reservations: Total 5  Active 2  Pending 1  Completed 1"));
}

#[test]
fn stats_on_empty_inventory() {
    let lab = Lab::new();
    let v = lab.json(&["stats", "--json"]);
    assert_eq!(v["boxes"], 0);
    assert_eq!(v["cells"]["total"], 0);
    assert!(lab.ok(&["stats"]).contains("0%"));
}

// ---------------------------------------------------------------------------
// Cell lifecycle
// ---------------------------------------------------------------------------

#[test]
fn cell_add_update_delete() {
    let lab = Lab::new();
    let id = lab.empty_box();
    let slot = ["--box", id.as_str(), "--row", "B", "--col", "3"];

    let mut add = vec!["cell", "add"];
    add.extend(slot);
    add.extend(["--id", "900000000012", "--type", "PBMC", "--cells", "5", "--owner", "Dr. Martin"]);
    let out = lab.ok(&add);
    assert!(out.contains("Cell 900000000012 stored at position 12"));

    // Occupied slot cannot be filled again.
    assert_eq!(code(&lab.cryo(&add)), Some(6));

    let cell = lab.json(&["locate", "B", "3", "--box", &id, "--json"]);
    assert_eq!(cell["status"], "full");
    assert_eq!(cell["cell_type"], "PBMC");
    assert_eq!(cell["owner"], "Dr. Martin");

    let mut update = vec!["cell", "update"];
    update.extend(slot);
    update.extend(["--id", "900000000012", "--type", "PBMC", "--cells", "9"]);
    assert!(lab.ok(&update).contains("updated"));
    assert_eq!(lab.json(&["locate", "B", "3", "--box", &id, "--json"])["cell_count"], 9);

    let owned = lab.json(&["table", "--box", &id, "--owner", "martin", "--json"]);
    assert_eq!(owned["filtered_count"], 0);

    let mut delete = vec!["cell", "delete"];
    delete.extend(slot);
    assert!(lab.ok(&delete).contains("removed from position 12"));
    assert_eq!(lab.json(&["locate", "B", "3", "--box", &id, "--json"])["status"], "empty");

    // Nothing left to delete.
    assert_eq!(code(&lab.cryo(&delete)), Some(5));
}

#[test]
fn cell_validation_errors() {
    let lab = Lab::new();
    let id = lab.empty_box();
    let out = lab.cryo(&["cell", "add", "--box", &id, "--row", "A", "--col", "1", "--id", "  "]);
    assert_eq!(code(&out), Some(4));
    assert!(stderr(&out).contains("identifier"));

    let out = lab.cryo(&["cell", "add", "--box", &id, "--row", "A", "--col", "1", "--id", "X", "--frozen", "16/04/2024"]);
    assert_eq!(code(&out), Some(2));

    let out = lab.cryo(&["cell", "add", "--box", "999", "--row", "A", "--col", "1", "--id", "X", "--type", "LB"]);
    assert_eq!(code(&out), Some(5));
    assert!(stderr(&out).contains("cryo boxes"));
}

#[test]
fn reserve_release_and_close() {
    let lab = Lab::new();
    let id = lab.empty_box();

    let out = lab.ok(&[
        "cell", "reserve", "--box", &id, "--row", "A", "--col", "2", "--cell-id", "CELL-A2", "--by", "Dr. Dupont",
        "--for", "Study", "--start", "2024-01-20",
    ]);
    assert!(out.contains("Reservation RES-001 created for CELL-A2"));

    let reserved = lab.json(&["table", "--box", &id, "--tab", "reserved", "--json"]);
    assert_eq!(reserved["filtered_count"], 1);
    assert_eq!(reserved["cells"][0]["reserved_by"], "Dr. Dupont");

    // Release needs a reserved slot.
    let out = lab.cryo(&["cell", "release", "--box", &id, "--row", "A", "--col", "3"]);
    assert_eq!(code(&out), Some(6));

    let out = lab.ok(&["cell", "release", "--box", &id, "--row", "A", "--col", "2"]);
    assert!(out.contains("RES-001: pending -> cancelled"));

    // Reserve again and close it from the reservations side.
    lab.ok(&[
        "cell", "reserve", "--box", &id, "--row", "A", "--col", "2", "--cell-id", "CELL-A2", "--by", "Dr. Dupont",
        "--status", "active",
    ]);
    let out = lab.ok(&["reservation", "status", "RES-002", "cancelled"]);
    assert!(out.contains("RES-002: active -> cancelled"));
    assert_eq!(lab.json(&["locate", "A", "2", "--box", &id, "--json"])["status"], "empty");

    // Cancelled is terminal.
    assert_eq!(code(&lab.cryo(&["reservation", "status", "RES-002", "active"])), Some(6));
    assert_eq!(code(&lab.cryo(&["reservation", "status", "RES-404", "active"])), Some(5));
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

#[test]
fn csv_export_then_import_into_box() {
    let lab = Lab::new();
    let id = lab.empty_box();
    let csv = lab.path("grid.csv");
    let csv_arg = csv.to_str().unwrap();

    let out = lab.ok(&["table", "--rows", "9", "--cols", "9", "--seed", "21", "--csv", csv_arg]);
    assert!(out.contains("Exported 81 cells"));

    let expected = lab.json(&["summary", "--rows", "9", "--cols", "9", "--seed", "21", "--json"]);
    lab.ok(&["import", csv_arg, "--box", &id]);
    let stored = lab.json(&["summary", "--box", &id, "--json"]);
    assert_eq!(stored["summary"], expected["summary"]);

    // The slots are taken now.
    assert_eq!(code(&lab.cryo(&["import", csv_arg, "--box", &id])), Some(6));
}

#[test]
fn import_rejects_malformed_table() {
    let lab = Lab::new();
    let id = lab.empty_box();
    let bad = lab.path("bad.csv");
    fs::write(&bad, "row,col,status\n1,1,full\n1,x,empty\n").unwrap();
    let out = lab.cryo(&["import", bad.to_str().unwrap(), "--box", &id]);
    assert_eq!(code(&out), Some(4));
    assert!(stderr(&out).contains("line 3"));
}

#[test]
fn import_rejects_incomplete_cells() {
    let lab = Lab::new();
    let id = lab.empty_box();
    let bare = lab.path("bare.csv");
    fs::write(&bare, "row,col,status,id,type,cell_count\n1,1,full,,,\n1,2,full,900002,LB,30\n2,1,reserved,900010,,\n").unwrap();
    let out = lab.cryo(&["import", bare.to_str().unwrap(), "--box", &id]);
    assert_eq!(code(&out), Some(4));
    let err = stderr(&out);
    assert!(err.contains("cell_type"), "{err}");
    assert!(err.contains("reserved_by"), "{err}");

    // All or nothing: the valid row was not stored either.
    let summary = lab.json(&["summary", "--box", &id, "--json"]);
    assert_eq!(summary["summary"]["emptyCount"], 81);
}
