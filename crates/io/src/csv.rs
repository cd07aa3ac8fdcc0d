// CSV/TSV export and import of the flat cell table

use std::path::Path;

use chrono::NaiveDate;

use cryobank_engine::cell::{Cell, CellStatus, CellType};

/// Column headers of the cell table, in display order.
pub const TABLE_HEADERS: [&str; 16] = [
    "id",
    "position",
    "row",
    "col",
    "name",
    "status",
    "type",
    "cell_count",
    "sample_count",
    "keywords",
    "freeze_date",
    "expiry_date",
    "owner",
    "reserved_by",
    "reserved_for",
    "comment",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One table row. Absent values render as `placeholder`.
pub fn table_record(cell: &Cell, placeholder: &str) -> Vec<String> {
    let text = |v: &Option<String>| match v.as_deref() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => placeholder.to_string(),
    };
    let date = |d: Option<NaiveDate>| d.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_else(|| placeholder.to_string());
    let count = |n: u32| if cell.is_full() { n.to_string() } else { placeholder.to_string() };

    vec![
        cell.id.clone(),
        cell.position.to_string(),
        cell.row.to_string(),
        cell.col.to_string(),
        text(&cell.name),
        cell.status.to_string(),
        cell.cell_type.map(|t| t.to_string()).unwrap_or_else(|| placeholder.to_string()),
        count(cell.cell_count),
        count(cell.sample_count),
        if cell.keywords.trim().is_empty() { placeholder.to_string() } else { cell.keywords.clone() },
        date(cell.freeze_date),
        date(cell.expiry_date),
        text(&cell.owner),
        text(&cell.reserved_by),
        text(&cell.reserved_for),
        text(&cell.comment),
    ]
}

pub fn export<'a>(cells: impl IntoIterator<Item = &'a Cell>, path: &Path) -> Result<(), String> {
    export_with_delimiter(cells, path, b',')
}

pub fn export_tsv<'a>(cells: impl IntoIterator<Item = &'a Cell>, path: &Path) -> Result<(), String> {
    export_with_delimiter(cells, path, b'\t')
}

fn export_with_delimiter<'a>(
    cells: impl IntoIterator<Item = &'a Cell>,
    path: &Path,
    delimiter: u8,
) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    writer.write_record(TABLE_HEADERS).map_err(|e| e.to_string())?;
    for cell in cells {
        writer.write_record(table_record(cell, "")).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}

/// Read cells back from an exported table. The delimiter is sniffed; only
/// `row`, `col` and `status` are required columns.
pub fn import(path: &Path) -> Result<Vec<Cell>, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    import_from_string(&content, sniff_delimiter(&content))
}

/// Detect the most likely field delimiter from the header line.
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    [b'\t', b';', b',']
        .into_iter()
        .max_by_key(|&d| header.bytes().filter(|&b| b == d).count())
        .filter(|&d| header.as_bytes().contains(&d))
        .unwrap_or(b',')
}

fn import_from_string(content: &str, delimiter: u8) -> Result<Vec<Cell>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let (Some(row_idx), Some(col_idx), Some(status_idx)) = (column("row"), column("col"), column("status")) else {
        return Err("CSV needs row, col and status columns".to_string());
    };
    let optional: Vec<Option<usize>> = TABLE_HEADERS.iter().map(|h| column(h)).collect();

    let mut cells = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let line = line + 2;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::trim).filter(|s| !s.is_empty());
        let number = |idx: Option<usize>, what: &str| -> Result<u32, String> {
            field(idx)
                .map(|s| s.parse::<u32>().map_err(|_| format!("line {line}: invalid {what} '{s}'")))
                .transpose()
                .map(|n| n.unwrap_or(0))
        };
        let date = |idx: Option<usize>| -> Result<Option<NaiveDate>, String> {
            field(idx)
                .map(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| format!("line {line}: invalid date '{s}'")))
                .transpose()
        };
        let text = |idx: Option<usize>| field(idx).map(String::from);

        let status: CellStatus = field(Some(status_idx))
            .unwrap_or("")
            .parse()
            .map_err(|e| format!("line {line}: {e}"))?;
        let cell_type = field(optional[6])
            .map(|s| s.parse::<CellType>())
            .transpose()
            .map_err(|e| format!("line {line}: {e}"))?;
        let row = number(Some(row_idx), "row")?;
        let col = number(Some(col_idx), "col")?;

        let mut cell = Cell::empty(text(optional[0]).unwrap_or_default(), row, col, 0);
        cell.name = text(optional[4]);
        cell.status = status;
        cell.cell_type = cell_type;
        cell.cell_count = number(optional[7], "cell_count")?;
        cell.sample_count = number(optional[8], "sample_count")?;
        cell.keywords = text(optional[9]).unwrap_or_default();
        cell.freeze_date = date(optional[10])?;
        cell.expiry_date = date(optional[11])?;
        cell.owner = text(optional[12]);
        cell.reserved_by = text(optional[13]);
        cell.reserved_for = text(optional[14]);
        cell.comment = text(optional[15]);
        cells.push(cell);
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use cryobank_engine::grid::{build_grid, RandomOccupancy};

    fn full_cell() -> Cell {
        let mut cell = Cell::empty("900012345678", 2, 3, 12);
        cell.status = CellStatus::Full;
        cell.cell_type = Some(CellType::Pbmc);
        cell.cell_count = 71;
        cell.sample_count = 3;
        cell.keywords = "COVID-19, Oncologie".into();
        cell.freeze_date = NaiveDate::from_ymd_opt(2024, 4, 16);
        cell
    }

    #[test]
    fn test_table_record_placeholders() {
        let record = table_record(&Cell::empty("900001", 1, 1, 1), "—");
        assert_eq!(record.len(), TABLE_HEADERS.len());
        assert_eq!(record[5], "empty");
        assert_eq!(record[6], "—");
        assert_eq!(record[7], "—");
        assert_eq!(record[12], "—");

        let record = table_record(&full_cell(), "—");
        assert_eq!(record[6], "PBMC");
        assert_eq!(record[7], "71");
        assert_eq!(record[10], "2024-04-16");
    }

    #[test]
    fn test_csv_export_quotes_keywords() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        export(&[full_cell()], &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(TABLE_HEADERS.join(",").as_str()));
        assert!(lines.next().unwrap().contains("\"COVID-19, Oncologie\""));
    }

    #[test]
    fn test_export_then_import_keeps_occupancy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.tsv");
        let grid = build_grid(6, 6, &mut RandomOccupancy::seeded(4)).unwrap();
        export_tsv(grid.cells(), &path).unwrap();

        let cells = import(&path).unwrap();
        assert_eq!(cells.len(), 36);
        for (a, b) in cells.iter().zip(grid.cells()) {
            assert_eq!((a.row, a.col, a.status), (b.row, b.col, b.status));
            assert_eq!(a.cell_type, b.cell_type);
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn test_import_reports_line() {
        let content = "row;col;status\n1;1;full\n1;x;empty\n";
        let err = import_from_string(content, sniff_delimiter(content)).unwrap_err();
        assert!(err.starts_with("line 3"), "{err}");

        let err = import_from_string("id,status\nA,full\n", b',').unwrap_err();
        assert!(err.contains("row, col and status"));
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("row\tcol\tstatus\n"), b'\t');
        assert_eq!(sniff_delimiter("row;col;status\n"), b';');
        assert_eq!(sniff_delimiter("row,col,status\n"), b',');
        assert_eq!(sniff_delimiter("single\n"), b',');
    }
}
