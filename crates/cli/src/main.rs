// cryo - sample storage inventory from the command line
//
// Grid, table and summary commands render one box. The box is either a
// stored one (--box ID) or a placeholder grid drawn from random occupancy
// (--rows/--cols/--seed, defaults from settings.json).

mod exit_codes;
mod render;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use cryobank_config::Settings;
use cryobank_engine::cell::{CellStatus, CellType};
use cryobank_engine::error::EngineError;
use cryobank_engine::events::InventoryEvent;
use cryobank_engine::filter::{CellCriteria, FilterState, Tab, TypeFilter};
use cryobank_engine::geometry::{parse_row, row_label, DEFAULT_COLS, DEFAULT_ROWS};
use cryobank_engine::grid::{build_grid, BoxGrid, RandomOccupancy};
use cryobank_engine::inventory::ParentFilter;
use cryobank_engine::reservation::{
    filter_reservations, reservation_stats, ReservationQuery, ReservationStats, ReservationStatus, StatusFilter,
};
use cryobank_engine::stats::{summarize, LevelCounts, Summary};
use cryobank_engine::validation::{BoxForm, CellForm, RackForm, ReservationForm, TankForm};
use cryobank_engine::view::{GridView, ViewMode};
use cryobank_io::seed::seed_demo;
use cryobank_io::{InventoryRepository, RepoError, SqliteRepository};

use exit_codes::{
    EXIT_ERROR, EXIT_INVALID_TRANSITION, EXIT_INVARIANT, EXIT_IO, EXIT_NOT_FOUND, EXIT_SUCCESS, EXIT_USAGE,
    EXIT_VALIDATION,
};

/// Overrides the log level (error, warn, info, debug, trace)
const LOG_ENV: &str = "CRYOBANK_LOG";

/// Seed for `init --demo` when neither --seed nor grid.seed is set
const DEMO_SEED: u64 = 42;

#[derive(Parser)]
#[command(name = "cryo")]
#[command(about = "Sample storage inventory: boxes, cells and reservations")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Inventory database [default: data.databasePath or the platform data dir]
    #[arg(long, global = true, env = "CRYOBANK_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Settings file [default: <config dir>/cryobank/settings.json]
    #[arg(long, global = true, env = "CRYOBANK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the inventory database, optionally filled with a demo lab
    #[command(after_help = "\
Examples:
  cryo init
  cryo init --demo --seed 7")]
    Init {
        /// Seed tanks, racks, boxes and reservations of a sample lab
        #[arg(long)]
        demo: bool,

        /// Occupancy seed for the demo boxes
        #[arg(long, requires = "demo")]
        seed: Option<u64>,
    },

    /// Show a box as a spatial grid
    #[command(after_help = "\
Examples:
  cryo grid --box 3
  cryo grid --box 3 --tab reserved
  cryo grid --rows 6 --cols 8 --seed 1 --type PBMC")]
    Grid {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print the filtered view as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the cells of a box that match the filters
    #[command(after_help = "\
Examples:
  cryo table --box 3 --tab full --owner martin
  cryo table --box 3 --csv box3.csv")]
    Table {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print the filtered view as JSON
        #[arg(long, conflicts_with_all = ["csv", "tsv"])]
        json: bool,

        /// Write the filtered cells to a CSV file instead of printing them
        #[arg(long, value_name = "PATH", conflicts_with = "tsv")]
        csv: Option<PathBuf>,

        /// Write the filtered cells to a TSV file instead of printing them
        #[arg(long, value_name = "PATH")]
        tsv: Option<PathBuf>,
    },

    /// Count full, reserved and empty cells of a box
    Summary {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        json: bool,
    },

    /// Show the cell at a slot
    #[command(after_help = "\
Examples:
  cryo locate C 4 --box 3
  cryo locate 3 4 --rows 9 --cols 9 --seed 1")]
    Locate {
        /// Row letter (A, B, ...) or 1-based number
        #[arg(value_parser = parse_row_arg)]
        row: u32,

        /// 1-based column
        col: u32,

        #[command(flatten)]
        source: SourceArgs,

        #[arg(long)]
        json: bool,
    },

    /// Store, modify, remove, reserve or release a sample slot
    #[command(subcommand)]
    Cell(CellCommands),

    /// Load occupied cells from a CSV/TSV table into an empty part of a box
    Import {
        /// Table with at least row, col and status columns
        file: PathBuf,

        #[arg(long = "box", value_name = "ID")]
        box_id: i64,
    },

    /// List tanks with rack count and occupancy
    Tanks {
        /// Name or location contains (case-insensitive)
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long)]
        json: bool,
    },

    /// List racks with box count and occupancy
    Racks {
        /// Name or tank name contains (case-insensitive)
        #[arg(long, default_value = "")]
        search: String,

        /// Only racks in this tank (by name)
        #[arg(long, value_name = "NAME", default_value = "all")]
        tank: String,

        #[arg(long)]
        json: bool,
    },

    /// List boxes with size and occupancy
    Boxes {
        /// Name or rack name contains (case-insensitive)
        #[arg(long, default_value = "")]
        search: String,

        /// Only boxes in this rack (by name)
        #[arg(long, value_name = "NAME", default_value = "all")]
        rack: String,

        #[arg(long)]
        json: bool,
    },

    /// Inventory-wide overview: container counts, cell breakdown, reservations
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Add a tank, rack or box
    #[command(subcommand)]
    Create(CreateCommands),

    /// List reservations
    #[command(after_help = "\
Examples:
  cryo reservations --status active
  cryo reservations --search martin")]
    Reservations {
        /// Id, cell, requester or purpose contains (case-insensitive)
        #[arg(long, default_value = "")]
        search: String,

        /// all, pending, active, completed or cancelled
        #[arg(long, default_value = "all", value_parser = parse_keyword::<StatusFilter>)]
        status: StatusFilter,

        #[arg(long)]
        json: bool,
    },

    /// Move a reservation through its lifecycle
    #[command(subcommand)]
    Reservation(ReservationCommands),
}

/// Which box to render.
#[derive(Args)]
struct SourceArgs {
    /// Stored box id
    #[arg(long = "box", value_name = "ID", conflicts_with_all = ["rows", "cols", "seed"])]
    box_id: Option<i64>,

    /// Rows of a placeholder grid [default: grid.defaultRows]
    #[arg(long)]
    rows: Option<u32>,

    /// Columns of a placeholder grid [default: grid.defaultCols]
    #[arg(long)]
    cols: Option<u32>,

    /// Occupancy seed of a placeholder grid [default: grid.seed]
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct FilterArgs {
    /// all, empty, reserved or full
    #[arg(long, default_value = "all", value_parser = parse_keyword::<Tab>)]
    tab: Tab,

    /// Identifier contains (case-sensitive)
    #[arg(long = "id", value_name = "TEXT")]
    identifier: Option<String>,

    /// all, LB or PBMC
    #[arg(long = "type", value_name = "TYPE", default_value = "all", value_parser = parse_keyword::<TypeFilter>)]
    cell_type: TypeFilter,

    /// Owner contains (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    owner: Option<String>,
}

impl FilterArgs {
    fn state(&self) -> FilterState {
        FilterState::new(
            self.tab,
            CellCriteria::new(self.identifier.clone(), self.cell_type, self.owner.clone()),
        )
    }
}

#[derive(Args)]
struct SlotArgs {
    #[arg(long = "box", value_name = "ID")]
    box_id: i64,

    /// Row letter (A, B, ...) or 1-based number
    #[arg(long, value_parser = parse_row_arg)]
    row: u32,

    /// 1-based column
    #[arg(long)]
    col: u32,
}

#[derive(Args)]
struct CellArgs {
    /// Sample identifier
    #[arg(long = "id", value_name = "ID")]
    identifier: String,

    #[arg(long)]
    name: Option<String>,

    /// LB or PBMC
    #[arg(long = "type", value_name = "TYPE", value_parser = parse_keyword::<CellType>)]
    cell_type: Option<CellType>,

    /// Millions of cells
    #[arg(long = "cells", default_value_t = 1)]
    cell_count: u32,

    /// Samples per patient
    #[arg(long = "samples", default_value_t = 0)]
    sample_count: u32,

    /// Comma-separated
    #[arg(long, default_value = "")]
    keywords: String,

    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    frozen: Option<NaiveDate>,

    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    expires: Option<NaiveDate>,

    #[arg(long)]
    owner: Option<String>,

    #[arg(long)]
    comment: Option<String>,
}

impl CellArgs {
    fn form(&self) -> CellForm {
        CellForm {
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            cell_type: self.cell_type,
            cell_count: self.cell_count,
            sample_count: self.sample_count,
            keywords: self.keywords.clone(),
            freeze_date: self.frozen,
            expiry_date: self.expires,
            owner: self.owner.clone(),
            comment: self.comment.clone(),
        }
    }
}

#[derive(Subcommand)]
enum CellCommands {
    /// Store a sample in an empty or reserved slot
    Add {
        #[command(flatten)]
        slot: SlotArgs,

        #[command(flatten)]
        cell: CellArgs,
    },

    /// Modify the sample in a full slot
    Update {
        #[command(flatten)]
        slot: SlotArgs,

        #[command(flatten)]
        cell: CellArgs,
    },

    /// Remove the sample from a full slot
    Delete {
        #[command(flatten)]
        slot: SlotArgs,
    },

    /// Reserve an empty slot
    #[command(after_help = "\
Examples:
  cryo cell reserve --box 3 --row B --col 4 --cell-id CELL-B4 --by 'Dr. Martin' --for 'Projet Alpha'")]
    Reserve {
        #[command(flatten)]
        slot: SlotArgs,

        /// Identifier the reserved slot will carry
        #[arg(long = "cell-id", value_name = "ID")]
        cell_id: String,

        /// Requester
        #[arg(long)]
        by: String,

        /// Purpose
        #[arg(long = "for", value_name = "PURPOSE", default_value = "")]
        purpose: String,

        /// [default: today]
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        start: Option<NaiveDate>,

        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// pending or active
        #[arg(long, default_value = "pending", value_parser = parse_keyword::<ReservationStatus>)]
        status: ReservationStatus,

        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Release the reservation on a slot
    Release {
        #[command(flatten)]
        slot: SlotArgs,
    },
}

#[derive(Subcommand)]
enum CreateCommands {
    Tank {
        #[arg(long)]
        name: String,

        #[arg(long)]
        location: String,

        /// Number of racks it holds
        #[arg(long)]
        capacity: Option<u32>,

        #[arg(long)]
        description: Option<String>,
    },

    Rack {
        #[arg(long)]
        name: String,

        /// Parent tank id
        #[arg(long, value_name = "ID")]
        tank: Option<i64>,

        /// Number of boxes it holds
        #[arg(long)]
        capacity: Option<u32>,

        #[arg(long)]
        description: Option<String>,
    },

    Box {
        #[arg(long)]
        name: String,

        /// Parent rack id
        #[arg(long, value_name = "ID")]
        rack: Option<i64>,

        #[arg(long, default_value_t = DEFAULT_ROWS)]
        rows: u32,

        #[arg(long, default_value_t = DEFAULT_COLS)]
        cols: u32,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum ReservationCommands {
    /// Set the status of a reservation (closing one releases its slot)
    Status {
        /// Reservation id, e.g. RES-002
        id: String,

        /// pending, active, completed or cancelled
        #[arg(value_parser = parse_keyword::<ReservationStatus>)]
        status: ReservationStatus,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = Context::load(&cli);

    let result = match cli.command {
        Commands::Init { demo, seed } => cmd_init(&ctx, demo, seed),
        Commands::Grid { source, filter, json } => cmd_grid(&ctx, &source, &filter, json),
        Commands::Table { source, filter, json, csv, tsv } => {
            cmd_table(&ctx, &source, &filter, json, csv.as_deref(), tsv.as_deref())
        }
        Commands::Summary { source, filter, json } => cmd_summary(&ctx, &source, &filter, json),
        Commands::Locate { row, col, source, json } => cmd_locate(&ctx, row, col, &source, json),
        Commands::Cell(cell_cmd) => cmd_cell(&ctx, cell_cmd),
        Commands::Import { file, box_id } => cmd_import(&ctx, &file, box_id),
        Commands::Tanks { search, json } => cmd_tanks(&ctx, &search, json),
        Commands::Racks { search, tank, json } => cmd_racks(&ctx, &search, &tank, json),
        Commands::Boxes { search, rack, json } => cmd_boxes(&ctx, &search, &rack, json),
        Commands::Stats { json } => cmd_stats(&ctx, json),
        Commands::Create(create_cmd) => cmd_create(&ctx, create_cmd),
        Commands::Reservations { search, status, json } => cmd_reservations(&ctx, search, status, json),
        Commands::Reservation(ReservationCommands::Status { id, status }) => {
            cmd_reservation_status(&ctx, &id, status)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  cryobank-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  cryobank-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

/// Diagnostics go to stderr so stdout stays parseable. Library crates log
/// through `log`; the subscriber picks those records up.
fn init_logging(verbose: bool) {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|v| v.parse::<tracing::Level>().ok())
        .unwrap_or(if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN });
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::InvalidGeometry { .. } => {
                Self::new(EXIT_VALIDATION, message).with_hint("rows and cols must both be at least 1")
            }
            EngineError::Validation(_) => Self::new(EXIT_VALIDATION, message),
            EngineError::OutOfRange { rows, cols, .. } => Self::new(EXIT_NOT_FOUND, message)
                .with_hint(format!("rows run A..{}, columns 1..{}", row_label(rows), cols)),
            EngineError::WrongStatus { expected, .. } => {
                let err = Self::new(EXIT_INVALID_TRANSITION, message);
                match expected {
                    CellStatus::Full => {
                        err.with_hint("store a sample first with `cryo cell add`")
                    }
                    CellStatus::Reserved => {
                        err.with_hint("only reserved slots can be released")
                    }
                    CellStatus::Empty => err,
                }
            }
            EngineError::InvalidTransition { .. } | EngineError::InvalidReservationTransition { .. } => {
                Self::new(EXIT_INVALID_TRANSITION, message)
            }
            EngineError::CoordinateMiss { .. } => Self::new(EXIT_INVARIANT, message),
            EngineError::Parse { .. } => Self::new(EXIT_USAGE, message),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(e: RepoError) -> Self {
        let message = e.to_string();
        match e {
            RepoError::NotFound { entity, .. } => {
                let err = Self::new(EXIT_NOT_FOUND, message);
                match entity {
                    "box" => err.with_hint("list boxes with `cryo boxes`"),
                    "rack" => err.with_hint("list racks with `cryo racks`"),
                    "tank" => err.with_hint("list tanks with `cryo tanks`"),
                    "reservation" => err.with_hint("list reservations with `cryo reservations`"),
                    _ => err,
                }
            }
            RepoError::Conflict(_) => Self::new(EXIT_INVALID_TRANSITION, message),
            RepoError::Engine(e) => e.into(),
            RepoError::Storage(_) => Self::io(message),
        }
    }
}

// ============================================================================
// Context
// ============================================================================

struct Context {
    settings: Settings,
    db_path: PathBuf,
}

impl Context {
    fn load(cli: &Cli) -> Self {
        let settings = match &cli.config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        };
        let db_path = cli.db.clone().unwrap_or_else(|| settings.effective_database_path());
        log::debug!("database: {}", db_path.display());
        Self { settings, db_path }
    }

    fn open(&self) -> Result<SqliteRepository, CliError> {
        SqliteRepository::open(&self.db_path).map_err(|e| {
            CliError::from(e).with_hint(format!("check --db or data.databasePath ({})", self.db_path.display()))
        })
    }

    /// Repository that prints a notice line for every change it makes.
    fn open_for_edit(&self) -> Result<SqliteRepository, CliError> {
        let mut repo = self.open()?;
        repo.set_event_callback(Some(Box::new(|event: InventoryEvent| println!("{}", event.notice()))));
        Ok(repo)
    }

    fn style(&self) -> render::Style {
        render::Style {
            placeholder: self.settings.placeholder.clone(),
            color: self.settings.color && std::io::stdout().is_terminal(),
        }
    }

    /// The box to render, with a title line.
    fn load_grid(&self, source: &SourceArgs) -> Result<(String, BoxGrid), CliError> {
        if let Some(box_id) = source.box_id {
            let repo = self.open()?;
            let storage_box = repo.get_box(box_id)?;
            let title = repo
                .load_inventory()?
                .location_of(box_id)
                .unwrap_or_else(|| storage_box.name.clone());
            let grid = repo.box_grid(box_id)?;
            return Ok((format!("{} (box {})", title, box_id), grid));
        }

        let rows = source.rows.unwrap_or(self.settings.default_rows);
        let cols = source.cols.unwrap_or(self.settings.default_cols);
        let mut occupancy = match source.seed.or(self.settings.seed) {
            Some(seed) => RandomOccupancy::seeded(seed),
            None => RandomOccupancy::from_entropy(),
        };
        let grid = build_grid(rows, cols, &mut occupancy)?;
        Ok((format!("Placeholder box {}x{}", rows, cols), grid))
    }
}

// ============================================================================
// Argument parsers
// ============================================================================

fn parse_keyword<T: FromStr<Err = EngineError>>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|e| e.to_string())
}

fn parse_row_arg(s: &str) -> Result<u32, String> {
    parse_row(s).ok_or_else(|| format!("invalid row '{}': use a letter (A, B, ...) or a number from 1", s))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD", s))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = cryobank_io::json::to_string(value).map_err(|e| CliError::new(EXIT_ERROR, e))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// Commands: database
// ============================================================================

fn cmd_init(ctx: &Context, demo: bool, seed: Option<u64>) -> Result<(), CliError> {
    let mut repo = ctx.open()?;
    println!("Inventory database: {}", ctx.db_path.display());
    if demo {
        let seed = seed.or(ctx.settings.seed).unwrap_or(DEMO_SEED);
        let report = seed_demo(&mut repo, seed)?;
        println!(
            "Seeded demo lab (seed {}): {} tanks, {} racks, {} boxes, {} occupied cells, {} reservations",
            seed, report.tanks, report.racks, report.boxes, report.cells, report.reservations
        );
    }
    Ok(())
}

// ============================================================================
// Commands: box views
// ============================================================================

fn cmd_grid(ctx: &Context, source: &SourceArgs, filter: &FilterArgs, json: bool) -> Result<(), CliError> {
    let (title, grid) = ctx.load_grid(source)?;
    let view = GridView::new(&grid, filter.state());
    if json {
        return print_json(&view.snapshot(ViewMode::Grid));
    }
    println!("{}", title);
    print!("{}", render::grid(&view, &ctx.style()));
    println!("{}", render::summary_lines(&view));
    Ok(())
}

fn cmd_table(
    ctx: &Context,
    source: &SourceArgs,
    filter: &FilterArgs,
    json: bool,
    csv: Option<&Path>,
    tsv: Option<&Path>,
) -> Result<(), CliError> {
    let (title, grid) = ctx.load_grid(source)?;
    let view = GridView::new(&grid, filter.state());
    let visible = view.visible();

    if let Some(path) = csv {
        cryobank_io::csv::export(visible.iter().copied(), path).map_err(CliError::io)?;
        println!("Exported {} cells to {}", visible.len(), path.display());
        return Ok(());
    }
    if let Some(path) = tsv {
        cryobank_io::csv::export_tsv(visible.iter().copied(), path).map_err(CliError::io)?;
        println!("Exported {} cells to {}", visible.len(), path.display());
        return Ok(());
    }
    if json {
        return print_json(&view.snapshot(ViewMode::Table));
    }

    println!("{}", title);
    print!("{}", render::cell_table(&visible, &ctx.style()));
    println!("{}", render::summary_lines(&view));
    Ok(())
}

fn cmd_summary(ctx: &Context, source: &SourceArgs, filter: &FilterArgs, json: bool) -> Result<(), CliError> {
    let (title, grid) = ctx.load_grid(source)?;
    let view = GridView::new(&grid, filter.state());
    let filtered = summarize(view.visible());

    if json {
        return print_json(&serde_json::json!({
            "summary": view.summary(),
            "filter": view.filter_state(),
            "filtered": filtered,
        }));
    }

    println!("{}", title);
    println!("{}", render::badges(&view.summary()));
    if view.filter_state().is_active() {
        println!("Matching: {}", render::badges(&filtered));
    }
    Ok(())
}

fn cmd_locate(ctx: &Context, row: u32, col: u32, source: &SourceArgs, json: bool) -> Result<(), CliError> {
    let (title, grid) = ctx.load_grid(source)?;
    let cell = grid.cell_at(row, col)?;
    if json {
        return print_json(cell);
    }

    let style = ctx.style();
    let record = cryobank_io::csv::table_record(cell, &style.placeholder);
    println!("{}", title);
    let rows: Vec<Vec<String>> = cryobank_io::csv::TABLE_HEADERS
        .iter()
        .zip(record)
        .map(|(header, value)| vec![header.to_string(), value])
        .collect();
    print!("{}", render::table(&["FIELD", "VALUE"], &rows));
    Ok(())
}

// ============================================================================
// Commands: cells
// ============================================================================

fn cmd_cell(ctx: &Context, command: CellCommands) -> Result<(), CliError> {
    let mut repo = ctx.open_for_edit()?;
    match command {
        CellCommands::Add { slot, cell } => {
            repo.create_cell(slot.box_id, slot.row, slot.col, &cell.form())?;
        }
        CellCommands::Update { slot, cell } => {
            repo.update_cell(slot.box_id, slot.row, slot.col, &cell.form())?;
        }
        CellCommands::Delete { slot } => {
            repo.delete_cell(slot.box_id, slot.row, slot.col)?;
        }
        CellCommands::Reserve { slot, cell_id, by, purpose, start, end, status, comment } => {
            let form = ReservationForm {
                cell_id,
                reserved_by: by,
                reserved_for: purpose,
                start_date: Some(start.unwrap_or_else(|| chrono::Local::now().date_naive())),
                end_date: end,
                status,
                comment,
            };
            repo.reserve_cell(slot.box_id, slot.row, slot.col, &form)?;
        }
        CellCommands::Release { slot } => {
            repo.release_cell(slot.box_id, slot.row, slot.col)?;
        }
    }
    Ok(())
}

fn cmd_import(ctx: &Context, file: &Path, box_id: i64) -> Result<(), CliError> {
    let cells = cryobank_io::csv::import(file)
        .map_err(|e| CliError::new(EXIT_VALIDATION, format!("{}: {}", file.display(), e)))?;
    let mut repo = ctx.open()?;
    let stored = repo.import_cells(box_id, &cells)?;
    println!("Imported {} occupied cells into box {} ({} rows read)", stored, box_id, cells.len());
    Ok(())
}

// ============================================================================
// Commands: containers
// ============================================================================

fn percent(summary: &Summary) -> String {
    format!("{}%", summary.occupancy_percent())
}

fn of_capacity(count: usize, capacity: Option<u32>) -> String {
    match capacity {
        Some(capacity) => format!("{}/{}", count, capacity),
        None => count.to_string(),
    }
}

fn cmd_tanks(ctx: &Context, search: &str, json: bool) -> Result<(), CliError> {
    let repo = ctx.open()?;
    let inventory = repo.load_inventory()?;
    let summaries = repo.box_summaries()?;
    let tanks = inventory.search_tanks(search);
    let rolled: Vec<Summary> = tanks.iter().map(|t| inventory.tank_summary(t.id, &summaries)).collect();

    if json {
        let items: Vec<_> = tanks
            .iter()
            .zip(&rolled)
            .map(|(t, summary)| {
                serde_json::json!({
                    "tank": t,
                    "racks": inventory.racks_in(t.id).count(),
                    "summary": summary,
                    "level": summary.level(),
                })
            })
            .collect();
        return print_json(&items);
    }

    let rows: Vec<Vec<String>> = tanks
        .iter()
        .zip(&rolled)
        .map(|(t, summary)| {
            vec![
                t.id.to_string(),
                t.name.clone(),
                t.location.clone(),
                of_capacity(inventory.racks_in(t.id).count(), t.capacity),
                summary.level().as_str().to_string(),
                percent(summary),
            ]
        })
        .collect();
    println!("{}", render::level_badges(&LevelCounts::tally(rolled.iter().copied())));
    print!("{}", render::table(&["ID", "NAME", "LOCATION", "RACKS", "STATUS", "OCCUPANCY"], &rows));
    Ok(())
}

fn cmd_racks(ctx: &Context, search: &str, tank: &str, json: bool) -> Result<(), CliError> {
    let repo = ctx.open()?;
    let inventory = repo.load_inventory()?;
    let summaries = repo.box_summaries()?;
    let racks = inventory.search_racks(search, &ParentFilter::parse(tank));
    let rolled: Vec<Summary> = racks.iter().map(|r| inventory.rack_summary(r.id, &summaries)).collect();

    if json {
        let items: Vec<_> = racks
            .iter()
            .zip(&rolled)
            .map(|(r, summary)| {
                serde_json::json!({
                    "rack": r,
                    "tank": inventory.tank_name(r.tank_id),
                    "boxes": inventory.boxes_in(r.id).count(),
                    "summary": summary,
                    "level": summary.level(),
                })
            })
            .collect();
        return print_json(&items);
    }

    let rows: Vec<Vec<String>> = racks
        .iter()
        .zip(&rolled)
        .map(|(r, summary)| {
            vec![
                r.id.to_string(),
                r.name.clone(),
                inventory.tank_name(r.tank_id).to_string(),
                of_capacity(inventory.boxes_in(r.id).count(), r.capacity),
                summary.level().as_str().to_string(),
                percent(summary),
            ]
        })
        .collect();
    println!("{}", render::level_badges(&LevelCounts::tally(rolled.iter().copied())));
    print!("{}", render::table(&["ID", "NAME", "TANK", "BOXES", "STATUS", "OCCUPANCY"], &rows));
    Ok(())
}

fn cmd_boxes(ctx: &Context, search: &str, rack: &str, json: bool) -> Result<(), CliError> {
    let repo = ctx.open()?;
    let inventory = repo.load_inventory()?;
    let summaries = repo.box_summaries()?;
    let boxes = inventory.search_boxes(search, &ParentFilter::parse(rack));
    let summary_of = |id: i64| summaries.get(&id).copied().unwrap_or_default();

    if json {
        let items: Vec<_> = boxes
            .iter()
            .map(|b| {
                serde_json::json!({
                    "box": b,
                    "location": inventory.location_of(b.id),
                    "summary": summary_of(b.id),
                    "level": summary_of(b.id).level(),
                })
            })
            .collect();
        return print_json(&items);
    }

    let rows: Vec<Vec<String>> = boxes
        .iter()
        .map(|b| {
            let summary = summary_of(b.id);
            vec![
                b.id.to_string(),
                b.name.clone(),
                inventory.rack_name(b.rack_id).to_string(),
                format!("{}x{}", b.geometry.rows(), b.geometry.cols()),
                summary.level().as_str().to_string(),
                summary.full.to_string(),
                summary.reserved.to_string(),
                summary.empty.to_string(),
                percent(&summary),
            ]
        })
        .collect();
    println!("{}", render::level_badges(&LevelCounts::tally(boxes.iter().map(|b| summary_of(b.id)))));
    print!(
        "{}",
        render::table(&["ID", "NAME", "RACK", "SIZE", "STATUS", "FULL", "RESERVED", "EMPTY", "OCCUPANCY"], &rows)
    );
    Ok(())
}

#[derive(Serialize)]
struct Overview {
    tanks: usize,
    racks: usize,
    boxes: usize,
    /// Every slot of every box
    cells: Summary,
    #[serde(rename = "boxLevels")]
    box_levels: LevelCounts,
    reservations: ReservationStats,
}

fn cmd_stats(ctx: &Context, json: bool) -> Result<(), CliError> {
    let repo = ctx.open()?;
    let inventory = repo.load_inventory()?;
    let summaries = repo.box_summaries()?;
    let overview = Overview {
        tanks: inventory.tanks().len(),
        racks: inventory.racks().len(),
        boxes: inventory.boxes().len(),
        cells: summaries.values().fold(Summary::default(), |acc, s| acc + *s),
        box_levels: LevelCounts::tally(summaries.values().copied()),
        reservations: reservation_stats(&repo.list_reservations()?),
    };

    if json {
        return print_json(&overview);
    }

    let cells = &overview.cells;
    let reservations = &overview.reservations;
    println!(
        "Tanks {}  Racks {}  Boxes {}  Cells {}",
        overview.tanks, overview.racks, overview.boxes, cells.total
    );
    println!("{}", render::badges(cells));
    let rows: Vec<Vec<String>> = [CellStatus::Full, CellStatus::Reserved, CellStatus::Empty]
        .into_iter()
        .map(|status| vec![status.to_string(), cells.count(status).to_string(), format!("{}%", cells.share(status))])
        .collect();
    print!("{}", render::table(&["STATUS", "CELLS", "SHARE"], &rows));
    println!("Boxes: {}", render::level_badges(&overview.box_levels));
    println!(
        "Reservations: Total {}  Active {}  Pending {}  Completed {}",
        reservations.total, reservations.active, reservations.pending, reservations.completed
    );
    Ok(())
}

fn cmd_create(ctx: &Context, command: CreateCommands) -> Result<(), CliError> {
    let mut repo = ctx.open_for_edit()?;
    match command {
        CreateCommands::Tank { name, location, capacity, description } => {
            repo.create_tank(&TankForm { name, location, capacity, description })?;
        }
        CreateCommands::Rack { name, tank, capacity, description } => {
            repo.create_rack(&RackForm { name, tank_id: tank, capacity, description })?;
        }
        CreateCommands::Box { name, rack, rows, cols, description } => {
            repo.create_box(&BoxForm { name, rack_id: rack, rows, cols, description })?;
        }
    }
    Ok(())
}

// ============================================================================
// Commands: reservations
// ============================================================================

fn cmd_reservations(ctx: &Context, search: String, status: StatusFilter, json: bool) -> Result<(), CliError> {
    let repo = ctx.open()?;
    let reservations = repo.list_reservations()?;
    let stats = reservation_stats(&reservations);
    let query = ReservationQuery { search, status };
    let matching = filter_reservations(&reservations, &query);

    if json {
        return print_json(&serde_json::json!({ "stats": stats, "reservations": matching }));
    }

    println!(
        "Total {}  Active {}  Pending {}  Completed {}",
        stats.total, stats.active, stats.pending, stats.completed
    );
    let placeholder = ctx.settings.placeholder.as_str();
    let rows: Vec<Vec<String>> = matching
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.cell_id.clone(),
                r.location.clone(),
                r.reserved_by.clone(),
                r.reserved_for.clone(),
                r.start_date.format("%Y-%m-%d").to_string(),
                r.end_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| placeholder.to_string()),
                r.status.to_string(),
            ]
        })
        .collect();
    if rows.is_empty() {
        println!("No reservations match the current filters.");
        return Ok(());
    }
    print!(
        "{}",
        render::table(&["ID", "CELL", "LOCATION", "BY", "FOR", "START", "END", "STATUS"], &rows)
    );
    Ok(())
}

fn cmd_reservation_status(ctx: &Context, id: &str, status: ReservationStatus) -> Result<(), CliError> {
    let mut repo = ctx.open_for_edit()?;
    repo.set_reservation_status(id, status)?;
    Ok(())
}
