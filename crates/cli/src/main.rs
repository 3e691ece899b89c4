// casework CLI - identity deduplication over a local casework store

mod exit_codes;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use casework_config::Settings;
use casework_dedup::{run, DedupConfig, DedupError, DedupReport, RunOptions};
use casework_store::{RecordStore, Row, SqliteStore, StoreError};

use exit_codes::{dedup_exit_code, EXIT_ERROR, EXIT_RUN_ISSUES, EXIT_STORE_OPEN, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "casework")]
#[command(about = "Merge duplicate person records and collapse duplicate child rows")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge duplicate persons, then remove duplicate child rows
    #[command(after_help = "\
Examples:
  casework run --db casework.db
  casework run --db casework.db --workers 4 --json --output report.json
  casework run --strict          # exit 4 if any operation failed")]
    Run(RunArgs),

    /// Show what `run` would merge and remove, without writing
    Plan(StoreArgs),

    /// Check an engine config file and print the effective config
    Validate {
        /// Engine config (TOML); built-in defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create the casework tables in a SQLite database
    #[command(after_help = "\
Examples:
  casework init --db /srv/casework.db
  casework init --db /srv/casework.db --remember   # later commands can omit --db")]
    Init {
        #[arg(long)]
        db: Option<PathBuf>,

        /// Save the database path as store.path in the settings file
        #[arg(long)]
        remember: bool,
    },

    /// Upsert a JSON snapshot ({ "table": [rows] }) into the store
    Import {
        /// Snapshot file
        snapshot: PathBuf,

        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// SQLite database (defaults to store.path in settings)
    #[arg(long, env = "CASEWORK_DB")]
    db: Option<PathBuf>,

    /// Engine config (TOML; defaults to dedup.config in settings)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads for the merge phase
    #[arg(long)]
    workers: Option<usize>,

    /// Print the full report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write the JSON report to a file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Plan only, issue no writes
    #[arg(long)]
    dry_run: bool,

    /// Exit 4 when the run recorded any failed operation
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load();
    init_logging(&settings.log.filter);

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: casework <command> [options]");
            eprintln!("       casework --help for more information");
            Ok(())
        }
        Some(Commands::Run(args)) => cmd_run(&settings, args.store, args.dry_run, args.strict),
        Some(Commands::Plan(args)) => cmd_run(&settings, args, true, false),
        Some(Commands::Validate { config }) => cmd_validate(&settings, config),
        Some(Commands::Init { db, remember }) => cmd_init(&settings, db, remember),
        Some(Commands::Import { snapshot, db }) => cmd_import(&settings, snapshot, db),
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

/// `RUST_LOG` wins over the settings filter.
fn init_logging(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn store_open(err: StoreError) -> Self {
        Self { code: EXIT_STORE_OPEN, message: err.to_string(), hint: None }
    }

    pub fn store(err: StoreError) -> Self {
        Self { code: EXIT_ERROR, message: err.to_string(), hint: None }
    }

    pub fn dedup(err: DedupError) -> Self {
        Self { code: dedup_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// shared
// ============================================================================

fn resolve_db(settings: &Settings, flag: Option<PathBuf>) -> Result<PathBuf, CliError> {
    settings.store_path(flag.as_deref()).ok_or_else(|| {
        CliError::args("no store given").with_hint(format!(
            "pass --db or set store.path in {}",
            Settings::config_path().display()
        ))
    })
}

fn open_existing(path: &Path) -> Result<SqliteStore, CliError> {
    if !path.exists() {
        return Err(CliError {
            code: EXIT_STORE_OPEN,
            message: format!("store not found: {}", path.display()),
            hint: Some(format!("create it with: casework init --db {}", path.display())),
        });
    }
    SqliteStore::open(path).map_err(CliError::store_open)
}

fn load_config(settings: &Settings, flag: Option<PathBuf>) -> Result<DedupConfig, CliError> {
    match settings.dedup_config_path(flag.as_deref()) {
        Some(path) => {
            log::info!("engine config: {}", path.display());
            DedupConfig::from_file(&path).map_err(CliError::dedup)
        }
        None => Ok(DedupConfig::default()),
    }
}

// ============================================================================
// run / plan
// ============================================================================

fn cmd_run(settings: &Settings, args: StoreArgs, dry_run: bool, strict: bool) -> Result<(), CliError> {
    let mut config = load_config(settings, args.config)?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate().map_err(CliError::dedup)?;

    let db = resolve_db(settings, args.db)?;
    let store = open_existing(&db)?;

    let report = run(&store, &config, RunOptions { dry_run }).map_err(CliError::dedup)?;

    emit_report(&report, args.json, args.output.as_deref())?;
    for line in report.summary_lines() {
        eprintln!("{line}");
    }

    if strict && report.has_issues() {
        return Err(CliError {
            code: EXIT_RUN_ISSUES,
            message: format!("run recorded {} issue(s)", report.issues.len()),
            hint: Some("fix the store and re-run; finished merges are not repeated".into()),
        });
    }
    Ok(())
}

fn emit_report(report: &DedupReport, json: bool, output: Option<&Path>) -> Result<(), CliError> {
    if !json && output.is_none() {
        return Ok(());
    }
    let text = serde_json::to_string_pretty(report).map_err(|e| CliError::io(e.to_string()))?;
    if json {
        println!("{text}");
    }
    if let Some(path) = output {
        fs::write(path, format!("{text}\n"))
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(settings: &Settings, config: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(settings, config)?;
    let text = config.to_toml().map_err(CliError::dedup)?;
    print!("{text}");
    eprintln!(
        "ok: {} reference(s), {} child table(s)",
        config.references.len(),
        config.child_tables.len()
    );
    Ok(())
}

// ============================================================================
// init / import
// ============================================================================

fn cmd_init(settings: &Settings, db: Option<PathBuf>, remember: bool) -> Result<(), CliError> {
    let db = resolve_db(settings, db)?;
    let store = SqliteStore::open(&db).map_err(CliError::store_open)?;
    store.ensure_schema().map_err(CliError::store)?;
    eprintln!("initialized {}", db.display());

    if remember {
        let absolute = fs::canonicalize(&db)
            .map_err(|e| CliError::io(format!("cannot resolve {}: {e}", db.display())))?;
        let mut updated = settings.clone();
        updated.store.path = Some(absolute);
        let path = Settings::config_path();
        updated
            .save_to(&path)
            .map_err(|e| CliError::io(e.to_string()))?;
        eprintln!("store.path saved to {}", path.display());
    }
    Ok(())
}

fn cmd_import(settings: &Settings, snapshot: PathBuf, db: Option<PathBuf>) -> Result<(), CliError> {
    let text = fs::read_to_string(&snapshot)
        .map_err(|e| CliError::args(format!("cannot read {}: {e}", snapshot.display())))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| CliError::args(format!("{}: {e}", snapshot.display())))?;
    let tables = value
        .as_object()
        .ok_or_else(|| CliError::args("snapshot must be a JSON object of tables"))?;

    let db = resolve_db(settings, db)?;
    let store = open_existing(&db)?;

    for (table, rows) in tables {
        let rows: Vec<Row> = rows
            .as_array()
            .ok_or_else(|| CliError::args(format!("table '{table}' must be an array of rows")))?
            .iter()
            .map(|r| {
                r.as_object()
                    .cloned()
                    .ok_or_else(|| CliError::args(format!("table '{table}': rows must be objects")))
            })
            .collect::<Result<_, _>>()?;
        let n = store.upsert(table, &rows).map_err(CliError::store)?;
        eprintln!("{table}: {n} row(s)");
    }
    Ok(())
}
