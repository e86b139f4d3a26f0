//! Engram CLI: read-only inspection of an associative memory database.
//!
//! Usage:
//!   engram [--db path] [--config file] [-v] <command>

use clap::{Parser, Subcommand};
use engram::{ElementId, MemoryConfig, MemoryStore, OpenStore, SqliteStore};
use serde::Serialize;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "engram",
    version,
    about = "Inspect an associative memory graph"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// YAML configuration file (thresholds for traversal defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one element
    Show {
        id: ElementId,
    },
    /// List the most recently created elements
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List associations touching an element
    Associations {
        id: ElementId,
    },
    /// Enumerate simple paths between two elements
    Paths {
        source: ElementId,
        target: ElementId,
        #[arg(long, default_value_t = 3)]
        max_depth: usize,
        #[arg(long, default_value_t = 0.0)]
        min_strength: f32,
    },
    /// Detect cycles through an element
    Cycles {
        id: ElementId,
        #[arg(long, default_value_t = 4)]
        max_depth: usize,
    },
    /// Elements reachable in either direction, with their depth
    Connected {
        id: ElementId,
        /// Defaults to the enrichment depth from the configuration
        #[arg(long)]
        max_depth: Option<usize>,
        /// Defaults to the enrichment strength from the configuration
        #[arg(long)]
        min_strength: Option<f32>,
    },
    /// Show the access statistics of an element
    Access {
        id: ElementId,
    },
    /// List pending merge candidates
    Candidates,
}

/// Get the default database path (~/.local/share/engram/engram.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let engram_dir = data_dir.join("engram");
    std::fs::create_dir_all(&engram_dir).ok();
    engram_dir.join("engram.db")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<MemoryConfig, String> {
    let config = match path {
        Some(path) => MemoryConfig::load(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => MemoryConfig::default(),
    };
    config.validate().map_err(|e| format!("Invalid config: {}", e))?;
    Ok(config)
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    tracing::debug!(path = %db_path.display(), "opening database");
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

/// Print a value as pretty JSON, or the error that produced it
fn emit<T: Serialize, E: std::fmt::Display>(result: Result<T, E>) -> i32 {
    let value = match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match serde_json::to_string_pretty(&value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_connected(
    store: &SqliteStore,
    config: &MemoryConfig,
    id: &ElementId,
    max_depth: Option<usize>,
    min_strength: Option<f32>,
) -> i32 {
    let max_depth = max_depth.unwrap_or(config.enrichment.max_depth);
    let min_strength = min_strength.unwrap_or(config.enrichment.min_strength);
    if !(0.0..=1.0).contains(&min_strength) {
        eprintln!("Error: min strength {} outside [0, 1]", min_strength);
        return 1;
    }
    emit(store.get_connected_elements(id, max_depth, min_strength))
}

fn cmd_access(store: &SqliteStore, id: &ElementId) -> i32 {
    emit(store.get_access_pattern(id).map(|pattern| {
        serde_json::json!({
            "success_rate": pattern.success_rate(),
            "pattern": pattern,
        })
    }))
}

fn cmd_candidates(store: &SqliteStore) -> i32 {
    let candidates = match store.list_merge_candidates() {
        Ok(candidates) => candidates,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if candidates.is_empty() {
        println!("No merge candidates.");
        return 0;
    }
    emit(Ok::<_, String>(candidates))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let store = match open_store(cli.db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Show { id } => emit(store.get_element(&id)),
        Commands::Recent { limit } => emit(store.get_recent_elements(limit)),
        Commands::Associations { id } => emit(store.associations_for(&id)),
        Commands::Paths {
            source,
            target,
            max_depth,
            min_strength,
        } => emit(store.find_paths(&source, &target, max_depth, min_strength)),
        Commands::Cycles { id, max_depth } => emit(store.detect_cycles(&id, max_depth)),
        Commands::Connected {
            id,
            max_depth,
            min_strength,
        } => cmd_connected(&store, &config, &id, max_depth, min_strength),
        Commands::Access { id } => cmd_access(&store, &id),
        Commands::Candidates => cmd_candidates(&store),
    };
    std::process::exit(code);
}
