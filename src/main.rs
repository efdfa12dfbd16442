use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use symdex::index::location::{FileId, Location};
use symdex::index::stats::{list_indexes, show_stats};
use symdex::index::{IndexSet, merge_fact_files};
use symdex::utils::{
    AppConfig, HostAddress, RootMode, decode_path, encode_path, find_project_root, get_index_dir,
    remove_index, symbol_at,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "symdex")]
#[command(about = "Incrementally maintained symbol and cross-reference index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the project root owning a path
    Root {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Look for a build tree instead of a source tree
        #[arg(short, long)]
        build: bool,
    },
    /// Encode a path into an index directory name
    Encode { path: PathBuf },
    /// Decode an index directory name back into a path
    Decode { name: String },
    /// Merge analysis facts (JSON) into the project index
    Merge {
        /// Any path inside the project
        path: PathBuf,

        /// Fact files, one per translation unit
        #[arg(required = true)]
        facts: Vec<PathBuf>,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Invalidate everything derived from the given files
    Dirty {
        path: PathBuf,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Find symbols by name
    Symbol { path: PathBuf, name: String },
    /// Show references to and targets of a location (`file:line:col`)
    Refs { path: PathBuf, location: String },
    /// Show index statistics
    Stats {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List all indexed projects
    List,
    /// Remove an index
    Remove { path: PathBuf },
    /// Parse a daemon address
    Host { address: String },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SYMDEX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Root { path, build } => {
            let mode = if build {
                RootMode::BuildRoot
            } else {
                config.default_root_mode
            };
            println!("{}", find_project_root(&path, mode).display());
        }
        Commands::Encode { path } => {
            println!("{}", encode_path(&path)?);
        }
        Commands::Decode { name } => {
            println!("{}", decode_path(&name).display());
        }
        Commands::Merge { path, facts, quiet } => {
            let mut index = open_index(&path, &config, true)?;
            let summary = merge_fact_files(&mut index, &facts, config.parallel_prune, quiet)?;
            println!(
                "Merged {} units: {} symbols, {} references ({} files invalidated)",
                summary.units, summary.merged.symbols, summary.merged.references, summary.dirty.files
            );
            if summary.merged.skipped > 0 {
                println!("Skipped {} facts outside their unit", summary.merged.skipped);
            }
            if !summary.dirty.stale.is_empty() {
                println!(
                    "{} files lost their facts and need re-analysis:",
                    summary.dirty.stale.len()
                );
                for path in &summary.dirty.stale {
                    println!("  {}", path);
                }
            }
        }
        Commands::Dirty { path, files } => {
            let mut index = open_index(&path, &config, false)?;
            let ids: Vec<FileId> = files
                .iter()
                .filter_map(|file| lookup_file(&index, file))
                .collect();
            if ids.is_empty() {
                println!("No indexed files given.");
                return Ok(());
            }

            let report = index.dirty_with(&ids, config.parallel_prune)?;
            index.commit().context("Failed to commit index")?;
            println!("Invalidated {} files:", report.files.len());
            for (label, counts) in [
                ("symbols", report.symbols),
                ("names", report.symbol_names),
                ("references", report.references),
                ("targets", report.targets),
                ("usrs", report.usrs),
            ] {
                println!(
                    "  {:12} {} removed, {} updated",
                    label, counts.removed, counts.updated
                );
            }
        }
        Commands::Symbol { path, name } => {
            let index = open_index(&path, &config, false)?;
            let hits = index.symbols_by_name(&name)?;
            if hits.is_empty() {
                println!("No symbols named '{}'", name);
            }
            for (loc, info) in hits {
                println!(
                    "{} {:?} {}",
                    display_location(&index, loc)?,
                    info.kind,
                    info.symbol_name
                );
            }
        }
        Commands::Refs { path, location } => {
            let index = open_index(&path, &config, false)?;
            let loc = parse_location(&index, &location)?;

            let loc = match index.find_symbol(loc)? {
                Some((key, info)) => {
                    println!("{} {}", display_location(&index, key)?, info.symbol_name);
                    key
                }
                None => {
                    if let Some(name) = word_at(&index, loc) {
                        println!("No indexed symbol at cursor ('{}')", name);
                    }
                    loc
                }
            };

            for (target, kind) in index.targets_of(&loc)? {
                println!("  -> {} ({:?})", display_location(&index, target)?, kind);
            }
            for referrer in index.references_to(&loc)? {
                println!("  <- {}", display_location(&index, referrer)?);
            }
        }
        Commands::Stats { path } => {
            let index = open_index(&path, &config, false)?;
            show_stats(&index)?;
        }
        Commands::List => {
            list_indexes()?;
        }
        Commands::Remove { path } => {
            let root = find_project_root(&path, config.default_root_mode);
            if remove_index(&root)? {
                println!("Removed index for: {}", root.display());
            } else {
                println!("No index for: {}", root.display());
            }
        }
        Commands::Host { address } => {
            let address = HostAddress::parse(&address)?;
            println!("{}", address);
        }
    }

    Ok(())
}

fn open_index(path: &Path, config: &AppConfig, create: bool) -> Result<IndexSet> {
    let root = find_project_root(path, config.default_root_mode);
    let dir = get_index_dir(&root)?;
    if !create && !IndexSet::exists(&dir) {
        bail!(
            "No index found for {}. Run 'symdex merge' first.",
            root.display()
        );
    }
    IndexSet::open(&dir, &root).with_context(|| format!("Failed to open index for {}", root.display()))
}

/// Id of `file` as given, or of its canonical form
fn lookup_file(index: &IndexSet, file: &Path) -> Option<FileId> {
    index.files().id_for(file).or_else(|| {
        let canonical = file.canonicalize().ok()?;
        index.files().id_for(&canonical)
    })
}

/// `file:line:col` where `file` is a path or a numeric file id
fn parse_location(index: &IndexSet, text: &str) -> Result<Location> {
    if let Ok(loc) = text.parse::<Location>() {
        return Ok(loc);
    }
    let mut parts = text.rsplitn(3, ':');
    let (Some(column), Some(line), Some(file)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Expected file:line:col, got '{}'", text);
    };
    let line: u32 = line.parse().with_context(|| format!("Bad line in '{}'", text))?;
    let column: u32 = column.parse().with_context(|| format!("Bad column in '{}'", text))?;
    let Some(file_id) = lookup_file(index, Path::new(file)) else {
        bail!("File not indexed: {}", file);
    };
    Ok(Location::new(file_id, line, column))
}

fn display_location(index: &IndexSet, loc: Location) -> Result<String> {
    Ok(match index.files().path(loc.file_id)? {
        Some(path) => format!("{}:{}:{}", path, loc.line, loc.column),
        None => loc.to_string(),
    })
}

/// Identifier under `loc` in the file on disk
fn word_at(index: &IndexSet, loc: Location) -> Option<String> {
    let path = index.files().path(loc.file_id).ok()??;
    let content = std::fs::read_to_string(path).ok()?;
    let line = content.lines().nth((loc.line as usize).checked_sub(1)?)?;
    symbol_at(line, loc.column).map(str::to_string)
}
