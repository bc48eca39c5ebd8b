use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use xref_indexer::CompileArguments;
use xref_indexer::CompileJob;
use xref_indexer::DumpFrontEnd;
use xref_indexer::IndexerConfig;
use xref_indexer::SymbolIndexer;
use xref_indexer::SymbolQuery;
use xref_indexer::load_compile_commands;
use xref_indexer::normalize_location;

/// Configuration file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "xref.toml";

#[derive(Debug, Parser)]
#[command(name = "xref", version, about = "Cross-reference index for C and C++ sources")]
pub struct XrefCli {
    /// Configuration file (defaults to ./xref.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database directory (overrides the configuration)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: XrefCommand,
}

#[derive(Debug, Subcommand)]
pub enum XrefCommand {
    /// Rebuild the database from a compilation database or explicit files
    Index(IndexArgs),

    /// List translation units whose sources or headers changed since the last index
    Dirty,

    /// Locations recorded for an exact symbol name
    Lookup(LookupArgs),

    /// Reference target of a `file:line:col` location
    Follow(LocationArgs),

    /// Back-references of whatever a `file:line:col` location resolves to
    Refs(LocationArgs),

    /// Fuzzy search over symbol names
    Search(SearchArgs),
}

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// compile_commands.json to read jobs from
    #[arg(short = 'p', long, value_name = "PATH")]
    pub compile_commands: Option<PathBuf>,

    /// Source files indexed with `--arg` arguments instead of a compilation database
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Compiler argument for explicit files (repeatable)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Directory holding `<source>.ast.json` dumps
    #[arg(long, value_name = "PATH")]
    pub ast_dir: Option<PathBuf>,

    /// Maximum files parsed concurrently
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Extra system include directory (repeatable)
    #[arg(long = "system-include", value_name = "DIR")]
    pub system_includes: Vec<PathBuf>,

    /// Ask the compiler for its default include directories
    #[arg(long)]
    pub discover_system_includes: bool,
}

#[derive(Debug, Parser)]
pub struct LookupArgs {
    /// Plain, bare or qualified name (`bar`, `bar(int)`, `Foo::bar`)
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(Debug, Parser)]
pub struct LocationArgs {
    /// Location as `file:line:col`
    #[arg(value_name = "LOCATION")]
    pub location: String,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search query
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

impl XrefCli {
    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        let json = self.json;
        match self.command {
            XrefCommand::Index(args) => run_index(config, args, json).await,
            XrefCommand::Dirty => run_dirty(&config, json),
            XrefCommand::Lookup(args) => run_lookup(&config, args, json),
            XrefCommand::Follow(args) => run_follow(&config, args, json),
            XrefCommand::Refs(args) => run_refs(&config, args, json),
            XrefCommand::Search(args) => run_search(&config, args, json),
        }
    }

    fn load_config(&self) -> Result<IndexerConfig> {
        let mut config = match &self.config {
            Some(path) => IndexerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                IndexerConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                    .context("Failed to load ./xref.toml")?
            }
            None => IndexerConfig::default(),
        };
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        Ok(config)
    }
}

async fn run_index(mut config: IndexerConfig, args: IndexArgs, json: bool) -> Result<()> {
    if let Some(ast_dir) = args.ast_dir {
        config.ast_dir = Some(ast_dir);
    }
    if let Some(jobs) = args.jobs {
        config.max_concurrent = jobs;
    }
    config.system_includes.extend(args.system_includes);
    config.discover_system_includes |= args.discover_system_includes;

    let jobs = if args.files.is_empty() {
        let path = args
            .compile_commands
            .unwrap_or_else(|| PathBuf::from("compile_commands.json"));
        load_compile_commands(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        vec![CompileJob {
            inputs: args.files,
            arguments: CompileArguments::new(args.args),
        }]
    };

    if !json {
        println!(
            "{} Indexing {} files into {}",
            "▶".bright_blue(),
            jobs.iter().map(|job| job.inputs.len()).sum::<usize>(),
            config.db_path.display()
        );
    }

    let front_end = DumpFrontEnd::new(config.ast_dir.clone());
    let indexer = SymbolIndexer::new(config, front_end).context("Failed to initialize indexer")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; abandoning the indexing pass");
            on_interrupt.cancel();
        }
    });

    let stats = indexer
        .index(jobs, cancel)
        .await
        .context("Failed to index sources")?;

    if json {
        print_json(&stats)?;
        return Ok(());
    }
    println!("{} Indexing complete!", "✓".bright_green());
    println!("  Files processed: {}", stats.files_processed.bright_cyan());
    println!("  Files failed: {}", stats.files_failed.bright_cyan());
    println!("  Entries written: {}", stats.entries_written.bright_cyan());
    println!("  Names: {}", stats.dictionary_names.bright_cyan());
    if stats.consistency_errors > 0 {
        println!(
            "  {} {} consistency errors",
            "✗".bright_red(),
            stats.consistency_errors
        );
    }
    Ok(())
}

fn open_query(config: &IndexerConfig) -> Result<SymbolQuery> {
    SymbolQuery::open(&config.db_path).with_context(|| {
        format!(
            "No index at {}. Run 'xref index' first.",
            config.db_path.display()
        )
    })
}

#[derive(Debug, Serialize)]
struct DirtyReport {
    file: PathBuf,
    changed: Vec<PathBuf>,
    arguments: Vec<String>,
}

fn run_dirty(config: &IndexerConfig, json: bool) -> Result<()> {
    let query = open_query(config)?;
    let dirty = query.dirty().context("Staleness scan failed")?;
    if json {
        let report: Vec<DirtyReport> = dirty
            .jobs
            .iter()
            .map(|(file, arguments)| DirtyReport {
                file: file.clone(),
                changed: dirty.changed.get(file).cloned().unwrap_or_default(),
                arguments: arguments.as_slice().to_vec(),
            })
            .collect();
        return print_json(&report);
    }
    if dirty.is_empty() {
        println!(
            "{} All {} translation units are up to date",
            "✓".bright_green(),
            dirty.records
        );
        return Ok(());
    }
    for (file, changed) in &dirty.changed {
        println!("{}", file.display().bright_yellow());
        for path in changed {
            println!("  {} {}", "changed:".bright_black(), path.display());
        }
    }
    Ok(())
}

fn run_lookup(config: &IndexerConfig, args: LookupArgs, json: bool) -> Result<()> {
    let locations = open_query(config)?.lookup(&args.name);
    print_locations(&args.name, &locations, json)
}

fn run_follow(config: &IndexerConfig, args: LocationArgs, json: bool) -> Result<()> {
    let location = normalize_location(&args.location);
    let target = open_query(config)?
        .follow(&location)
        .with_context(|| format!("Failed to read {location}"))?;
    if json {
        return print_json(&target);
    }
    match target {
        Some(target) => println!("{target}"),
        None => println!("{} No reference recorded at {location}", "✗".bright_red()),
    }
    Ok(())
}

fn run_refs(config: &IndexerConfig, args: LocationArgs, json: bool) -> Result<()> {
    let location = normalize_location(&args.location);
    let references = open_query(config)?
        .references(&location)
        .with_context(|| format!("Failed to read {location}"))?;
    print_locations(&location, &references, json)
}

fn run_search(config: &IndexerConfig, args: SearchArgs, json: bool) -> Result<()> {
    let matches = open_query(config)?.search(&args.query, args.limit);
    if json {
        return print_json(&matches);
    }
    if matches.is_empty() {
        println!("{} No results found", "✗".bright_red());
        return Ok(());
    }
    for (i, hit) in matches.iter().enumerate() {
        println!(
            "{}. {} {}",
            (i + 1).to_string().bright_yellow(),
            hit.name.bright_cyan(),
            format!("({})", hit.score).bright_black()
        );
        for location in &hit.locations {
            println!("   {location}");
        }
    }
    Ok(())
}

fn print_locations(subject: &str, locations: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(&locations);
    }
    if locations.is_empty() {
        println!("{} Nothing recorded for {subject}", "✗".bright_red());
        return Ok(());
    }
    for location in locations {
        println!("{location}");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
