use crate::ast::FrontEnd;
use crate::ast::TranslationUnit;
use crate::build_commands::CompileArguments;
use crate::build_commands::CompileJob;
use crate::collect::collect_symbols;
use crate::config::IndexerConfig;
use crate::deps::DependencyRecord;
use crate::dictionary::Dictionary;
use crate::error::IndexerError;
use crate::error::ParseError;
use crate::error::Result;
use crate::key::KeyBuilder;
use crate::key::resolve_path;
use crate::storage::Database;
use crate::storage::schema::write_index;
use crate::store::EntryStore;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Progress callback for indexing operations
pub type ProgressCallback = Arc<dyn Fn(IndexProgress) + Send + Sync>;

/// Indexing progress information
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub current: usize,
    pub total: usize,
    pub current_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Parsing,
    Resolving,
    Writing,
    Complete,
}

/// Statistics about one indexing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub diagnostics: usize,
    pub entries_written: usize,
    pub dictionary_names: usize,
    pub dependency_records: usize,
    pub consistency_errors: usize,
}

/// Everything one worker produced for one input file.
#[derive(Debug)]
struct FileOutput {
    file: PathBuf,
    store: EntryStore,
    dependencies: DependencyRecord,
    diagnostics: usize,
}

/// Full-rebuild indexer: parses every job, resolves, and rewrites the database.
pub struct SymbolIndexer<F: FrontEnd> {
    config: IndexerConfig,
    front_end: Arc<F>,
    system_includes: Vec<PathBuf>,
    progress: Option<ProgressCallback>,
}

impl<F: FrontEnd> SymbolIndexer<F> {
    /// Create new indexer
    pub fn new(config: IndexerConfig, front_end: F) -> Result<Self> {
        config.validate().map_err(IndexerError::Config)?;
        let system_includes = config.resolve_system_includes();
        Ok(Self {
            config,
            front_end: Arc::new(front_end),
            system_includes,
            progress: None,
        })
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Indexes every input of `jobs` and replaces the database at `db_path`.
    ///
    /// Cancelling `cancel` abandons queued files and returns
    /// [`IndexerError::Cancelled`] before the database is touched.
    pub async fn index(&self, jobs: Vec<CompileJob>, cancel: CancellationToken) -> Result<IndexStats> {
        let files: Vec<(PathBuf, CompileArguments)> = jobs
            .into_iter()
            .flat_map(|job| {
                let arguments = job.arguments;
                job.inputs
                    .into_iter()
                    .map(move |input| (input, arguments.clone()))
            })
            .collect();
        let total = files.len();
        info!(
            "Indexing {total} files into {:?} ({} workers)",
            self.config.db_path, self.config.max_concurrent
        );

        let outputs = self.parse_all(files, &cancel).await?;

        let mut stats = IndexStats::default();
        let mut global = EntryStore::new();
        let mut dependencies = Vec::new();
        for (current, (file, output)) in outputs.into_iter().enumerate() {
            match output {
                Ok(output) => {
                    stats.files_processed += 1;
                    stats.diagnostics += output.diagnostics;
                    global.absorb(output.store);
                    dependencies.push((output.file, output.dependencies));
                }
                Err(err) => {
                    warn!("{err}");
                    stats.files_failed += 1;
                }
            }
            self.report_progress(IndexPhase::Parsing, current + 1, total, Some(file));
        }

        self.report_progress(IndexPhase::Resolving, 0, global.len(), None);
        let errors = global.propagate_back_references();
        stats.consistency_errors = errors.len();
        let dictionary = Dictionary::build(&global);

        if cancel.is_cancelled() {
            info!("Indexing cancelled before writing {:?}", self.config.db_path);
            return Err(IndexerError::Cancelled);
        }

        self.report_progress(IndexPhase::Writing, 0, global.len(), None);
        let mut db = Database::create(&self.config.db_path)?;
        let summary = write_index(&mut db, &global, &dictionary, &dependencies)?;
        db.commit()?;
        stats.entries_written = summary.entries;
        stats.dictionary_names = summary.dictionary_names;
        stats.dependency_records = summary.dependency_records;

        self.report_progress(IndexPhase::Complete, total, total, None);
        info!(
            "Indexing complete: {} files processed, {} failed, {} entries, {} names",
            stats.files_processed, stats.files_failed, stats.entries_written, stats.dictionary_names
        );
        if stats.consistency_errors > 0 {
            warn!(
                "{} consistency errors; back-references are incomplete",
                stats.consistency_errors
            );
        }
        Ok(stats)
    }

    /// Parses files on blocking workers; results come back in input order.
    async fn parse_all(
        &self,
        files: Vec<(PathBuf, CompileArguments)>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(PathBuf, std::result::Result<FileOutput, ParseError>)>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks = Vec::with_capacity(files.len());

        for (file, arguments) in files {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IndexerError::Cancelled),
                permit = semaphore.clone().acquire_owned() => permit.map_err(|e| {
                    IndexerError::Worker(format!("Semaphore error: {e}"))
                })?,
            };

            let front_end = Arc::clone(&self.front_end);
            let front_end_args = arguments.front_end_args(&self.system_includes);
            let cancel = cancel.clone();
            let task_file = file.clone();
            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                if cancel.is_cancelled() {
                    return None;
                }
                Some(process_file(
                    front_end.as_ref(),
                    &task_file,
                    &arguments,
                    &front_end_args,
                ))
            });
            tasks.push((file, task));
        }

        let mut outputs = Vec::with_capacity(tasks.len());
        for (file, task) in tasks {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IndexerError::Cancelled),
                joined = task => joined,
            };
            match joined {
                Ok(Some(output)) => outputs.push((file, output)),
                Ok(None) => return Err(IndexerError::Cancelled),
                Err(e) => {
                    warn!("Task join error: {e}");
                    let err = ParseError::new(&file, format!("worker failed: {e}"));
                    outputs.push((file, Err(err)));
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        Ok(outputs)
    }

    fn report_progress(
        &self,
        phase: IndexPhase,
        current: usize,
        total: usize,
        current_file: Option<PathBuf>,
    ) {
        if let Some(callback) = &self.progress {
            callback(IndexProgress {
                phase,
                current,
                total,
                current_file,
            });
        }
    }
}

/// Parse one file and collect its partial store and dependency record.
fn process_file<F: FrontEnd>(
    front_end: &F,
    file: &Path,
    arguments: &CompileArguments,
    front_end_args: &[String],
) -> std::result::Result<FileOutput, ParseError> {
    debug!("Processing file: {file:?}");
    let unit = front_end.parse(file, front_end_args)?;

    let mut diagnostics = 0;
    for diagnostic in unit.diagnostics() {
        let Some(path) = diagnostic
            .file
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
        else {
            continue;
        };
        diagnostics += 1;
        warn!(
            "{}:{}:{}: {}",
            path.display(),
            diagnostic.line,
            diagnostic.column,
            diagnostic.message
        );
    }

    let mut keys = KeyBuilder::new();
    let mut store = EntryStore::new();
    let visited = collect_symbols(&unit.root(), &mut keys, &mut store);
    let owner = resolve_path(file);
    let dependencies = DependencyRecord::collect(&owner, arguments.as_slice(), &unit, &mut keys);
    debug!(
        "{owner:?}: {visited} cursors, {} entries, {} dependencies",
        store.len(),
        dependencies.included_files.len()
    );
    Ok(FileOutput {
        file: owner,
        store,
        dependencies,
        diagnostics,
    })
}
