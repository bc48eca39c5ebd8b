/*!
# Xref Indexer

Persistent cross-reference index for C and C++ translation units.

## Features

- **Canonical entries**: every symbol occurrence is merged by `file:offset`, first definition wins
- **Reference threading**: declarations point at their out-of-line definitions, definitions list their uses
- **Name dictionary**: plain, signature-stripped and container-qualified names
- **Staleness scan**: finds translation units whose sources or headers changed since the last pass
- **Concurrent parsing**: one blocking worker per file, bounded and cancellable

## Example

```rust,no_run
use xref_indexer::{DumpFrontEnd, IndexerConfig, SymbolIndexer, load_compile_commands};
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> xref_indexer::Result<()> {
    let config = IndexerConfig::default();
    let jobs = load_compile_commands(Path::new("build/compile_commands.json"))?;
    let indexer = SymbolIndexer::new(config, DumpFrontEnd::new(None))?;
    let stats = indexer.index(jobs, CancellationToken::new()).await?;

    println!("Indexed {} files, wrote {} entries",
        stats.files_processed, stats.entries_written);

    Ok(())
}
```
*/

pub mod ast;
mod build_commands;
mod collect;
mod config;
mod deps;
mod dictionary;
mod error;
mod indexer;
mod key;
mod query;
mod resolver;
mod staleness;
pub mod storage;
mod store;
pub mod system_includes;

pub use ast::DumpFrontEnd;
pub use ast::FrontEnd;
pub use ast::InMemoryFrontEnd;
pub use build_commands::CompileArguments;
pub use build_commands::CompileJob;
pub use build_commands::load_compile_commands;
pub use collect::collect_symbols;
pub use config::IndexerConfig;
pub use deps::DependencyRecord;
pub use deps::file_mtime;
pub use dictionary::Dictionary;
pub use error::ConsistencyError;
pub use error::IndexerError;
pub use error::ParseError;
pub use error::Result;
pub use indexer::IndexPhase;
pub use indexer::IndexProgress;
pub use indexer::IndexStats;
pub use indexer::ProgressCallback;
pub use indexer::SymbolIndexer;
pub use key::ContainerChain;
pub use key::CursorRecord;
pub use key::KeyBuilder;
pub use key::SymbolKey;
pub use key::resolve_path;
pub use query::SymbolMatch;
pub use query::SymbolQuery;
pub use query::normalize_location;
pub use resolver::reference_target;
pub use staleness::DirtySet;
pub use staleness::scan_dirty;
pub use storage::Database;
pub use store::Entry;
pub use store::EntryState;
pub use store::EntryStore;
pub use store::Visit;
