use crate::error::IndexerError;
use crate::error::Result;
use crate::system_includes;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Configuration for an indexing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Database directory (recreated on every write pass)
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding AST dumps; dumps sit next to sources when unset
    #[serde(default)]
    pub ast_dir: Option<PathBuf>,

    /// Maximum number of files parsed concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Extra include directories appended to every job
    #[serde(default)]
    pub system_includes: Vec<PathBuf>,

    /// Ask `compiler` for its default include directories
    #[serde(default)]
    pub discover_system_includes: bool,

    /// Compiler probed for system include directories
    #[serde(default = "default_compiler")]
    pub compiler: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".xref")
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

fn default_compiler() -> String {
    "c++".to_string()
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ast_dir: None,
            max_concurrent: default_max_concurrent(),
            system_includes: Vec::new(),
            discover_system_includes: false,
            compiler: default_compiler(),
        }
    }
}

impl IndexerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate().map_err(IndexerError::Config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.db_path.as_os_str().is_empty() {
            return Err("Database path must not be empty".to_string());
        }

        if self.max_concurrent == 0 {
            return Err("Max concurrent must be > 0".to_string());
        }

        if let Some(ast_dir) = &self.ast_dir
            && !ast_dir.is_dir()
        {
            return Err(format!("AST directory does not exist: {ast_dir:?}"));
        }

        if self.discover_system_includes && self.compiler.trim().is_empty() {
            return Err("Compiler must be set to discover system includes".to_string());
        }

        Ok(())
    }

    /// Configured system includes, followed by discovered ones when enabled
    pub fn resolve_system_includes(&self) -> Vec<PathBuf> {
        let mut includes = self.system_includes.clone();
        if self.discover_system_includes {
            for dir in system_includes::discover(&self.compiler) {
                if !includes.contains(&dir) {
                    includes.push(dir);
                }
            }
        }
        includes
    }
}
