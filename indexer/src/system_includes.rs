//! Platform default include directories, as reported by the compiler.

use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use tracing::debug;
use tracing::warn;

const SEARCH_START: &str = "#include <...> search starts here:";
const SEARCH_END: &str = "End of search list.";
const FRAMEWORK_SUFFIX: &str = " (framework directory)";

/// Runs `compiler -x c++ -v -E -` and parses the search list from its stderr.
///
/// Any failure is logged and yields an empty list.
pub fn discover(compiler: &str) -> Vec<PathBuf> {
    let program = match which::which(compiler) {
        Ok(program) => program,
        Err(err) => {
            warn!("compiler {compiler} not found, no system includes: {err}");
            return Vec::new();
        }
    };
    let output = Command::new(&program)
        .args(["-x", "c++", "-v", "-E", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();
    match output {
        Ok(output) => {
            let dirs = parse_search_dirs(&String::from_utf8_lossy(&output.stderr));
            debug!(
                "{} system include dirs from {}",
                dirs.len(),
                program.display()
            );
            dirs
        }
        Err(err) => {
            warn!("failed to run {}: {err}", program.display());
            Vec::new()
        }
    }
}

/// Extracts the `#include <...>` search directories from verbose preprocessor output.
pub fn parse_search_dirs(output: &str) -> Vec<PathBuf> {
    output
        .lines()
        .skip_while(|line| line.trim() != SEARCH_START)
        .skip(1)
        .take_while(|line| line.trim() != SEARCH_END)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_suffix(FRAMEWORK_SUFFIX).unwrap_or(line))
        .map(PathBuf::from)
        .collect()
}
