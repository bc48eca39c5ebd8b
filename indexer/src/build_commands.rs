//! Compile jobs: which files to parse and with what arguments.

use crate::error::IndexerError;
use crate::error::Result;
use crate::key::resolve_path;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Raw compiler argument vector of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompileArguments(pub Vec<String>);

impl CompileArguments {
    pub fn new(arguments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(arguments.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn include_paths(&self) -> Vec<String> {
        self.values("-I")
    }

    pub fn defines(&self) -> Vec<String> {
        self.values("-D")
    }

    /// Arguments handed to the front end: include paths, defines, then system includes.
    pub fn front_end_args(&self, system_includes: &[PathBuf]) -> Vec<String> {
        let includes = self.include_paths().into_iter().map(|path| format!("-I{path}"));
        let defines = self.defines().into_iter().map(|define| format!("-D{define}"));
        let system = system_includes
            .iter()
            .map(|path| format!("-I{}", path.display()));
        includes.chain(defines).chain(system).collect()
    }

    /// Values of `flag`, accepting both `-Ifoo` and `-I foo`.
    fn values(&self, flag: &str) -> Vec<String> {
        let mut values = Vec::new();
        let mut args = self.0.iter();
        while let Some(arg) = args.next() {
            let Some(rest) = arg.strip_prefix(flag) else {
                continue;
            };
            if !rest.is_empty() {
                values.push(rest.to_string());
            } else if let Some(value) = args.next() {
                values.push(value.clone());
            }
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub inputs: Vec<PathBuf>,
    pub arguments: CompileArguments,
}

#[derive(Debug, Deserialize)]
struct CompileCommand {
    directory: PathBuf,
    file: PathBuf,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    command: Option<String>,
}

/// Reads a `compile_commands.json` database, grouping files that share an argument list.
pub fn load_compile_commands(path: &Path) -> Result<Vec<CompileJob>> {
    let content = fs::read_to_string(path)?;
    let commands: Vec<CompileCommand> = serde_json::from_str(&content)?;
    let mut grouped: BTreeMap<CompileArguments, Vec<PathBuf>> = BTreeMap::new();
    for command in commands {
        let arguments = match (command.arguments, command.command) {
            (Some(arguments), _) => arguments,
            (None, Some(line)) => shlex::split(&line).ok_or_else(|| {
                IndexerError::Config(format!(
                    "unbalanced quoting in command for {}",
                    command.file.display()
                ))
            })?,
            (None, None) => {
                return Err(IndexerError::Config(format!(
                    "no arguments or command for {}",
                    command.file.display()
                )));
            }
        };
        let arguments = CompileArguments(absolutize_includes(arguments, &command.directory));
        let file = resolve_path(&command.directory.join(&command.file));
        let inputs = grouped.entry(arguments).or_default();
        if !inputs.contains(&file) {
            inputs.push(file);
        }
    }
    Ok(grouped
        .into_iter()
        .map(|(arguments, inputs)| CompileJob { inputs, arguments })
        .collect())
}

/// Relative `-I` directories are relative to the command's working directory.
fn absolutize_includes(arguments: Vec<String>, directory: &Path) -> Vec<String> {
    let mut out = Vec::with_capacity(arguments.len());
    let mut split_include = false;
    for arg in arguments {
        if split_include {
            split_include = false;
            out.push(absolute_dir(&arg, directory));
            continue;
        }
        match arg.strip_prefix("-I") {
            Some("") => {
                split_include = true;
                out.push(arg);
            }
            Some(rest) => out.push(format!("-I{}", absolute_dir(rest, directory))),
            None => out.push(arg),
        }
    }
    out
}

fn absolute_dir(dir: &str, base: &Path) -> String {
    let path = Path::new(dir);
    if path.is_absolute() {
        dir.to_string()
    } else {
        resolve_path(&base.join(path)).to_string_lossy().into_owned()
    }
}
