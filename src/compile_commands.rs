//! Read-only view of the build system's compilation database.
//!
//! A build directory's `compile_commands.json` tells us how the compiler was
//! invoked for each translation unit, which lets the fingerprint engine replay
//! preprocessing with equivalent flags.

use serde::Deserialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// One record of a `compile_commands.json` compilation database.
///
/// Exactly one of `command` (shell-style string) or `arguments` (tokenized
/// vector) is normally present; tools that emit both mean the same thing by
/// them, and `arguments` wins.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompileCommand {
    #[serde(default = "default_directory")]
    pub(crate) directory: PathBuf,
    #[serde(default)]
    pub(crate) file: PathBuf,
    #[serde(default)]
    pub(crate) command: Option<String>,
    #[serde(default)]
    pub(crate) arguments: Option<Vec<String>>,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

/// Index from canonicalized source path to its compile command.
pub(crate) type CommandIndex = HashMap<PathBuf, CompileCommand>;

/// Load and index the compilation database under `build_path`.
///
/// Returns `None` when the database is missing or malformed; the caller then
/// degrades to hashing raw source bytes.
pub(crate) fn load_index(build_path: &Path) -> Option<CommandIndex> {
    let db_path = build_path.join("compile_commands.json");
    let bytes = std::fs::read(&db_path).ok()?;

    let entries: Vec<CompileCommand> = match serde_json::from_slice(&bytes) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                "Ignoring malformed compilation database {}: {e}",
                db_path.display()
            );
            return None;
        }
    };

    let mut index = CommandIndex::with_capacity(entries.len());
    for entry in entries {
        let resolved = entry.directory.join(&entry.file);
        let resolved = std::fs::canonicalize(&resolved).unwrap_or(resolved);
        index.insert(resolved, entry);
    }
    Some(index)
}

impl CompileCommand {
    /// The recorded argument vector, whichever form the database used.
    ///
    /// Shell-style `command` strings are tokenized by whitespace; quoting is
    /// not interpreted.
    fn argv(&self) -> Vec<String> {
        if let Some(arguments) = &self.arguments {
            return arguments.clone();
        }
        if let Some(command) = &self.command {
            return command.split_whitespace().map(str::to_string).collect();
        }
        Vec::new()
    }

    /// Derive the preprocess-only command for `source_file` from this entry.
    ///
    /// Takes the recorded compiler, asks it for preprocessed output without
    /// line markers (`-E -P`), and strips everything that does not belong in
    /// a preprocess run: the output option (`-o <file>` or joined `-o<file>`),
    /// the compile-only flag (`-c`), and any token naming the source file.
    /// The source path is re-appended last.
    ///
    /// Returns `None` when the entry records no argument vector at all.
    pub(crate) fn preprocess_argv(&self, source_file: &Path) -> Option<Vec<String>> {
        let parts = self.argv();
        let (compiler, rest) = parts.split_first()?;

        let source_str = source_file.to_string_lossy();
        let source_name = source_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        let mut argv = vec![compiler.clone(), "-E".to_string(), "-P".to_string()];

        let mut iter = rest.iter();
        while let Some(part) = iter.next() {
            if part == "-o" {
                iter.next();
                continue;
            }
            if part == "-c" {
                continue;
            }
            if part.starts_with("-o") {
                continue;
            }
            if *part == source_str
                || source_name
                    .as_deref()
                    .is_some_and(|name| part.ends_with(name))
            {
                continue;
            }
            argv.push(part.clone());
        }

        argv.push(source_str.into_owned());
        Some(argv)
    }
}
