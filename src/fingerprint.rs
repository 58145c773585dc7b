//! Digests over the full semantic input of a tool invocation.
//!
//! Two invocations get the same digest exactly when nothing that feeds the
//! analysis differs: tool version, preprocessed translation unit, effective
//! tool configuration, and the argument vector. Hashing the *preprocessed*
//! source is the load-bearing part: it folds every reachable header and macro
//! into the key, so editing an include invalidates entries for sources whose
//! own bytes never changed.

use crate::{
    cli::Invocation,
    compile_commands::{self, CommandIndex, CompileCommand},
    error::{self, Result},
    tool,
};
use sha2::{Digest, Sha256};
use snafu::ResultExt;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Per-process fingerprinting context.
///
/// Memoizes the tool version probe and compilation-database indexes. Both are
/// expensive to recompute, stable for the life of one process, and consulted
/// once per invocation, so the maps stay tiny.
#[derive(Debug, Default)]
pub(crate) struct Fingerprinter {
    versions: HashMap<PathBuf, String>,
    indexes: HashMap<PathBuf, Option<CommandIndex>>,
}

impl Fingerprinter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Digest of the invocation's full semantic input, as a 64-hex-char
    /// SHA-256 string.
    ///
    /// Absorbs, in fixed order: the trimmed tool version, the preprocessed
    /// translation unit (or raw source bytes when preprocessing is
    /// unavailable), the effective tool configuration bytes, and each
    /// residual argument.
    ///
    /// An unreadable source file or an unprobeable tool is an error; the
    /// driver responds by running the invocation uncached.
    pub(crate) fn digest(
        &mut self,
        tool_bin: &Path,
        invocation: &Invocation,
        source_file: &Path,
    ) -> Result<String> {
        let mut hasher = Sha256::new();

        hasher.update(self.tool_version(tool_bin)?.as_bytes());
        hasher.update(self.translation_unit(invocation, source_file)?);
        hasher.update(config_bytes(
            source_file,
            invocation.config_file.as_deref(),
        ));
        for arg in &invocation.residual_args {
            hasher.update(arg.as_bytes());
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    fn tool_version(&mut self, tool_bin: &Path) -> Result<String> {
        if let Some(version) = self.versions.get(tool_bin) {
            return Ok(version.clone());
        }

        let version = tool::tool_version(tool_bin)?;
        tracing::debug!("{} --version: {version:?}", tool_bin.display());
        self.versions.insert(tool_bin.to_path_buf(), version.clone());
        Ok(version)
    }

    /// The bytes standing in for the translation unit: preprocessed output
    /// when the compilation database knows how to build this file, raw source
    /// bytes otherwise.
    ///
    /// The raw fallback over-invalidates (header edits go unnoticed until the
    /// source itself changes) but never produces a stale hit.
    fn translation_unit(&mut self, invocation: &Invocation, source_file: &Path) -> Result<Vec<u8>> {
        let entry = match invocation.build_path.as_deref() {
            Some(build) => self.db_entry(build, source_file).cloned(),
            None => None,
        };

        if let Some(entry) = entry {
            if let Some(argv) = entry.preprocess_argv(source_file) {
                if let Some(stdout) = tool::run_preprocessor(&argv, &entry.directory) {
                    return Ok(stdout);
                }
                tracing::debug!(
                    "Preprocessing failed for {}; hashing raw source bytes",
                    source_file.display()
                );
            }
        }

        std::fs::read(source_file).with_context(|_| error::ReadSourceSnafu {
            path: source_file.to_path_buf(),
        })
    }

    fn db_entry(&mut self, build_path: &Path, source_file: &Path) -> Option<&CompileCommand> {
        let index = self
            .indexes
            .entry(build_path.to_path_buf())
            .or_insert_with(|| compile_commands::load_index(build_path));
        index.as_ref()?.get(source_file)
    }
}

/// Effective tool configuration bytes.
///
/// An explicit `--config-file=` override is read directly (empty when
/// unreadable). Otherwise the nearest `.clang-tidy`, walking from the source
/// file's parent directory upward, wins — the same file the tool itself would
/// discover. No config anywhere is the empty string.
pub(crate) fn config_bytes(source_file: &Path, config_file: Option<&Path>) -> Vec<u8> {
    if let Some(path) = config_file {
        return std::fs::read(path).unwrap_or_default();
    }

    for dir in source_file.ancestors().skip(1) {
        if dir.parent().is_none() {
            break;
        }
        if let Ok(bytes) = std::fs::read(dir.join(".clang-tidy")) {
            return bytes;
        }
    }

    Vec::new()
}
