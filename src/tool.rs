//! Subprocess plumbing for the wrapped tool and the preprocessor.

use crate::error::{self, Result};
use snafu::ResultExt;
use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

/// Captured streams and exit code of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ToolOutput {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) exit_code: i32,
}

impl ToolOutput {
    fn from_output(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(1),
        }
    }
}

/// Resolve the tool binary, searching `PATH` for bare names.
///
/// Resolving up front gives a precise diagnostic when the tool is missing and
/// a stable path to key the version memoization on.
pub(crate) fn resolve_tool(tool: &str) -> Result<PathBuf> {
    which::which(tool).context(error::ToolNotFoundSnafu { tool })
}

/// Run the tool with the given arguments, capturing both streams.
pub(crate) fn run_tool(tool: &Path, args: &[String]) -> Result<ToolOutput> {
    tracing::debug!("Running {} with {} args", tool.display(), args.len());
    let output = Command::new(tool)
        .args(args)
        .output()
        .with_context(|_| error::SpawnSnafu {
            command: tool.to_path_buf(),
        })?;
    Ok(ToolOutput::from_output(output))
}

/// Run the tool with inherited stdio, for uncached pass-through.
///
/// Returns the tool's exit code.
pub(crate) fn run_inherited(tool: &Path, args: &[String]) -> Result<i32> {
    let status = Command::new(tool)
        .args(args)
        .status()
        .with_context(|_| error::SpawnSnafu {
            command: tool.to_path_buf(),
        })?;
    Ok(status.code().unwrap_or(1))
}

/// Probe `<tool> --version`, trimming trailing whitespace.
pub(crate) fn tool_version(tool: &Path) -> Result<String> {
    let output = Command::new(tool)
        .arg("--version")
        .output()
        .with_context(|_| error::SpawnSnafu {
            command: tool.to_path_buf(),
        })?;
    Ok(String::from_utf8_lossy(&output.stdout)
        .trim_end()
        .to_string())
}

/// Run a derived preprocess command in `dir`, returning its stdout on exit 0.
///
/// Any failure — unlaunchable compiler or nonzero exit — returns `None`; the
/// fingerprint engine then degrades to hashing raw source bytes.
pub(crate) fn run_preprocessor(argv: &[String], dir: &Path) -> Option<Vec<u8>> {
    let (command, args) = argv.split_first()?;
    let output = Command::new(command)
        .args(args)
        .current_dir(dir)
        .output()
        .ok()?;
    if output.status.success() {
        Some(output.stdout)
    } else {
        tracing::debug!(
            "Preprocess command '{command}' exited with {:?}",
            output.status.code()
        );
        None
    }
}
