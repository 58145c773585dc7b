use snafu::prelude::*;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Analysis tool '{tool}' was not found: {source}"))]
    ToolNotFound { tool: String, source: which::Error },

    #[snafu(display("Failed to launch '{}': {source}", command.display()))]
    Spawn {
        command: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read source file '{}': {source}", path.display()))]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("I/O error on '{}': {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("JSON serialization error: {source}"))]
    Json { source: serde_json::Error },

    #[snafu(display("Failed to determine the user configuration directory: {source}"))]
    ConfigDir { source: etcetera::HomeDirError },

    #[snafu(display("'{key}' is not a recognized configuration key"))]
    UnknownConfigKey { key: String },

    #[snafu(display("Invalid value for '{key}': {reason}"))]
    InvalidConfigValue { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
