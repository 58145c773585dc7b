//! Caching wrapper for clang-tidy-style analyzers.
//!
//! tidycache fingerprints each tool invocation — tool version, preprocessed
//! translation unit, effective configuration, argument vector — and replays
//! the stored stdout/stderr/exit code whenever an identical invocation has
//! run before. The cache lives on disk under a size budget with
//! LRU-by-mtime eviction.

pub mod cli;
mod compile_commands;
mod config;
mod driver;
mod error;
mod eviction;
mod fingerprint;
mod logging;
mod store;
mod tool;

pub use error::{Error, Result};

/// Main entry point for the wrapper, meant to be called from `main.rs`.
///
/// Returns the process exit code: the wrapped tool's code in caching mode,
/// zero for the management commands, one for usage errors.
pub fn tidycache_main() -> Result<i32> {
    let args = match <cli::CliArgs as clap::Parser>::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version render to stdout and are a success; real parse
            // errors are usage errors
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return Ok(code);
        }
    };

    logging::init();
    driver::run(args)
}
