use clap::Parser;
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(name = "tidycache")]
#[command(about = "Caching wrapper for clang-tidy: replays stored diagnostics when nothing that feeds the analysis has changed")]
#[non_exhaustive]
pub struct CliArgs {
    /// Print cache statistics and exit
    #[arg(long, exclusive = true)]
    pub stats: bool,

    /// Delete every cache entry and reset the hit/miss counters
    #[arg(long, exclusive = true)]
    pub clear: bool,

    /// Show the full configuration (no arguments), read one key, or set a key
    /// to a value
    #[arg(long, num_args = 0..=2, value_names = ["KEY", "VALUE"])]
    pub config: Option<Vec<String>>,

    /// The analysis tool binary followed by its complete argument vector.
    ///
    /// Everything after the first token is handed to the tool untouched;
    /// tidycache only inspects it to work out what the invocation depends on.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "TOOL [TOOL_ARGS]")]
    pub command: Vec<String>,
}

/// What one tool invocation depends on, recovered from the raw argument
/// vector that follows the tool binary on our command line.
///
/// Parsing never rejects anything: unrecognized tokens pass through in
/// `residual_args`, and the extracted tokens are passed through as well, so
/// the tool always sees exactly the argument vector the user wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    /// The file under analysis, canonicalized. `None` when no positional
    /// argument names an existing path, in which case the invocation is
    /// uncacheable.
    pub(crate) source_file: Option<PathBuf>,
    /// Build directory from `-p <dir>` or `-p=<dir>`, home of the
    /// compilation database.
    pub(crate) build_path: Option<PathBuf>,
    /// Explicit tool configuration from `--config-file=<path>`.
    pub(crate) config_file: Option<PathBuf>,
    /// The full argument vector, in original order.
    pub(crate) residual_args: Vec<String>,
}

impl Invocation {
    pub(crate) fn parse(args: &[String]) -> Self {
        let mut source_file = None;
        let mut build_path = None;
        let mut config_file = None;
        let mut residual_args = Vec::with_capacity(args.len());

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "-p" {
                if let Some(path) = iter.next() {
                    build_path = Some(PathBuf::from(path));
                    residual_args.push(arg.clone());
                    residual_args.push(path.clone());
                } else {
                    // `-p` with nothing after it; let the tool complain
                    residual_args.push(arg.clone());
                }
                continue;
            }

            if let Some(path) = arg.strip_prefix("-p=") {
                build_path = Some(PathBuf::from(path));
                residual_args.push(arg.clone());
                continue;
            }

            if let Some(path) = arg.strip_prefix("--config-file=") {
                config_file = Some(PathBuf::from(path));
                residual_args.push(arg.clone());
                continue;
            }

            if arg.starts_with('-') {
                residual_args.push(arg.clone());
                continue;
            }

            if source_file.is_none() {
                if let Ok(resolved) = std::fs::canonicalize(arg) {
                    source_file = Some(resolved);
                }
            }
            residual_args.push(arg.clone());
        }

        Self {
            source_file,
            build_path,
            config_file,
            residual_args,
        }
    }
}
