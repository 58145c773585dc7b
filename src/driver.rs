//! Per-invocation control flow and the management commands.
//!
//! One invocation is one traversal of a short state machine: parse the tool's
//! argument vector, fingerprint the invocation, serve from the store on a
//! hit, otherwise run the tool and write through. The wrapper's exit code is
//! always exactly the tool's exit code, and cache-layer failures never turn a
//! tool success into a failure — at worst an invocation goes uncached.

use crate::{
    cli::{CliArgs, Invocation},
    config::{SettingValue, Settings},
    error::Result,
    eviction,
    fingerprint::Fingerprinter,
    store::{CacheStore, CachedOutput},
    tool,
};
use std::io::Write;

pub(crate) fn run(args: CliArgs) -> Result<i32> {
    if args.stats {
        return run_stats();
    }
    if args.clear {
        return run_clear();
    }
    if let Some(config_args) = &args.config {
        return run_config(config_args);
    }

    // Caching mode needs a tool and at least one argument for it
    if args.command.len() < 2 {
        let mut usage = <CliArgs as clap::CommandFactory>::command();
        let _ = usage.write_help(&mut std::io::stderr());
        return Ok(1);
    }

    let mut settings = Settings::load_default()?;
    let result = run_cached(&mut settings, &args.command);
    flush_settings(&mut settings);
    result
}

/// Caching mode: the state machine of one wrapped invocation.
fn run_cached(settings: &mut Settings, command: &[String]) -> Result<i32> {
    let (tool_name, tool_args) = command
        .split_first()
        .expect("caller verified the command arity");
    let tool_bin = tool::resolve_tool(tool_name)?;

    let invocation = Invocation::parse(tool_args);
    let Some(source_file) = invocation.source_file.clone() else {
        tracing::debug!("No source file in the argument vector; bypassing the cache");
        return tool::run_inherited(&tool_bin, tool_args);
    };

    let mut fingerprinter = Fingerprinter::new();
    let digest = match fingerprinter.digest(&tool_bin, &invocation, &source_file) {
        Ok(digest) => digest,
        Err(e) => {
            tracing::warn!("Cannot fingerprint this invocation ({e}); running uncached");
            return tool::run_inherited(&tool_bin, tool_args);
        }
    };

    let store = CacheStore::new(settings.cache_dir());

    if let Some(cached) = store.lookup(&digest) {
        tracing::debug!("Cache hit for {digest}");
        settings.inc_hits();
        emit(&cached.stdout, &cached.stderr);
        return Ok(cached.exit_code);
    }

    tracing::debug!("Cache miss for {digest}");
    settings.inc_misses();
    let output = tool::run_tool(&tool_bin, tool_args)?;

    // A failed run with no stdout produced no diagnostics worth replaying;
    // caching it would only pin an invocation-time error.
    if output.exit_code == 0 || !output.stdout.is_empty() {
        let record = CachedOutput {
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            exit_code: output.exit_code,
        };
        if let Err(e) = store.store(&digest, &record) {
            tracing::warn!("Failed to write cache entry {digest}: {e}");
        }
    }

    settings.inc_invocations_since_cleanup();
    if settings.stats().invocations_since_cleanup >= settings.cleanup_interval() {
        eviction::enforce_budget(&store, settings);
    }

    emit(&output.stdout, &output.stderr);
    Ok(output.exit_code)
}

fn run_stats() -> Result<i32> {
    let settings = Settings::load_default()?;
    let store = CacheStore::new(settings.cache_dir());
    let stats = settings.stats();

    println!("Cache directory: {}", store.root().display());
    println!(
        "Max cache size: {:.2} GB",
        settings.max_cache_size() as f64 / (1024.0 * 1024.0 * 1024.0)
    );
    println!("Hits: {}", stats.hits);
    println!("Misses: {}", stats.misses);

    let total = stats.hits + stats.misses;
    if total > 0 {
        println!("Hit rate: {:.1}%", stats.hits as f64 / total as f64 * 100.0);
    }

    println!(
        "Current size: {:.2} MB",
        store.total_size() as f64 / (1024.0 * 1024.0)
    );
    println!("Cached entries: {}", store.iter_entries().len());

    Ok(0)
}

fn run_clear() -> Result<i32> {
    let mut settings = Settings::load_default()?;
    let store = CacheStore::new(settings.cache_dir());

    if store.root().exists() {
        store.clear()?;
        println!("Cache cleared");
    }

    settings.reset_hit_miss_counters();
    flush_settings(&mut settings);
    Ok(0)
}

fn run_config(config_args: &[String]) -> Result<i32> {
    let mut settings = Settings::load_default()?;

    match config_args {
        [] => {
            println!("Config file: {}", settings.path().display());
            let dump = serde_json::to_string_pretty(&settings.dump())
                .expect("effective settings always serialize");
            println!("{dump}");
        }
        [key] => println!("{}", settings.get(key)?),
        [key, value] => {
            settings.set(key, SettingValue::parse(value))?;
            println!("{key} = {}", settings.get(key)?);
            flush_settings(&mut settings);
        }
        _ => unreachable!("clap caps --config at two values"),
    }

    Ok(0)
}

/// Relay captured streams verbatim, stdout to stdout and stderr to stderr.
fn emit(stdout: &str, stderr: &str) {
    let mut out = std::io::stdout();
    let _ = out.write_all(stdout.as_bytes());
    let _ = out.flush();

    let mut err = std::io::stderr();
    let _ = err.write_all(stderr.as_bytes());
    let _ = err.flush();
}

/// Flush, tolerating failure: the in-memory record stays authoritative for
/// the rest of this process, which the durability contract allows.
fn flush_settings(settings: &mut Settings) {
    if let Err(e) = settings.flush() {
        tracing::warn!("Failed to persist settings: {e}");
    }
}
