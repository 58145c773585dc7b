//! Caching-mode behavior: hits, misses, invalidation, pass-through, eviction.

use super::utils::TestFs;
use predicates::prelude::*;

#[test]
fn cold_miss_then_clean_hit() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo 'ok'\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");

    // Cold cache: the tool runs, its output is relayed, one entry appears
    fs.tidycache()
        .arg(&tool)
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
    assert_eq!(TestFs::runs(&runs_file), 1);
    assert_eq!(fs.cache_entries().len(), 1);

    // Identical invocation: same output, no new run, no new entry
    fs.tidycache()
        .arg(&tool)
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
    assert_eq!(TestFs::runs(&runs_file), 1);
    assert_eq!(fs.cache_entries().len(), 1);

    fs.tidycache()
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hits: 1"))
        .stdout(predicate::str::contains("Misses: 1"));
}

#[test]
fn stderr_and_exit_code_are_replayed_on_hit() {
    let fs = TestFs::new();
    let (tool, runs_file) =
        fs.counting_tool("echo 'warning: unchecked'\necho 'note: details' >&2\nexit 4\n");
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache()
        .arg(&tool)
        .arg(&source)
        .assert()
        .code(4)
        .stdout(predicate::str::contains("warning: unchecked"))
        .stderr(predicate::str::contains("note: details"));

    fs.tidycache()
        .arg(&tool)
        .arg(&source)
        .assert()
        .code(4)
        .stdout(predicate::str::contains("warning: unchecked"))
        .stderr(predicate::str::contains("note: details"));

    assert_eq!(TestFs::runs(&runs_file), 1);
}

#[test]
fn source_edit_invalidates() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache().arg(&tool).arg(&source).assert().success();
    fs.write_source("x.c", "int x; int y;\n");
    fs.tidycache().arg(&tool).arg(&source).assert().success();

    assert_eq!(TestFs::runs(&runs_file), 2);
    assert_eq!(fs.cache_entries().len(), 2);
}

#[test]
fn changed_arguments_invalidate() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache().arg(&tool).arg(&source).assert().success();
    fs.tidycache()
        .arg(&tool)
        .arg("-checks=-*,readability-*")
        .arg(&source)
        .assert()
        .success();

    assert_eq!(TestFs::runs(&runs_file), 2);
}

#[test]
fn header_edit_invalidates_through_the_compilation_database() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "#include \"h.h\"\nint x;\n");
    let header = fs.write_source("h.h", "#define WIDTH 1\n");

    // Fake compiler standing in for `cc -E -P`: concatenates the source and
    // its header, which is exactly what preprocessing does for the digest
    let fake_cc = fs.write_script(
        "fake-cc",
        &format!("cat {} {}\n", source.display(), header.display()),
    );

    let build = fs.work.path().join("build");
    std::fs::create_dir_all(&build).unwrap();
    let db = serde_json::json!([{
        "directory": fs.work.path(),
        "file": "x.c",
        "command": format!("{} -c x.c -o x.o", fake_cc.display()),
    }]);
    std::fs::write(
        build.join("compile_commands.json"),
        serde_json::to_vec_pretty(&db).unwrap(),
    )
    .unwrap();

    let run = |fs: &TestFs| {
        fs.tidycache()
            .arg(&tool)
            .arg("-p")
            .arg(&build)
            .arg(&source)
            .assert()
            .success();
    };

    run(&fs);
    run(&fs);
    assert_eq!(TestFs::runs(&runs_file), 1, "unchanged header must hit");

    // Source untouched, header edited: the digest must move
    fs.write_source("h.h", "#define WIDTH 2\n");
    run(&fs);
    assert_eq!(TestFs::runs(&runs_file), 2);
}

#[test]
fn config_file_override_feeds_the_digest() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");
    fs.write_source("a.yaml", "Checks: '-*,modernize-*'\n");
    fs.write_source("b.yaml", "Checks: '-*,bugprone-*'\n");

    fs.tidycache()
        .arg(&tool)
        .arg("--config-file=a.yaml")
        .arg(&source)
        .assert()
        .success();
    fs.tidycache()
        .arg(&tool)
        .arg("--config-file=a.yaml")
        .arg(&source)
        .assert()
        .success();
    assert_eq!(TestFs::runs(&runs_file), 1);

    fs.tidycache()
        .arg(&tool)
        .arg("--config-file=b.yaml")
        .arg(&source)
        .assert()
        .success();
    assert_eq!(TestFs::runs(&runs_file), 2);
}

#[test]
fn discovered_config_edit_invalidates() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");
    fs.write_source(".clang-tidy", "Checks: '-*'\n");

    fs.tidycache().arg(&tool).arg(&source).assert().success();
    fs.write_source(".clang-tidy", "Checks: '*'\n");
    fs.tidycache().arg(&tool).arg(&source).assert().success();

    assert_eq!(TestFs::runs(&runs_file), 2);
}

#[test]
fn failed_run_with_no_diagnostics_is_not_cached() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo 'config error' >&2\nexit 2\n");
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache()
        .arg(&tool)
        .arg(&source)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config error"));
    assert!(fs.cache_entries().is_empty());

    // The identical invocation is again a miss
    fs.tidycache().arg(&tool).arg(&source).assert().code(2);
    assert_eq!(TestFs::runs(&runs_file), 2);

    fs.tidycache()
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Misses: 2"));
}

#[test]
fn failed_run_with_diagnostics_is_cached() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo 'warning: bad'\nexit 1\n");
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache().arg(&tool).arg(&source).assert().code(1);
    fs.tidycache()
        .arg(&tool)
        .arg(&source)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("warning: bad"));

    assert_eq!(TestFs::runs(&runs_file), 1);
    assert_eq!(fs.cache_entries().len(), 1);
}

#[test]
fn invocation_without_a_source_file_bypasses_the_cache() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo listing\nexit 0\n");

    fs.tidycache()
        .arg(&tool)
        .arg("--list-checks")
        .assert()
        .success()
        .stdout(predicate::str::contains("listing"));

    assert_eq!(TestFs::runs(&runs_file), 1);
    assert!(fs.cache_entries().is_empty());
    fs.tidycache()
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hits: 0"))
        .stdout(predicate::str::contains("Misses: 0"));
}

#[test]
fn positional_that_is_not_a_path_bypasses_the_cache() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo ran\nexit 0\n");

    fs.tidycache()
        .arg(&tool)
        .arg("no/such/file.c")
        .assert()
        .success();

    assert_eq!(TestFs::runs(&runs_file), 1);
    assert!(fs.cache_entries().is_empty());
}

#[test]
fn missing_tool_is_a_clean_failure() {
    let fs = TestFs::new();
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache()
        .arg("tidycache-no-such-tool")
        .arg(&source)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("was not found"));
}

#[test]
fn eviction_keeps_the_store_under_the_target() {
    let fs = TestFs::new();
    // Tool output is ~160 bytes, so each entry lands around 200 bytes
    let (tool, _runs_file) = fs.counting_tool(&format!("echo '{}'\nexit 0\n", "x".repeat(160)));
    let source = fs.write_source("x.c", "int x;\n");

    for key_value in [
        ["max_cache_size", "1000"],
        ["cleanup_interval", "1"],
    ] {
        fs.tidycache()
            .arg("--config")
            .args(key_value)
            .assert()
            .success();
    }

    // Distinct check flags give every invocation its own digest
    for i in 0..8 {
        fs.tidycache()
            .arg(&tool)
            .arg(format!("-checks=variant-{i}"))
            .arg(&source)
            .assert()
            .success();
    }

    // Every miss ran the budget check, so the store can never finish a run
    // above the 900-byte threshold, and sweeps must have fired along the way
    let entries = fs.cache_entries();
    let total: u64 = entries.iter().map(|(_, size)| size).sum();
    assert!(
        total <= 900,
        "store must end at or under cleanup_threshold x max_cache_size, got {total}"
    );
    assert!(
        entries.len() < 8,
        "eight ~200-byte entries cannot all fit a 1000-byte budget"
    );
    assert!(!entries.is_empty(), "the newest entries must survive");

    fs.tidycache()
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Misses: 8"));
}

#[test]
fn tiny_budget_sweeps_everything() {
    let fs = TestFs::new();
    let (tool, _runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache()
        .args(["--config", "max_cache_size", "1"])
        .assert()
        .success();
    fs.tidycache()
        .args(["--config", "cleanup_interval", "1"])
        .assert()
        .success();

    fs.tidycache().arg(&tool).arg(&source).assert().success();

    assert!(fs.cache_entries().is_empty());
}

#[test]
fn clear_empties_the_store_and_resets_counters() {
    let fs = TestFs::new();
    let (tool, runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");

    fs.tidycache().arg(&tool).arg(&source).assert().success();
    fs.tidycache().arg(&tool).arg(&source).assert().success();
    assert_eq!(fs.cache_entries().len(), 1);

    fs.tidycache()
        .arg("--clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache cleared"));

    assert!(fs.cache_entries().is_empty());
    fs.tidycache()
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hits: 0"))
        .stdout(predicate::str::contains("Misses: 0"));

    // The cleared entry misses again
    fs.tidycache().arg(&tool).arg(&source).assert().success();
    assert_eq!(TestFs::runs(&runs_file), 2);
}

#[test]
fn cache_dir_env_override_is_honored() {
    let fs = TestFs::new();
    let (tool, _runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");
    let elsewhere = assert_fs::TempDir::with_prefix("tidycache-alt-").unwrap();

    fs.tidycache()
        .env("TIDYCACHE_DIR", elsewhere.path())
        .arg(&tool)
        .arg(&source)
        .assert()
        .success();

    assert!(
        fs.cache_entries().is_empty(),
        "nothing may land in the default location"
    );
    let shards = std::fs::read_dir(elsewhere.path()).unwrap().count();
    assert_eq!(shards, 1);
}

#[test]
fn persisted_cache_dir_beats_the_environment() {
    let fs = TestFs::new();
    let (tool, _runs_file) = fs.counting_tool("echo ok\nexit 0\n");
    let source = fs.write_source("x.c", "int x;\n");
    let configured = fs.work.path().join("configured-cache");

    fs.tidycache()
        .arg("--config")
        .arg("cache_dir")
        .arg(&configured)
        .assert()
        .success();

    fs.tidycache().arg(&tool).arg(&source).assert().success();

    assert!(fs.cache_entries().is_empty());
    assert!(configured.exists());
}
