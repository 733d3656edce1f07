use std::fs;
use std::process::Command;
use std::sync::Once;
use test_driver::{parse_dump, DumpRun};

fn target_dir() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{manifest_dir}/../target/debug")
}

fn argdump_binary() -> String {
    format!("{}/argdump", target_dir())
}

static BUILD_INIT: Once = Once::new();

/// Build argdump (behind the `dump` feature) if not already done.
fn ensure_binaries() {
    BUILD_INIT.call_once(|| {
        let manifest_dir = env!("CARGO_MANIFEST_DIR");
        let workspace_root = format!("{manifest_dir}/..");
        let status = Command::new("cargo")
            .args(["build", "-p", "argparse", "--features", "dump"])
            .current_dir(&workspace_root)
            .status()
            .expect("failed to run cargo build");
        assert!(status.success(), "cargo build -p argparse --features dump failed");
    });
}

fn argdump(args: &[&str]) -> DumpRun {
    ensure_binaries();
    DumpRun::spawn(&argdump_binary(), args).expect("failed to spawn argdump")
}

#[test]
fn smoke_no_arguments() {
    let run = argdump(&[]).expect_exit(0);
    let fields = run.fields();

    for name in ["help", "log", "output", "value", "rail", "interval", "scale"] {
        assert_eq!(fields[name], "<unset>", "{name} should be unset");
    }
    assert_eq!(fields["positional"], "<unset>");
    assert_eq!(fields["effective.interval"], "100");
    assert_eq!(fields["effective.scale"], "1");
}

#[test]
fn smoke_positional_then_options() {
    let run = argdump(&["input.jpg", "--log", "--rail=GPU", "-v=power"]).expect_exit(0);
    let fields = run.fields();

    assert_eq!(fields["positional"], "input.jpg");
    assert_eq!(fields["log"], "true");
    assert_eq!(fields["rail"], "GPU");
    assert_eq!(fields["value"], "power");
    assert_eq!(fields["output"], "<unset>");
}

#[test]
fn smoke_numeric_options() {
    let run = argdump(&["--interval=250", "-s=0.5"]).expect_exit(0);
    let fields = run.fields();

    assert_eq!(fields["interval"], "250");
    assert_eq!(fields["scale"], "0.5");
    assert_eq!(fields["effective.interval"], "250");
    assert_eq!(fields["effective.scale"], "0.5");
}

#[test]
fn smoke_unparsable_numbers_become_zero() {
    let run = argdump(&["--interval=fast", "--scale=big"]).expect_exit(0);
    let fields = run.fields();

    assert_eq!(fields["interval"], "0");
    assert_eq!(fields["scale"], "0");
    assert_eq!(fields["effective.interval"], "0");
}

#[test]
fn smoke_unknown_option_is_ignored() {
    let run = argdump(&["--verbose", "--colour=red", "--log"]).expect_exit(0);
    let fields = run.fields();

    assert_eq!(fields["log"], "true");
    assert!(!fields.contains_key("verbose"));
    assert!(!fields.contains_key("colour"));
}

#[test]
fn smoke_value_less_string_option_stays_unset() {
    let run = argdump(&["--output", "--rail="]).expect_exit(0);
    let fields = run.fields();

    assert_eq!(fields["output"], "<unset>");
    assert_eq!(fields["rail"], "<unset>");
}

#[test]
fn smoke_positional_after_option_fails() {
    let run = argdump(&["--log", "input.jpg"]).expect_exit(1);

    assert!(run.stdout.is_empty(), "nothing should be dumped:\n{}", run.stdout);
    assert!(
        run.stderr.contains("argdump: could not parse argument \"input.jpg\""),
        "stderr:\n{}",
        run.stderr
    );
    assert!(run.stderr.contains("Usage: argdump"), "stderr:\n{}", run.stderr);
}

#[test]
fn smoke_separate_value_token_fails() {
    let run = argdump(&["-o", "out.csv"]).expect_exit(1);
    assert!(run.stderr.contains("\"out.csv\""), "stderr:\n{}", run.stderr);
}

#[test]
fn smoke_bare_dash_fails() {
    for bad in ["-", "--"] {
        let run = argdump(&["input.jpg", bad]).expect_exit(1);
        assert!(
            run.stderr.contains("unable to split argument"),
            "stderr for {bad:?}:\n{}",
            run.stderr
        );
    }
}

#[test]
fn smoke_help_prints_usage() {
    let run = argdump(&["-h"]).expect_exit(0);
    assert!(run.stdout.starts_with("Usage: argdump"), "stdout:\n{}", run.stdout);
    assert!(run.stdout.contains("--output=FILE"));
}

#[test]
fn smoke_output_file() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("out.csv");
    let output_arg = format!("--output={}", path.display());

    let run = argdump(&["input.jpg", output_arg.as_str(), "--rail=CPU"]).expect_exit(0);
    assert!(run.stdout.is_empty(), "stdout should be empty:\n{}", run.stdout);

    let written = fs::read_to_string(&path).expect("dump file missing");
    let fields = parse_dump(&written);
    assert_eq!(fields["positional"], "input.jpg");
    assert_eq!(fields["output"], path.display().to_string());
    assert_eq!(fields["rail"], "CPU");
}

#[test]
fn smoke_output_file_with_log_echoes() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("out.csv");
    let output_arg = format!("--output={}", path.display());

    let run = argdump(&[output_arg.as_str(), "-l"]).expect_exit(0);
    let written = fs::read_to_string(&path).expect("dump file missing");
    assert_eq!(run.stdout, written);
}

#[test]
fn smoke_unwritable_output_fails() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("missing").join("out.csv");
    let output_arg = format!("--output={}", path.display());

    let run = argdump(&[output_arg.as_str()]).expect_exit(1);
    assert!(run.stderr.contains("argdump: I/O error"), "stderr:\n{}", run.stderr);
}

#[test]
fn smoke_debug_logging_reports_ignored_options() {
    ensure_binaries();
    let run = DumpRun::spawn_with_env(
        &argdump_binary(),
        &["--colour=red"],
        &[("RUST_LOG", "debug")],
    )
    .expect("failed to spawn argdump")
    .expect_exit(0);

    assert!(
        run.stderr.contains("unknown option ignored"),
        "stderr:\n{}",
        run.stderr
    );
}
