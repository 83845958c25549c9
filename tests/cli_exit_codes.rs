#![cfg(unix)]

use p2p_sweep::error::{EXIT_ABORTED, EXIT_USAGE};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;
use tempfile::TempDir;

/// Launcher stand-in. It prints a result file for the size after `-msgsz`,
/// or only the header when `STUB_MODE=empty`.
const LAUNCHER_SCRIPT: &str = r##"#!/bin/sh
echo "#bytes #repetitions t[usec] Mbytes/sec msg/sec"
if [ "$STUB_MODE" = "empty" ]; then
    exit 0
fi
echo "${10} $8 2.0 42.5 500000"
"##;

/// Written once per test binary so no test executes a script another thread
/// still has open for writing.
fn launcher() -> &'static Path {
    static LAUNCHER: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = LAUNCHER.get_or_init(|| {
        let dir = tempfile::tempdir().expect("create launcher dir");
        let path = dir.path().join("fake-smpirun");
        std::fs::write(&path, LAUNCHER_SCRIPT).expect("write launcher");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("make launcher executable");
        (dir, path)
    });
    path
}

fn sweep(work_dir: &Path, mode: &str, positionals: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_p2p-sweep"))
        .arg("--launcher")
        .arg(launcher())
        .arg("--work-dir")
        .arg(work_dir)
        .args(positionals)
        .env("STUB_MODE", mode)
        .env_remove("RUST_LOG")
        .output()
        .expect("run p2p-sweep")
}

const TWO_SIZES: [&str; 8] = [
    "summit_temp.so",
    "hostfile.txt",
    "IMB-P2P",
    "PingPong",
    "0.1,0.1",
    "5",
    "64,1048576",
    "--log=root.threshold:error",
];

#[test]
fn successful_sweep_prints_only_the_result_line() {
    let dir = tempfile::tempdir().unwrap();
    let output = sweep(dir.path(), "normal", &TWO_SIZES);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "42.50 42.50\n");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[1] Benchmarking with 1048576 byte"));
    assert!(stderr.contains("Result: 42.50 42.50"));
}

#[test]
fn empty_result_file_aborts_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let output = sweep(dir.path(), "empty", &TWO_SIZES);

    assert_eq!(output.status.code(), Some(i32::from(EXIT_ABORTED)));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr)
        .contains("expected exactly 1 record, parsed 0"));
}

#[test]
fn too_few_positionals_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = sweep(dir.path(), "normal", &TWO_SIZES[..6]);

    assert_eq!(output.status.code(), Some(i32::from(EXIT_USAGE)));
    assert!(output.stdout.is_empty());
}

#[test]
fn mismatched_lists_are_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut positionals = TWO_SIZES;
    positionals[4] = "0.1";
    let output = sweep(dir.path(), "normal", &positionals);

    assert_eq!(output.status.code(), Some(i32::from(EXIT_USAGE)));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("2 message sizes but 1 thresholds"));
}

#[test]
fn oversized_timeout_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_p2p-sweep"))
        .args(["--timeout", "1e300h"])
        .args(TWO_SIZES)
        .current_dir(dir.path())
        .output()
        .expect("run p2p-sweep");

    assert_eq!(output.status.code(), Some(i32::from(EXIT_USAGE)));
    assert!(output.stdout.is_empty());
}
