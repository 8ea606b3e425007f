//! Smoke tests for the `bootstrap` binary.
//!
//! Everything here runs offline: no runtime API is configured, so the binary
//! handles a single local event and prints the result to stdout.

use std::io::Write;
use std::process::{Command, Output};

fn bootstrap() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bootstrap"));
    cmd.env_clear();
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ── Help / basic CLI ──────────────────────────────────────────────────────────

#[test]
fn binary_responds_to_help() {
    let output = bootstrap()
        .arg("--help")
        .output()
        .expect("failed to execute bootstrap");
    assert!(output.status.success(), "bootstrap --help should exit 0");
    let help = stdout(&output);
    assert!(help.contains("--event-file"));
    assert!(help.contains("--single-loop"));
    assert!(help.contains("--list-handlers"));
}

#[test]
fn lists_registered_handlers() {
    let output = bootstrap()
        .arg("--list-handlers")
        .output()
        .expect("failed to execute bootstrap --list-handlers");
    assert!(output.status.success());
    let listed = stdout(&output);
    assert!(listed.lines().any(|l| l == "demo.Echo::handleRequest"));
    assert!(listed.lines().any(|l| l == "demo.Echo::upper"));
    assert!(listed.lines().any(|l| l == "demo.ByteCount::handleRequest"));
}

// ── Offline invocations ──────────────────────────────────────────────────────

#[test]
fn offline_event_from_environment() {
    let output = bootstrap()
        .env("HANDLER", "demo.Echo::upper")
        .env("LOCAL_EVENT", "quiet please")
        .output()
        .expect("failed to execute bootstrap");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output).trim_end(), "QUIET PLEASE");
}

#[test]
fn offline_event_from_file() {
    let mut event = tempfile::NamedTempFile::new().unwrap();
    write!(
        event,
        r#"{{"Records":[{{"body":"x","eventSourceARN":"arn:aws:sqs:us-east-1:1:orders"}}]}}"#
    )
    .unwrap();

    let output = bootstrap()
        .args(["--handler", "demo.QueueReport", "--event-file"])
        .arg(event.path())
        .output()
        .expect("failed to execute bootstrap");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "received 1 messages".to_string(),
            r#"{"messages":1,"sources":["arn:aws:sqs:us-east-1:1:orders"]}"#.to_string(),
        ]
    );
}

#[test]
fn json_log_format_wraps_lines() {
    let output = bootstrap()
        .env("HANDLER", "demo.Echo")
        .env("LOCAL_EVENT", "hello")
        .env("AWS_LAMBDA_LOG_FORMAT", "JSON")
        .output()
        .expect("failed to execute bootstrap");
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim_end(),
        r#"{"level":"INFO","message":"hello"}"#
    );
}

#[test]
fn handler_failure_is_logged_and_exits_cleanly() {
    let output = bootstrap()
        .env("HANDLER", "demo.Fail")
        .env("LOCAL_EVENT", r#"{"reason":"out of stock"}"#)
        .output()
        .expect("failed to execute bootstrap");
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim_end(), "out of stock");
}

#[test]
fn malformed_function_metadata_is_tolerated() {
    let output = bootstrap()
        .env("HANDLER", "demo.Echo::upper")
        .env("LOCAL_EVENT", "still running")
        .env("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "lots")
        .env("HANDLER_INSTANCE", "pooled")
        .env("RUNWAY_LOG", "warn")
        .output()
        .expect("failed to execute bootstrap");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    assert_eq!(stdout(&output).trim_end(), "STILL RUNNING");
    assert!(stderr.contains("AWS_LAMBDA_FUNCTION_MEMORY_SIZE"), "stderr: {stderr}");
}

#[test]
fn unknown_handler_fails_at_init() {
    let output = bootstrap()
        .env("HANDLER", "demo.Missing")
        .output()
        .expect("failed to execute bootstrap");
    assert!(!output.status.success(), "unknown handler should exit non-zero");
    assert!(stdout(&output).contains("Could not find handler method"));
}

#[test]
fn missing_event_file_is_reported() {
    let output = bootstrap()
        .args(["--handler", "demo.Echo", "--event-file", "/nonexistent/event.json"])
        .output()
        .expect("failed to execute bootstrap");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read event file"));
}
