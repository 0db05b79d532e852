//! End-to-end runs of the `brigade` binary.

use std::process::{Command, Output};

fn brigade(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_brigade"));
    for var in [
        "BRIGADE_ORDERS",
        "BRIGADE_RUNTIME",
        "BRIGADE_WAITERS",
        "BRIGADE_CHEFS",
        "BRIGADE_SEED",
        "BRIGADE_DEADLINE_MS",
        "BRIGADE_LOG_FORMAT",
    ] {
        command.env_remove(var);
    }
    command
        .env("RUST_LOG", "info")
        .args(args)
        .output()
        .expect("failed to run brigade binary")
}

fn line<'a>(stdout: &'a str, key: &str) -> &'a str {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
        .unwrap_or_else(|| panic!("{key} line missing from:\n{stdout}"))
}

#[test]
fn default_run_delivers_five_orders() {
    let output = brigade(&[]);
    assert!(
        output.status.success(),
        "brigade exited with {:?}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RUN SUMMARY"), "summary missing");
    assert_eq!(line(&stdout, "runtime"), "threads");
    assert_eq!(line(&stdout, "orders"), "5");
    assert_eq!(line(&stdout, "tickets"), "5");
    assert_eq!(line(&stdout, "dishes"), "5");
    assert_eq!(line(&stdout, "delivered"), "5");

    // Stage events are logged, not printed.
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("cooks order").count(), 5, "{stderr}");
    assert!(!stdout.contains("cooks order"));
}

#[test]
fn tokio_run_prints_json_summary() {
    let output = brigade(&[
        "--orders",
        "50",
        "--runtime",
        "tokio",
        "--seed",
        "9",
        "--log-format",
        "json",
        "--summary-json",
    ]);
    assert!(output.status.success(), "{output:?}");

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not a JSON summary");
    assert_eq!(summary["runtime"], "tokio");
    assert_eq!(summary["orders"], 50);
    assert_eq!(summary["delivered"], 50);

    for part in ["intakes", "cooked", "deliveries"] {
        let total: u64 = summary["tally"][part]
            .as_object()
            .unwrap()
            .values()
            .map(|count| count.as_u64().unwrap())
            .sum();
        assert_eq!(total, 50, "{part}");
    }
}

#[test]
fn custom_rosters_are_the_only_workers() {
    let output = brigade(&[
        "--orders",
        "20",
        "--waiters",
        "Ana,Ben",
        "--chefs",
        "Remy",
        "--summary-json",
    ]);
    assert!(output.status.success(), "{output:?}");

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["tally"]["cooked"]["Remy"], 20);
    for part in ["intakes", "deliveries"] {
        for waiter in summary["tally"][part].as_object().unwrap().keys() {
            assert!(waiter == "Ana" || waiter == "Ben", "{waiter}");
        }
    }
}

#[test]
fn zero_orders_is_a_clean_run() {
    let output = brigade(&["--orders", "0"]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(line(&stdout, "delivered"), "0");
    assert_eq!(line(&stdout, "tickets"), "0");
}

#[test]
fn overlapping_rosters_fail_before_running() {
    let output = brigade(&["--waiters", "A,Bob"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("both rosters"), "{stderr}");
}

#[test]
fn deadline_is_rejected_on_threads() {
    let output = brigade(&["--deadline-ms", "100"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tokio runtime"));
}
