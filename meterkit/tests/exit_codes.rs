use std::process::{Command, Output};

use anyhow::Context as _;

fn status_code(out: &Output) -> i32 {
    out.status.code().unwrap_or(-1)
}

fn meterkit(args: &[&str]) -> anyhow::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_meterkit"))
        .args(args)
        .output()
        .context("run meterkit binary")
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = meterkit(&["demo", "--sla", "10x"])?;
    ensure_code(&out, 30)?;

    let out = meterkit(&["demo", "--percentile", "0"])?;
    ensure_code(&out, 30)
}

#[test]
fn missing_snapshot_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let missing = dir.path().join("nope.json");
    let out = meterkit(&["convert", &missing.to_string_lossy()])?;
    ensure_code(&out, 30)
}

#[test]
fn malformed_snapshot_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{\"points\": 3}").context("write snapshot")?;

    let out = meterkit(&["convert", &path.to_string_lossy()])?;
    ensure_code(&out, 30)
}

#[test]
fn demo_then_convert_to_prometheus() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let snapshot = dir.path().join("snapshot.json");
    let snapshot_arg = snapshot.to_string_lossy().to_string();

    let out = meterkit(&[
        "demo",
        "--threads",
        "2",
        "--iterations",
        "7",
        "--percentile",
        "0.5",
        "--sla",
        "1s",
        "--format",
        "json",
        "--out",
        &snapshot_arg,
    ])?;
    ensure_code(&out, 0)?;
    anyhow::ensure!(out.stdout.is_empty(), "stdout should be empty with --out");

    let out = meterkit(&["convert", &snapshot_arg, "--format", "prometheus"])?;
    ensure_code(&out, 0)?;

    let text = String::from_utf8(out.stdout).context("prometheus output is utf-8")?;
    for expected in [
        "demo_op_total{route=\"demo\"} 14",
        "demo_op_success{route=\"demo\"} 12",
        "demo_op_failure{exception=\"Rejected\",route=\"demo\"} 2",
        "demo_latency_count{route=\"demo\",sla=\"1000\"} 14",
        "demo_in_flight 0",
    ] {
        anyhow::ensure!(
            text.lines().any(|l| l == expected),
            "missing line {expected:?} in:\n{text}"
        );
    }

    Ok(())
}

#[test]
fn demo_otel_prints_json_lines() -> anyhow::Result<()> {
    let out = meterkit(&["demo", "--threads", "1", "--iterations", "3", "--format", "otel"])?;
    ensure_code(&out, 0)?;

    let text = String::from_utf8(out.stdout).context("otel output is utf-8")?;
    let mut lines = 0;
    for line in text.lines() {
        let v: serde_json::Value = serde_json::from_str(line).context("parse otel line")?;
        anyhow::ensure!(v.get("name").is_some(), "line without name: {line}");
        lines += 1;
    }
    anyhow::ensure!(lines > 0, "no otel lines");
    Ok(())
}
