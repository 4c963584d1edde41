use anyhow::Context as _;
use std::io::Write as _;
use std::path::Path;

use meterkit_metrics::MetricsSnapshot;

use crate::cli::OutputFormat;

/// Renders a snapshot as newline-terminated text in the requested format.
pub(crate) fn render(snapshot: &MetricsSnapshot, format: OutputFormat) -> anyhow::Result<String> {
    let mut text = match format {
        OutputFormat::Json => snapshot.to_json(false).context("encode json snapshot")?,
        OutputFormat::JsonPretty => snapshot.to_json(true).context("encode json snapshot")?,
        OutputFormat::Otel => snapshot
            .to_open_telemetry_json_lines()
            .context("encode otel json lines")?
            .join("\n"),
        OutputFormat::Prometheus => return Ok(snapshot.to_prometheus_text()),
    };
    if !text.is_empty() {
        text.push('\n');
    }
    Ok(text)
}

/// Writes to `out`, or to stdout when no path is given.
pub(crate) fn emit(text: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write output: {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to write to stdout")
        }
    }
}
