use anyhow::Context as _;

use meterkit_metrics::MetricsSnapshot;

use crate::cli::ConvertArgs;
use crate::cmd_error::CmdError;
use crate::output;

pub fn convert(args: ConvertArgs) -> Result<(), CmdError> {
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read snapshot: {}", args.input.display()))
        .map_err(CmdError::invalid_input)?;

    let snapshot = MetricsSnapshot::from_json(&text)
        .with_context(|| format!("invalid snapshot json: {}", args.input.display()))
        .map_err(CmdError::invalid_input)?;
    tracing::debug!(points = snapshot.len(), input = %args.input.display(), "loaded snapshot");

    let rendered = output::render(&snapshot, args.format).map_err(CmdError::runtime)?;
    output::emit(&rendered, args.out.as_deref()).map_err(CmdError::runtime)
}
