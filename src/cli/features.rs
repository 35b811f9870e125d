use anyhow::{Context, Result};

use cytoprocess::stages::{self, RunContext};

use super::print_summary;

/// Summarise pulse shapes
pub fn pulses(ctx: RunContext, n_poly: Option<usize>) -> Result<()> {
    let summary = stages::summarise_pulses(&ctx, n_poly).context("Pulse summarisation failed")?;
    print_summary(&summary);
    Ok(())
}

/// Segment and measure particle images
pub fn images(ctx: RunContext, max_cores: Option<usize>) -> Result<()> {
    let summary =
        stages::compute_features(&ctx, max_cores).context("Image feature computation failed")?;
    print_summary(&summary);
    Ok(())
}
