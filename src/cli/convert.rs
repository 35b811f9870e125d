use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use cytoprocess::stages::{self, RunContext};

use super::print_summary;

/// Convert raw captures to JSON
pub fn run(ctx: RunContext, converter: Option<PathBuf>) -> Result<()> {
    let converter = match converter {
        Some(converter) => converter,
        None => stages::resolve_converter(&ctx)?,
    };
    if !converter.exists() {
        anyhow::bail!("Converter does not exist: {}", converter.display());
    }

    info!("CytoProcess - convert");
    info!("Converter: {}", converter.display());
    if ctx.force {
        info!("Existing JSON files will be overwritten");
    }

    let summary = stages::convert(&ctx, &converter).context("Conversion failed")?;
    print_summary(&summary);
    Ok(())
}
