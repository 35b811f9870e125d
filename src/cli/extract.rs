use anyhow::{Context, Result};

use cytoprocess::stages::{self, RunContext};

use super::print_summary;

/// Extract sample metadata, or list the available paths
pub fn meta(ctx: RunContext, list: bool) -> Result<()> {
    let summary = stages::extract_meta(&ctx, list).context("Metadata extraction failed")?;
    print_summary(&summary);
    if list {
        println!("Metadata paths: {}", ctx.project.metadata_keys_file().display());
    }
    Ok(())
}

/// Extract cytometric features, or list the available paths
pub fn cyto(ctx: RunContext, list: bool) -> Result<()> {
    let summary = stages::extract_cyto(&ctx, list).context("Cytometric feature extraction failed")?;
    print_summary(&summary);
    if list {
        println!(
            "Cytometric feature paths: {}",
            ctx.project.cytometry_features_file().display()
        );
    }
    Ok(())
}

/// Decode the embedded particle images
pub fn images(ctx: RunContext) -> Result<()> {
    let summary = stages::extract_images(&ctx).context("Image extraction failed")?;
    print_summary(&summary);
    Ok(())
}
