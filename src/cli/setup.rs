use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use cytoprocess::stages::{self, RunContext};

use super::print_summary;

/// Bootstrap a project directory
pub fn create(project: PathBuf) -> Result<()> {
    info!("CytoProcess - create project");
    let created = stages::create(&project)
        .with_context(|| format!("Failed to create project in {}", project.display()))?;

    println!("Project created in {}", created.root().display());
    println!("  1. copy the .cyz files into {}", created.raw_dir().display());
    println!("  2. edit {}", created.config_file().display());
    Ok(())
}

/// Create or update meta/samples.csv
pub fn list(ctx: RunContext, extra_fields: Vec<String>) -> Result<()> {
    let extra_fields: Vec<String> = extra_fields
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();

    let summary = stages::list_samples(&ctx, &extra_fields).context("Failed to list samples")?;
    print_summary(&summary);
    println!("Custom metadata: {}", ctx.project.samples_csv().display());
    Ok(())
}

/// Delete the converted JSON files
pub fn cleanup(ctx: RunContext) -> Result<()> {
    let summary = stages::cleanup(&ctx).context("Cleanup failed")?;
    print_summary(&summary);
    Ok(())
}
