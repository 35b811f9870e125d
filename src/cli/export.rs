use anyhow::{Context, Result};
use log::info;

use cytoprocess::export::{ExportError, PreflightReport};
use cytoprocess::stages::{self, RunContext, StageError};

use super::print_summary;

fn print_report(report: &PreflightReport) {
    #[cfg(feature = "colorized_output")]
    {
        println!("{}", report.format_colored());
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("{}", report);
    }
}

/// Assemble the EcoTaxa files
pub fn run(ctx: RunContext, only_tsv: bool) -> Result<()> {
    info!("CytoProcess - prepare EcoTaxa files");

    match stages::prepare(&ctx, only_tsv) {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(StageError::Export(ExportError::Preflight(report))) => {
            print_report(&report);
            anyhow::bail!(
                "{} input(s) missing, nothing was written; run the stages named above first",
                report.failure_count()
            )
        }
        Err(e) => Err(e).context("Export failed"),
    }
}
