//! # CytoProcess
//!
//! Command-line driver turning flow-cytometry captures into EcoTaxa bundles.
//!
//! ## Usage
//!
//! ```bash
//! # Bootstrap a project, then copy the .cyz files into cruise/raw
//! cytoprocess create cruise
//!
//! # Run everything from conversion to upload
//! cytoprocess -v all cruise
//!
//! # Or stage by stage, for one sample
//! cytoprocess --sample station_1 extract-cyto cruise
//! cytoprocess --sample station_1 prepare --force cruise
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
