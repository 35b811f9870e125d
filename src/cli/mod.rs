use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cytoprocess::stages::{RunContext, StageSummary, DEFAULT_EXTRA_FIELDS};

mod convert;
mod export;
mod extract;
mod features;
mod setup;
mod upload;

/// CytoProcess - flow-cytometry captures to EcoTaxa
#[derive(Parser)]
#[command(name = "cytoprocess")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Restrict processing to one sample (id, file name or path)
    #[arg(long, global = true, value_name = "SAMPLE")]
    sample: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project directory with a template config.toml
    Create {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },

    /// Create or update meta/samples.csv from the converted samples
    List {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Extra empty columns to add for custom metadata (comma-separated)
        #[arg(short = 'e', long, value_delimiter = ',', default_values = DEFAULT_EXTRA_FIELDS)]
        extra_fields: Vec<String>,
    },

    /// Convert raw .cyz captures to JSON with Cyz2Json
    Convert {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Converter binary (defaults to [converter] path or $CYZ2JSON)
        #[arg(long, value_name = "FILE")]
        converter: Option<PathBuf>,

        /// Overwrite existing JSON files
        #[arg(short, long)]
        force: bool,
    },

    /// Extract sample metadata from the instrument section
    ExtractMeta {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Only list the available metadata paths
        #[arg(short, long)]
        list: bool,

        /// Re-extract samples already in the metadata table
        #[arg(short, long)]
        force: bool,
    },

    /// Extract cytometric features of every particle
    ExtractCyto {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Only list the available parameter paths
        #[arg(short, long)]
        list: bool,

        /// Overwrite existing feature files
        #[arg(short, long)]
        force: bool,
    },

    /// Summarise pulse shapes with polynomial coefficients
    SummarisePulses {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Polynomial coefficients per channel (defaults to [pulses] n_poly)
        #[arg(short, long)]
        n_poly: Option<usize>,

        /// Overwrite existing pulse files
        #[arg(short, long)]
        force: bool,
    },

    /// Decode the particle images embedded in the JSON files
    ExtractImages {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Re-extract samples that already have images
        #[arg(short, long)]
        force: bool,
    },

    /// Segment particle images and compute their features
    ComputeFeatures {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Upper bound on worker threads (defaults to [features] max_cores)
        #[arg(short = 'j', long)]
        max_cores: Option<usize>,

        /// Overwrite existing feature files
        #[arg(short, long)]
        force: bool,
    },

    /// Assemble the EcoTaxa table and image archive of every sample
    Prepare {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Write only the .tsv table, without images
        #[arg(long)]
        only_tsv: bool,

        /// Overwrite existing EcoTaxa files
        #[arg(short, long)]
        force: bool,
    },

    /// Upload the prepared archives to EcoTaxa
    Upload {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Run every stage from convert to upload
    All {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Regenerate every existing output
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Delete the converted JSON files
    Cleanup {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },
}

/// EcoTaxa account and destination
#[derive(clap::Args)]
struct CredentialArgs {
    /// EcoTaxa username (prompted when needed)
    #[arg(short, long)]
    username: Option<String>,

    /// EcoTaxa password (prompted when needed)
    #[arg(short, long)]
    password: Option<String>,

    /// Destination project (defaults to [ecotaxa] project_id)
    #[arg(long)]
    project_id: Option<i64>,
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

/// One line per stage on stdout
fn print_summary(summary: &StageSummary) {
    println!(
        "{}: {} done, {} skipped, {} failed",
        summary.stage,
        summary.written.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let sample = cli.sample.as_deref();
    let context = |project: PathBuf, force: bool| RunContext::new(project, sample, force);

    match cli.command {
        Commands::Create { project } => setup::create(project),
        Commands::List {
            project,
            extra_fields,
        } => setup::list(context(project, false), extra_fields),
        Commands::Convert {
            project,
            converter,
            force,
        } => convert::run(context(project, force), converter),
        Commands::ExtractMeta {
            project,
            list,
            force,
        } => extract::meta(context(project, force), list),
        Commands::ExtractCyto {
            project,
            list,
            force,
        } => extract::cyto(context(project, force), list),
        Commands::SummarisePulses {
            project,
            n_poly,
            force,
        } => features::pulses(context(project, force), n_poly),
        Commands::ExtractImages { project, force } => extract::images(context(project, force)),
        Commands::ComputeFeatures {
            project,
            max_cores,
            force,
        } => features::images(context(project, force), max_cores),
        Commands::Prepare {
            project,
            only_tsv,
            force,
        } => export::run(context(project, force), only_tsv),
        Commands::Upload {
            project,
            credentials,
        } => upload::run(context(project, false), credentials.into()),
        Commands::All {
            project,
            force,
            credentials,
        } => upload::all(context(project, force), credentials.into()),
        Commands::Cleanup { project } => setup::cleanup(context(project, false)),
    }
}
