//! # CytoProcess
//!
//! `cytoprocess` turns flow-cytometry instrument captures (converted to JSON
//! by Cyz2Json) into the tables and image archives EcoTaxa imports, and
//! uploads them.
//!
//! ## Key Features
//!
//! - **Path-based extraction**: user-authored `config.toml` mappings pick
//!   metadata out of the nested instrument tree and cytometric features out
//!   of each particle's tagged parameter groups.
//!
//! - **Image features**: particle images are segmented and measured
//!   (area, axes, eccentricity, Feret diameter, intensity statistics) on a
//!   bounded worker pool.
//!
//! - **Pulse summaries**: every detector waveform becomes a fixed number of
//!   polynomial coefficients.
//!
//! - **Resumable stages**: every stage writes whole files atomically and
//!   skips outputs that already exist, so an interrupted batch resumes where
//!   it stopped.
//!
//! - **EcoTaxa delivery**: column limits per prefix group, typed TSV, scale-bar
//!   annotated images in one zip, and a job-polling upload client.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cytoprocess::stages::{self, RunContext};
//!
//! stages::create("cruise_2024".as_ref())?;
//! // ... copy captures into cruise_2024/raw and convert them ...
//!
//! let ctx = RunContext::new("cruise_2024", None, false);
//! stages::extract_meta(&ctx, false)?;
//! stages::extract_cyto(&ctx, false)?;
//! stages::summarise_pulses(&ctx, None)?;
//! stages::extract_images(&ctx)?;
//! stages::compute_features(&ctx, None)?;
//! let summary = stages::prepare(&ctx, false)?;
//! println!("{} bundle(s) written", summary.written.len());
//! # Ok::<(), cytoprocess::stages::StageError>(())
//! ```
//!
//! ## Project Layout
//!
//! ```text
//! cruise_2024/
//! ├── config.toml
//! ├── raw/<sample>.cyz
//! ├── converted/<sample>.json
//! ├── meta/samples.csv                 # custom per-sample metadata
//! ├── work/*.parquet                   # per-sample artifacts
//! ├── images/<sample>/<particleId>.png
//! └── ecotaxa/ecotaxa_<sample>.zip
//! ```
//!
//! ## Architecture
//!
//! - [`json`]: streamed section reading and path resolution
//! - [`config`]: `config.toml` mappings and settings
//! - [`table`]: in-memory feature tables and their Parquet/CSV persistence
//! - [`mapping`]: cytometric and metadata rows from the mappings
//! - [`pulses`]: waveform normalisation and polynomial fitting
//! - [`imaging`]: particle segmentation and region measurement
//! - [`pool`]: worker pool with per-task result-or-skip semantics
//! - [`export`]: merge, column governance, TSV and zip bundle
//! - [`upload`]: EcoTaxa REST client and import job monitoring
//! - [`stages`]: the batch driver behind each command

pub mod config;
pub mod export;
pub mod imaging;
pub mod json;
pub mod mapping;
pub mod pool;
pub mod project;
pub mod pulses;
pub mod stages;
pub mod table;
pub mod upload;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{ColumnMapping, MappingGroup, ProjectConfig};
    pub use crate::export::{ExportError, ExportOptions, PreflightReport};
    pub use crate::json::{Particle, ParticleImage, PulseShape};
    pub use crate::project::Project;
    pub use crate::stages::{ErrorKind, RunContext, StageError, StageSummary};
    pub use crate::table::{Cell, FeatureRow, FeatureTable};
    pub use crate::upload::{EcotaxaApi, HttpApi, ImportOutcome};
}
