//! # Stages
//!
//! Batch drivers behind each `cytoprocess` command. Every stage takes a
//! [`RunContext`] (project, optional sample filter, force flag), processes
//! the selected samples one after the other and reports a [`StageSummary`].
//!
//! | Stage | Reads | Writes |
//! |-------|-------|--------|
//! | [`create`] | | project layout, `config.toml` |
//! | [`convert`] | `raw/*.cyz` | `converted/*.json` |
//! | [`list_samples`] | `converted/*.json` | `meta/samples.csv` |
//! | [`extract_meta`] | `instrument` section | metadata artifact |
//! | [`extract_cyto`] | `particles` section | cytometric artifacts |
//! | [`summarise_pulses`] | `particles` section | pulse artifacts |
//! | [`extract_images`] | `images` section | `images/<sample>/*.png` |
//! | [`compute_features`] | particle images | image feature artifacts |
//! | [`prepare`] | all artifacts | `ecotaxa/ecotaxa_<sample>.zip` |
//! | [`upload`] | bundles | EcoTaxa import jobs |
//! | [`cleanup`] | | removes `converted/*.json` |
//!
//! Existing outputs are kept unless the context is forced, so re-running a
//! stage is a safe way to resume an interrupted batch.

mod convert;
mod deliver;
mod error;
mod extract;
mod features;
mod setup;


pub use convert::{convert, converter_command, resolve_converter};
pub use deliver::{prepare, run_all, upload, UploadOptions};
pub use error::{ErrorKind, StageError};
pub use extract::{extract_cyto, extract_images, extract_meta};
pub use features::{compute_features, summarise_pulses};
pub use setup::{cleanup, create, list_samples, DEFAULT_EXTRA_FIELDS};

use std::path::PathBuf;

use log::{info, warn};

use crate::config::ProjectConfig;
use crate::project::{normalize_sample, Project};

/// Explicit per-invocation state threaded through every stage
#[derive(Debug, Clone)]
pub struct RunContext {
    pub project: Project,
    sample: Option<String>,
    pub force: bool,
}

impl RunContext {
    /// Context for `root`; the sample filter is normalised to its id
    pub fn new<P: Into<PathBuf>>(root: P, sample: Option<&str>, force: bool) -> Self {
        Self {
            project: Project::new(root),
            sample: sample.map(normalize_sample),
            force,
        }
    }

    /// Normalised sample filter
    pub fn sample(&self) -> Option<&str> {
        self.sample.as_deref()
    }

    /// Same project and filter with another force flag
    pub fn with_force(&self, force: bool) -> Self {
        Self {
            force,
            ..self.clone()
        }
    }

    /// Load `config.toml`, failing with remediation guidance
    pub fn load_config(&self) -> Result<ProjectConfig, StageError> {
        Ok(self.project.load_config()?)
    }
}

/// Per-sample results of one stage run
#[derive(Debug, Default)]
pub struct StageSummary {
    pub stage: &'static str,
    pub written: Vec<String>,
    /// Samples whose output already existed
    pub skipped: Vec<String>,
    /// Samples that failed, with the cause
    pub failed: Vec<(String, String)>,
}

impl StageSummary {
    /// Empty summary, logging the stage start
    pub fn start(stage: &'static str, ctx: &RunContext) -> Self {
        match ctx.sample() {
            Some(sample) => info!(
                "Starting {} in project {} (sample '{}')",
                stage,
                ctx.project.root().display(),
                sample
            ),
            None => info!("Starting {} in project {}", stage, ctx.project.root().display()),
        }
        Self {
            stage,
            ..Self::default()
        }
    }

    /// Log the completion line and turn recorded failures into an error
    pub fn finish(self, kind: ErrorKind) -> Result<Self, StageError> {
        info!(
            "{} completed: {} written, {} skipped, {} failed",
            self.stage,
            self.written.len(),
            self.skipped.len(),
            self.failed.len()
        );
        if self.failed.is_empty() {
            return Ok(self);
        }
        for (sample, reason) in &self.failed {
            warn!("{}: '{}' failed: {}", self.stage, sample, reason);
        }
        Err(StageError::Failures {
            stage: self.stage,
            kind,
            failed: self.failed,
        })
    }

    pub(crate) fn skip(&mut self, sample: &str, output: &std::path::Path) {
        info!(
            "Skipping '{}', {} already exists (use --force to overwrite)",
            sample,
            output.display()
        );
        self.skipped.push(sample.to_string());
    }
}

/// Command line that produces a missing input
pub(crate) fn remediation(ctx: &RunContext, command: &str) -> String {
    match ctx.sample() {
        Some(sample) => format!(
            "run `cytoprocess --sample {} {} {}` first",
            sample,
            command,
            ctx.project.root().display()
        ),
        None => format!("run `cytoprocess {} {}` first", command, ctx.project.root().display()),
    }
}

/// Samples with a converted document, or a missing-input error naming `convert`
pub(crate) fn converted_samples(ctx: &RunContext) -> Result<Vec<(String, PathBuf)>, StageError> {
    let dir = ctx.project.converted_dir();
    if !dir.is_dir() {
        return Err(StageError::MissingInput {
            what: "Converted directory".to_string(),
            path: dir,
            remediation: remediation(ctx, "convert"),
        });
    }
    Ok(ctx.project.json_samples(ctx.sample())?)
}
