use std::path::PathBuf;

use super::{PreflightCheck, PreflightReport};
use crate::project::Project;
use crate::table::FeatureTable;

/// Per-sample inputs of the export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Metadata,
    Cytometric,
    Pulses,
    ImageFeatures,
    Images,
}

impl Artifact {
    /// Every artifact required for a sample, in pipeline order
    pub const REQUIRED: [Artifact; 5] = [
        Artifact::Metadata,
        Artifact::Cytometric,
        Artifact::Pulses,
        Artifact::Images,
        Artifact::ImageFeatures,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Artifact::Metadata => "instrument metadata",
            Artifact::Cytometric => "cytometric features",
            Artifact::Pulses => "pulse features",
            Artifact::ImageFeatures => "image features",
            Artifact::Images => "particle images",
        }
    }

    /// Subcommand that produces the artifact
    pub fn command(&self) -> &'static str {
        match self {
            Artifact::Metadata => "extract-meta",
            Artifact::Cytometric => "extract-cyto",
            Artifact::Pulses => "summarise-pulses",
            Artifact::ImageFeatures => "compute-features",
            Artifact::Images => "extract-images",
        }
    }

    pub fn path(&self, project: &Project, sample: &str) -> PathBuf {
        match self {
            Artifact::Metadata => project.metadata_artifact(),
            Artifact::Cytometric => project.cytometric_artifact(sample),
            Artifact::Pulses => project.pulses_artifact(sample),
            Artifact::ImageFeatures => project.image_features_artifact(sample),
            Artifact::Images => project.image_dir(sample),
        }
    }

    /// Command line that produces the artifact for one sample
    pub fn remediation(&self, project: &Project, sample: Option<&str>) -> String {
        match sample {
            Some(sample) => format!(
                "run `cytoprocess --sample {} {} {}`",
                sample,
                self.command(),
                project.root().display()
            ),
            None => format!("run `cytoprocess {} {}`", self.command(), project.root().display()),
        }
    }
}

fn has_metadata_row(metadata: Option<&FeatureTable>, sample: &str) -> bool {
    metadata
        .and_then(|table| table.column("sample_id"))
        .map(|mut ids| ids.any(|id| id.render() == sample))
        .unwrap_or(false)
}

/// Check that every sample of the batch has all of its export inputs.
///
/// With no samples and no metadata artifact, the batch cannot even be
/// enumerated and the report carries a single project-level failure.
pub fn preflight(project: &Project, samples: &[String], metadata: Option<&FeatureTable>) -> PreflightReport {
    let mut report = PreflightReport::new(project.root().display().to_string());

    if samples.is_empty() {
        let artifact = Artifact::Metadata;
        if metadata.is_none() {
            report.add_check(PreflightCheck::failed(
                artifact.description(),
                format!(
                    "{} not found; {}",
                    artifact.path(project, "").display(),
                    artifact.remediation(project, None)
                ),
            ));
        }
        return report;
    }

    if !project.samples_csv().is_file() {
        report.add_check(PreflightCheck::warning(
            "custom sample metadata",
            format!("{} not found; exporting without it", project.samples_csv().display()),
        ));
    }

    for sample in samples {
        for artifact in Artifact::REQUIRED {
            let name = format!("{}: {}", sample, artifact.description());
            let path = artifact.path(project, sample);
            let present = match artifact {
                Artifact::Metadata => has_metadata_row(metadata, sample),
                Artifact::Images => path.is_dir(),
                _ => path.is_file(),
            };

            if present {
                report.add_check(PreflightCheck::ok(name));
            } else {
                let what = match artifact {
                    Artifact::Metadata => format!("no row for '{}' in {}", sample, path.display()),
                    _ => format!("{} not found", path.display()),
                };
                report.add_check(PreflightCheck::failed(
                    name,
                    format!("{}; {}", what, artifact.remediation(project, Some(sample))),
                ));
            }
        }
    }

    report
}
