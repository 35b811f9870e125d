use std::path::PathBuf;

use log::{debug, error, info, warn};

use super::{converted_samples, remediation, ErrorKind, RunContext, StageError, StageSummary};
use crate::imaging::process_image_file;
use crate::json::{read_section_as, Particle, PARTICLES_SECTION};
use crate::pool::WorkerPool;
use crate::pulses::{summarise_particle, PulseError};
use crate::table::{write_parquet, FeatureTable};

/// Summarise the pulse shapes of every particle, one artifact per sample.
///
/// `n_poly` overrides `[pulses] n_poly` from `config.toml`.
pub fn summarise_pulses(ctx: &RunContext, n_poly: Option<usize>) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("summarise-pulses", ctx);
    let n_poly = match n_poly {
        Some(n_poly) => n_poly,
        None => ctx.load_config()?.pulses.n_poly,
    };
    if n_poly == 0 {
        return Err(PulseError::InvalidCoefficientCount(n_poly).into());
    }
    debug!("Using {} polynomial coefficients", n_poly);

    let documents = converted_samples(ctx)?;
    info!("Processing {} .json file(s)", documents.len());

    for (sample, path) in documents {
        let artifact = ctx.project.pulses_artifact(&sample);
        if artifact.exists() && !ctx.force {
            summary.skip(&sample, &artifact);
            continue;
        }

        let particles = match read_section_as::<Vec<Particle>, _>(&path, PARTICLES_SECTION) {
            Ok(Some(particles)) if !particles.is_empty() => particles,
            Ok(_) => {
                warn!("No particles found in '{}'", sample);
                summary.failed.push((sample, "no particles".to_string()));
                continue;
            }
            Err(e) => {
                error!("{}", e);
                summary.failed.push((sample, e.to_string()));
                continue;
            }
        };
        debug!("Found {} particles in '{}'", particles.len(), sample);

        let mut rows = Vec::with_capacity(particles.len());
        for particle in &particles {
            if let Some(row) = summarise_particle(&sample, particle, n_poly)? {
                rows.push(row);
            }
        }
        if rows.is_empty() {
            warn!("No pulse shapes found in '{}'", sample);
            summary.failed.push((sample, "no pulse shapes".to_string()));
            continue;
        }

        let mut table = FeatureTable::from_rows(rows);
        table.sort_by_column("object_id")?;
        write_parquet(&table, &artifact)?;
        info!(
            "Saved pulse summaries of {} particles to {}",
            table.num_rows(),
            artifact.display()
        );
        summary.written.push(sample);
    }

    summary.finish(ErrorKind::ExtractionFailure)
}

/// Sample image directories under `images/`, sorted, honouring the filter
fn image_samples(ctx: &RunContext) -> Result<Vec<(String, PathBuf)>, StageError> {
    let images_dir = ctx.project.images_dir();
    if !images_dir.is_dir() {
        return Err(StageError::MissingInput {
            what: "Images directory".to_string(),
            path: images_dir,
            remediation: remediation(ctx, "extract-images"),
        });
    }

    let mut samples = Vec::new();
    for entry in std::fs::read_dir(&images_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if ctx.sample().is_some_and(|sample| sample != name) {
            continue;
        }
        samples.push((name.to_string(), path));
    }
    samples.sort();
    Ok(samples)
}

fn png_files(dir: &std::path::Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("png") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Segment and measure every particle image, one artifact per sample.
///
/// Images run on a bounded worker pool sized from `max_cores` (or
/// `[features] max_cores`). An image that fails, or panics its worker, is
/// logged and left out; the other images of the sample are kept.
pub fn compute_features(ctx: &RunContext, max_cores: Option<usize>) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("compute-features", ctx);
    let max_cores = match max_cores {
        Some(max_cores) => Some(max_cores),
        None if ctx.project.config_file().is_file() => ctx.load_config()?.features.max_cores,
        None => None,
    };

    let samples = image_samples(ctx)?;
    if samples.is_empty() {
        warn!("No image directories found in {}", ctx.project.images_dir().display());
        return summary.finish(ErrorKind::ExtractionFailure);
    }

    let pool = WorkerPool::new(max_cores)?;
    info!(
        "Computing image features for {} sample(s) on {} worker(s)",
        samples.len(),
        pool.workers()
    );

    for (sample, dir) in samples {
        let artifact = ctx.project.image_features_artifact(&sample);
        if artifact.exists() && !ctx.force {
            summary.skip(&sample, &artifact);
            continue;
        }

        let images = png_files(&dir)?;
        if images.is_empty() {
            warn!("No images found in {}", dir.display());
            summary.failed.push((sample, "no images".to_string()));
            continue;
        }
        info!("Processing {} images of '{}'", images.len(), sample);

        let outcome = pool.map_or_skip(images, |path| process_image_file(path, &sample));
        for skipped in &outcome.skipped {
            warn!("Skipping {}: {}", skipped.task.display(), skipped.reason);
        }
        if outcome.results.is_empty() {
            summary
                .failed
                .push((sample, "no particle found in any image".to_string()));
            continue;
        }

        let mut table = FeatureTable::from_rows(outcome.results);
        table.sort_by_column("object_id")?;
        write_parquet(&table, &artifact)?;
        info!(
            "Saved {} features for {} images to {} ({} skipped)",
            table.num_columns(),
            table.num_rows(),
            artifact.display(),
            outcome.skipped.len()
        );
        summary.written.push(sample);
    }

    summary.finish(ErrorKind::ExtractionFailure)
}
