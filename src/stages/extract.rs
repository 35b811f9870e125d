use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::path::Path;

use base64::prelude::*;
use log::{debug, error, info, warn};

use super::{converted_samples, ErrorKind, RunContext, StageError, StageSummary};
use crate::config::{ConfigError, MappingGroup};
use crate::json::{
    discover_paths, discover_tagged_paths, read_section, read_section_as, Particle, ParticleImage,
    DESCRIPTION_TAG, IMAGES_SECTION, INSTRUMENT_SECTION, PARTICLES_SECTION,
};
use crate::mapping::{cytometric_table, merge_metadata, metadata_row};
use crate::table::{read_parquet, write_atomically, write_parquet, Cell, FeatureTable};

/// Write a sorted, deduplicated path catalogue, one path per line
fn write_catalogue(path: &Path, entries: &BTreeSet<String>) -> Result<(), StageError> {
    write_atomically(path, |file| -> Result<(), std::io::Error> {
        for entry in entries {
            writeln!(file, "{}", entry)?;
        }
        Ok(())
    })?;
    info!("{} path(s) written to {}", entries.len(), path.display());
    Ok(())
}

/// Extract the per-sample metadata row of every converted document into the
/// cumulative metadata artifact.
///
/// With `list`, only writes the catalogue of instrument metadata paths.
/// Samples already in the artifact are skipped unless forced; extracted rows
/// replace older rows of the same sample.
pub fn extract_meta(ctx: &RunContext, list: bool) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("extract-meta", ctx);
    let documents = converted_samples(ctx)?;
    info!("Processing {} .json file(s)", documents.len());

    if list {
        let mut keys = BTreeSet::new();
        for (sample, path) in documents {
            match read_section(&path, INSTRUMENT_SECTION) {
                Ok(Some(instrument)) => {
                    let paths = discover_paths(&instrument);
                    info!("Found {} metadata items in '{}'", paths.len(), sample);
                    keys.extend(paths);
                    summary.written.push(sample);
                }
                Ok(None) => summary.failed.push((sample, "no 'instrument' section".to_string())),
                Err(e) => {
                    error!("{}", e);
                    summary.failed.push((sample, e.to_string()));
                }
            }
        }
        write_catalogue(&ctx.project.metadata_keys_file(), &keys)?;
        return summary.finish(ErrorKind::MalformedSource);
    }

    let config = ctx.load_config()?;
    if MappingGroup::METADATA
        .iter()
        .all(|group| config.mapping(*group).is_empty())
    {
        return Err(ConfigError::EmptyMapping("sample], [acq] or [process".to_string()).into());
    }

    let artifact = ctx.project.metadata_artifact();
    let existing = if artifact.is_file() {
        Some(read_parquet(&artifact)?)
    } else {
        None
    };
    let present: HashSet<String> = existing
        .as_ref()
        .and_then(|table| table.column("sample_id"))
        .map(|ids| ids.map(Cell::render).collect())
        .unwrap_or_default();

    let mut rows = Vec::new();
    for (sample, path) in documents {
        if present.contains(&sample) && !ctx.force {
            summary.skip(&sample, &artifact);
            continue;
        }
        match read_section(&path, INSTRUMENT_SECTION) {
            Ok(Some(instrument)) => {
                debug!("Extracting metadata of '{}'", sample);
                rows.push(metadata_row(&sample, &instrument, &config));
                summary.written.push(sample);
            }
            Ok(None) => summary.failed.push((sample, "no 'instrument' section".to_string())),
            Err(e) => {
                error!("{}", e);
                summary.failed.push((sample, e.to_string()));
            }
        }
    }

    if !rows.is_empty() {
        let merged = merge_metadata(existing, FeatureTable::from_rows(rows))?;
        write_parquet(&merged, &artifact)?;
        info!(
            "Saved metadata of {} sample(s) to {}",
            merged.num_rows(),
            artifact.display()
        );
    }

    summary.finish(ErrorKind::MalformedSource)
}

/// Extract the mapped cytometric features of every particle, one artifact per
/// sample.
///
/// With `list`, only writes the catalogue of parameter paths found in the
/// first particle of each document.
pub fn extract_cyto(ctx: &RunContext, list: bool) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("extract-cyto", ctx);
    let documents = converted_samples(ctx)?;
    info!("Processing {} .json file(s)", documents.len());

    if list {
        let mut paths = BTreeSet::new();
        for (sample, path) in documents {
            match read_section_as::<Vec<Particle>, _>(&path, PARTICLES_SECTION) {
                Ok(Some(particles)) => match particles.first() {
                    Some(first) if !first.parameters.is_empty() => {
                        paths.extend(discover_tagged_paths(&first.parameters, &DESCRIPTION_TAG));
                        summary.written.push(sample);
                    }
                    _ => {
                        warn!("No parameters found in first particle of '{}'", sample);
                        summary.skipped.push(sample);
                    }
                },
                Ok(None) => summary.failed.push((sample, "no 'particles' section".to_string())),
                Err(e) => {
                    error!("{}", e);
                    summary.failed.push((sample, e.to_string()));
                }
            }
        }
        if paths.is_empty() {
            error!("No parameter paths found in any JSON file");
        } else {
            write_catalogue(&ctx.project.cytometry_features_file(), &paths)?;
            info!("Use these paths in the [object] table of config.toml");
        }
        return summary.finish(ErrorKind::MalformedSource);
    }

    let config = ctx.load_config()?;
    if config.object.is_empty() {
        return Err(ConfigError::EmptyMapping("object".to_string()).into());
    }
    debug!("Found {} mappings in [object]", config.object.len());

    for (sample, path) in documents {
        let artifact = ctx.project.cytometric_artifact(&sample);
        if artifact.exists() && !ctx.force {
            summary.skip(&sample, &artifact);
            continue;
        }

        let particles = match read_section_as::<Vec<Particle>, _>(&path, PARTICLES_SECTION) {
            Ok(Some(particles)) => particles,
            Ok(None) => {
                summary.failed.push((sample, "no 'particles' section".to_string()));
                continue;
            }
            Err(e) => {
                error!("{}", e);
                summary.failed.push((sample, e.to_string()));
                continue;
            }
        };

        let table = cytometric_table(&sample, &particles, &config.object);
        if table.is_empty() {
            warn!("No particle with parameters in '{}'", sample);
            summary.failed.push((sample, "no particle with parameters".to_string()));
            continue;
        }
        write_parquet(&table, &artifact)?;
        info!(
            "Saved {} features for {} particles to {}",
            table.num_columns(),
            table.num_rows(),
            artifact.display()
        );
        summary.written.push(sample);
    }

    summary.finish(ErrorKind::MalformedSource)
}

fn holds_png(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("png"))
        })
        .unwrap_or(false)
}

/// Decode the embedded particle images to `images/<sample>/<particleId>.png`.
///
/// A sample whose image directory already holds PNGs is skipped unless
/// forced. Entries without an id or data, or with undecodable data, are
/// logged and skipped.
pub fn extract_images(ctx: &RunContext) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("extract-images", ctx);
    let documents = converted_samples(ctx)?;
    info!("Processing {} .json file(s)", documents.len());

    let mut total = 0;
    for (sample, path) in documents {
        let dir = ctx.project.image_dir(&sample);
        if holds_png(&dir) && !ctx.force {
            summary.skip(&sample, &dir);
            continue;
        }

        let images = match read_section_as::<Vec<ParticleImage>, _>(&path, IMAGES_SECTION) {
            Ok(Some(images)) => images,
            Ok(None) => {
                summary.failed.push((sample, "no 'images' section".to_string()));
                continue;
            }
            Err(e) => {
                error!("{}", e);
                summary.failed.push((sample, e.to_string()));
                continue;
            }
        };

        std::fs::create_dir_all(&dir)?;
        let mut count = 0;
        for image in &images {
            if image.particle_id.is_null() {
                warn!("Image item missing 'particleId' in '{}'", sample);
                continue;
            }
            let Some(data) = image.base64.as_deref() else {
                warn!("Image item {} missing 'base64' data in '{}'", image.key(), sample);
                continue;
            };
            let bytes = match BASE64_STANDARD.decode(data) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        "Failed to decode base64 for particle {} in '{}': {}",
                        image.key(),
                        sample,
                        e
                    );
                    continue;
                }
            };

            let output = dir.join(format!("{}.png", image.key()));
            write_atomically(&output, |file| file.write_all(&bytes))?;
            count += 1;
        }

        info!("Extracted {} images from '{}'", count, sample);
        total += count;
        summary.written.push(sample);
    }

    info!("Total images extracted: {}", total);
    summary.finish(ErrorKind::MalformedSource)
}
