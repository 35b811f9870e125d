//! # EcoTaxa Export
//!
//! Assembles the per-sample work artifacts into the table EcoTaxa imports,
//! optionally bundled with the particle images into a zip archive.
//!
//! ## Pipeline
//!
//! 1. [`preflight`]: every sample of the batch must have its instrument
//!    metadata row, cytometric, pulse and image feature artifacts and its
//!    image directory. Any gap aborts the batch before anything is written.
//! 2. [`merge_sample`]: left joins anchored on the cytometric table, so every
//!    particle survives even without pulses or image features.
//! 3. [`derive_image_columns`]: `img_file_name` and `img_rank`.
//! 4. [`govern_columns`]: prefix grouping and per-group column limits.
//! 5. [`write_tsv`]: names row, `[f]`/`[t]` type row, data rows.
//! 6. [`write_bundle`]: table plus scale-bar annotated images in one zip.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cytoprocess::config::ProjectConfig;
//! use cytoprocess::export::{prepare, ExportOptions};
//! use cytoprocess::project::Project;
//!
//! let project = Project::new("cruise_2024");
//! let config = ProjectConfig::default();
//! let summary = prepare(&project, &config.export, None, ExportOptions::default())?;
//! println!("{} sample(s) written", summary.written.len());
//! # Ok::<(), cytoprocess::export::ExportError>(())
//! ```

mod bundle;
mod error;
mod governance;
mod preflight;
mod report;
mod tsv;

#[cfg(test)]
mod tests;

pub use bundle::{annotate_with_scale_bar, scale_bar_length, write_bundle, SCALE_STRIP_HEIGHT};
pub use error::ExportError;
pub use governance::{
    govern_columns, ColumnGroup, ColumnLimits, GovernedColumns, TruncationNotice,
};
pub use preflight::{preflight, Artifact};
pub use report::{CheckStatus, PreflightCheck, PreflightReport};
pub use tsv::{column_type_tag, type_row, write_tsv, write_tsv_file, NUMERIC_TAG, TEXT_TAG};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::config::ExportSettings;
use crate::project::Project;
use crate::table::{read_csv, read_parquet, Cell, CsvCells, FeatureTable, TableError};

const OBJECT_KEYS: [&str; 2] = ["sample_id", "object_id"];
const SAMPLE_KEY: [&str; 1] = ["sample_id"];

/// Switches of one export run
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Regenerate outputs that already exist
    pub force: bool,
    /// Write the bare `.tsv` instead of the zip bundle
    pub only_tsv: bool,
}

/// What happened to one sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Written {
        path: PathBuf,
        objects: usize,
        columns: usize,
        /// Images archived; `None` for a bare table
        images: Option<usize>,
    },
    /// Output already present and not forced
    Skipped(PathBuf),
}

/// Per-sample results of a [`prepare`] run
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    /// Samples that failed, with the cause
    pub failed: Vec<(String, String)>,
}

/// Samples of an export batch: the filter, or every sample of the metadata
/// artifact in table order.
pub fn batch_samples(metadata: Option<&FeatureTable>, filter: Option<&str>) -> Vec<String> {
    if let Some(sample) = filter {
        return vec![sample.to_string()];
    }
    let Some(ids) = metadata.and_then(|table| table.column("sample_id")) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    ids.map(Cell::render)
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// The user's `meta/samples.csv`, if present
pub fn load_custom_metadata(project: &Project) -> Result<Option<FeatureTable>, ExportError> {
    let path = project.samples_csv();
    if !path.is_file() {
        return Ok(None);
    }
    let table = read_csv(&path, b',', CsvCells::Typed { keys: &SAMPLE_KEY })?;
    if !table.has_column("sample_id") {
        warn!("{} has no sample_id column; ignored", path.display());
        return Ok(None);
    }
    Ok(Some(table))
}

/// Merge the artifacts of one sample, anchored on its cytometric table
pub fn merge_sample(
    project: &Project,
    sample: &str,
    metadata: &FeatureTable,
    custom: Option<&FeatureTable>,
) -> Result<FeatureTable, ExportError> {
    let cytometric = read_parquet(&project.cytometric_artifact(sample))?;
    let pulses = read_parquet(&project.pulses_artifact(sample))?;
    let image_features = read_parquet(&project.image_features_artifact(sample))?;

    let mut merged = cytometric
        .left_join(&pulses, &OBJECT_KEYS)?
        .left_join(&image_features, &OBJECT_KEYS)?
        .left_join(&metadata.filter_eq("sample_id", sample)?, &SAMPLE_KEY)?;

    if let Some(custom) = custom {
        merged = merged.left_join(&custom.filter_eq("sample_id", sample)?, &SAMPLE_KEY)?;
    }

    Ok(merged)
}

/// Add `img_file_name` (the object id without its sample prefix, `.png`)
/// and `img_rank` (0, one image per object).
///
/// Objects without an image file in `image_dir` keep both columns null.
pub fn derive_image_columns(table: &mut FeatureTable, sample: &str, image_dir: &Path) -> Result<(), ExportError> {
    let prefix = format!("{}_", sample);
    let names: Vec<String> = match table.column("object_id") {
        Some(ids) => ids
            .map(|id| format!("{}.png", id.render().replacen(&prefix, "", 1)))
            .collect(),
        None => return Err(TableError::ColumnNotFound("object_id".to_string()).into()),
    };

    let mut missing = 0usize;
    let (files, ranks): (Vec<Cell>, Vec<Cell>) = names
        .into_iter()
        .map(|name| {
            if image_dir.join(&name).is_file() {
                (Cell::Text(name), Cell::Int(0))
            } else {
                debug!("No image '{}' for sample '{}'", name, sample);
                missing += 1;
                (Cell::Null, Cell::Null)
            }
        })
        .unzip();
    if missing > 0 {
        warn!("Sample '{}': {} object(s) without an image", sample, missing);
    }

    table.set_column("img_file_name", files)?;
    table.set_column("img_rank", ranks)?;
    Ok(())
}

/// Restrict a merged table to the governed columns, logging every drop
pub fn govern_table(sample: &str, table: &FeatureTable, limits: &ColumnLimits) -> Result<FeatureTable, ExportError> {
    let governed = govern_columns(table.columns(), limits);
    for notice in &governed.truncations {
        warn!("Sample '{}' has {} (EcoTaxa limit)", sample, notice);
    }
    if !governed.unassigned.is_empty() {
        warn!(
            "Sample '{}': dropping {} column(s) without an EcoTaxa prefix: {}",
            sample,
            governed.unassigned.len(),
            governed.unassigned.join(", ")
        );
    }
    Ok(table.select(&governed.columns)?)
}

/// First value of `column`, if it is a positive number
pub fn pixel_size(table: &FeatureTable, column: &str) -> Option<f64> {
    table
        .column(column)?
        .find(|cell| !cell.is_null())
        .and_then(Cell::as_f64)
        .filter(|size| size.is_finite() && *size > 0.0)
}

/// Build and write the export of one sample.
///
/// An existing output (the zip, or the tsv with `only_tsv`) is left untouched
/// unless forced.
pub fn assemble_sample(
    project: &Project,
    settings: &ExportSettings,
    sample: &str,
    metadata: &FeatureTable,
    custom: Option<&FeatureTable>,
    options: ExportOptions,
) -> Result<SampleOutcome, ExportError> {
    let target = if options.only_tsv {
        project.export_tsv(sample)
    } else {
        project.export_zip(sample)
    };
    if target.exists() && !options.force {
        info!(
            "Skipping '{}', {} already exists (use --force to overwrite)",
            sample,
            target.display()
        );
        return Ok(SampleOutcome::Skipped(target));
    }

    let mut merged = merge_sample(project, sample, metadata, custom)?;
    derive_image_columns(&mut merged, sample, &project.image_dir(sample))?;
    let table = govern_table(sample, &merged, &ColumnLimits::from_settings(settings))?;

    let images = if options.only_tsv {
        write_tsv_file(&table, &target)?;
        None
    } else {
        let pixel_size_um =
            pixel_size(&merged, &settings.pixel_size_column).ok_or_else(|| ExportError::PixelSize {
                sample: sample.to_string(),
                column: settings.pixel_size_column.clone(),
            })?;
        Some(write_bundle(
            &table,
            sample,
            &project.image_dir(sample),
            pixel_size_um,
            settings.scale_bar_um,
            &target,
        )?)
    };

    info!(
        "Saved {} fields for {} objects to '{}'",
        table.num_columns(),
        table.num_rows(),
        target.display()
    );
    Ok(SampleOutcome::Written {
        path: target,
        objects: table.num_rows(),
        columns: table.num_columns(),
        images,
    })
}

/// Export every sample of the batch.
///
/// Fails before writing anything when any sample lacks an input; after that,
/// a failing sample is logged and the next one is processed.
pub fn prepare(
    project: &Project,
    settings: &ExportSettings,
    filter: Option<&str>,
    options: ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let metadata_path = project.metadata_artifact();
    let metadata = if metadata_path.is_file() {
        Some(read_parquet(&metadata_path)?)
    } else {
        None
    };

    let samples = batch_samples(metadata.as_ref(), filter);
    let report = preflight(project, &samples, metadata.as_ref());
    if report.has_failures() {
        for check in report.failures() {
            if let CheckStatus::Failed(message) = &check.status {
                warn!("Missing {}: {}", check.name, message);
            }
        }
        return Err(ExportError::Preflight(report));
    }

    let mut summary = ExportSummary::default();
    let Some(metadata) = metadata else {
        return Ok(summary);
    };
    info!("Preparing EcoTaxa files for {} sample(s)", samples.len());

    let custom = load_custom_metadata(project)?;
    for sample in samples {
        match assemble_sample(project, settings, &sample, &metadata, custom.as_ref(), options) {
            Ok(SampleOutcome::Written { .. }) => summary.written.push(sample),
            Ok(SampleOutcome::Skipped(_)) => summary.skipped.push(sample),
            Err(e) => {
                error!("Failed to export sample '{}': {}", sample, e);
                summary.failed.push((sample, e.to_string()));
            }
        }
    }

    Ok(summary)
}
