use std::collections::HashSet;
use std::path::Path;

use log::{debug, error, info, warn};

use super::{converted_samples, remediation, ErrorKind, RunContext, StageError, StageSummary};
use crate::config::CONFIG_TEMPLATE;
use crate::project::{Project, PROJECT_DIRS};
use crate::table::{read_csv, write_csv, Cell, CsvCells, FeatureTable, TableError};

/// Columns added to a new `meta/samples.csv` for the user to fill in
pub const DEFAULT_EXTRA_FIELDS: [&str; 8] = [
    "object_lon",
    "object_lat",
    "object_date",
    "object_time",
    "object_depth_min",
    "object_depth_max",
    "object_lon_end",
    "object_lat_end",
];

/// Create the project layout and a template `config.toml`.
///
/// Existing subdirectories are kept; an existing configuration is never
/// overwritten.
pub fn create(root: &Path) -> Result<Project, StageError> {
    let project = Project::new(root);
    let config = project.config_file();
    if config.exists() {
        return Err(StageError::ProjectExists(config));
    }

    for dir in PROJECT_DIRS {
        let path = root.join(dir);
        debug!("Creating {}", path.display());
        std::fs::create_dir_all(&path)?;
    }
    std::fs::write(&config, CONFIG_TEMPLATE)?;

    info!("Created project in {}", root.display());
    info!(
        "Copy the .cyz files into {} and edit {}",
        project.raw_dir().display(),
        config.display()
    );
    Ok(project)
}

/// Create or update `meta/samples.csv`: one row per converted sample plus
/// the `extra_fields` columns.
///
/// Existing rows and values are preserved, new samples are appended and
/// missing columns added. The file is not rewritten when nothing changes.
pub fn list_samples(ctx: &RunContext, extra_fields: &[String]) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("list", ctx);

    let samples: Vec<String> = converted_samples(&RunContext::new(ctx.project.root(), None, ctx.force))?
        .into_iter()
        .map(|(sample, _)| sample)
        .collect();
    if samples.is_empty() {
        return Err(StageError::MissingInput {
            what: "Converted samples".to_string(),
            path: ctx.project.converted_dir(),
            remediation: remediation(ctx, "convert"),
        });
    }
    info!("{} sample(s) found", samples.len());
    for sample in &samples {
        debug!("   {}", sample);
    }

    let path = ctx.project.samples_csv();
    let mut table = if path.is_file() {
        read_csv(&path, b',', CsvCells::Text)?
    } else {
        FeatureTable::new(["sample_id"])
    };
    if !table.has_column("sample_id") {
        return Err(TableError::ColumnNotFound(format!(
            "sample_id in {}",
            path.display()
        ))
        .into());
    }

    let missing_fields: Vec<&String> = extra_fields
        .iter()
        .filter(|field| !table.has_column(field))
        .collect();
    for field in &missing_fields {
        debug!("Adding column '{}'", field);
        table.fill_column(field, Cell::Null);
    }

    let known: HashSet<String> = table
        .column("sample_id")
        .map(|ids| ids.map(Cell::render).collect())
        .unwrap_or_default();
    for sample in samples {
        if known.contains(&sample) {
            summary.skipped.push(sample);
            continue;
        }
        let mut row = vec![Cell::Null; table.num_columns()];
        if let Some(index) = table.column_index("sample_id") {
            row[index] = Cell::Text(sample.clone());
        }
        table.push_row(row)?;
        summary.written.push(sample);
    }

    if summary.written.is_empty() && missing_fields.is_empty() {
        info!("No new samples or fields to add to {}", path.display());
    } else {
        write_csv(&table, &path, b',')?;
        info!(
            "Added {} sample(s) and {} field(s) to {}, you can now add custom metadata",
            summary.written.len(),
            missing_fields.len(),
            path.display()
        );
    }

    summary.finish(ErrorKind::ExtractionFailure)
}

/// Delete the converted JSON documents, honouring the sample filter
pub fn cleanup(ctx: &RunContext) -> Result<StageSummary, StageError> {
    let mut summary = StageSummary::start("cleanup", ctx);

    let dir = ctx.project.converted_dir();
    if !dir.is_dir() {
        warn!("Converted directory does not exist: {}", dir.display());
        return summary.finish(ErrorKind::ExtractionFailure);
    }

    let documents = ctx.project.json_samples(ctx.sample())?;
    info!("Found {} .json file(s) to delete", documents.len());
    for (sample, path) in documents {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                summary.written.push(sample);
            }
            Err(e) => {
                error!("Failed to delete {}: {}", path.display(), e);
                summary.failed.push((sample, e.to_string()));
            }
        }
    }

    summary.finish(ErrorKind::ExtractionFailure)
}

