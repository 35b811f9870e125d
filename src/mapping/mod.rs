//! # Cytometric and Metadata Mapping
//!
//! Applies the user's `config.toml` mappings to converter documents.
//!
//! - [`cytometric_table`] resolves every `[object]` path against each
//!   particle's tagged parameter groups, one row per particle, columns
//!   `object_<column>`.
//! - [`metadata_row`] resolves the `[sample]`, `[acq]` and `[process]` paths
//!   against the nested `instrument` tree, one row per sample, each group under
//!   its own column prefix and id column.
//!
//! Unresolved paths produce null cells (logged at debug level), never errors.

#[cfg(test)]
mod tests;

use log::{debug, warn};
use serde_json::Value;

use crate::config::{ColumnMapping, MappingGroup, ProjectConfig};
use crate::json::{resolve_nested, resolve_tagged, Particle, DESCRIPTION_TAG};
use crate::table::{Cell, FeatureRow, FeatureTable};

/// Cytometric features of one particle, or `None` if it has no parameter groups.
pub fn cytometric_row(sample_id: &str, particle: &Particle, mapping: &ColumnMapping) -> Option<FeatureRow> {
    if particle.parameters.is_empty() {
        debug!("No parameters for particle {} in sample {}", particle.key(), sample_id);
        return None;
    }

    let mut row = FeatureRow::keyed("sample_id", sample_id);
    row.set("object_id", particle.object_id(sample_id));

    for (path, column) in mapping.iter() {
        let column = format!("{}{}", MappingGroup::Object.column_prefix(), column);
        let value = match resolve_tagged(&particle.parameters, &DESCRIPTION_TAG, path) {
            Some(value) => Cell::from_json(value),
            None => {
                debug!("Path '{}' not found in particle {}", path, particle.key());
                Cell::Null
            }
        };
        row.set(&column, value);
    }

    Some(row)
}

/// Cytometric feature table of a sample, one row per particle with parameters
pub fn cytometric_table(sample_id: &str, particles: &[Particle], mapping: &ColumnMapping) -> FeatureTable {
    FeatureTable::from_rows(
        particles
            .iter()
            .filter_map(|particle| cytometric_row(sample_id, particle, mapping)),
    )
}

/// Metadata row of one sample from its `instrument` section.
///
/// Always carries `sample_id`, `acq_id` and `process_id`, all equal to the
/// sample id, followed by the mapped columns of each group.
pub fn metadata_row(sample_id: &str, instrument: &Value, config: &ProjectConfig) -> FeatureRow {
    let mut row = FeatureRow::keyed("sample_id", sample_id);

    for group in MappingGroup::METADATA {
        row.set(group.id_column(), sample_id);

        for (path, column) in config.mapping(group).iter() {
            let column = format!("{}{}", group.column_prefix(), column);
            if column == group.id_column() {
                warn!(
                    "[{}] mapping of '{}' would overwrite {}; skipped",
                    group.table_name(),
                    path,
                    column
                );
                continue;
            }

            let value = match resolve_nested(instrument, path) {
                Some(value) => Cell::from_json(&value),
                None => {
                    debug!("Path '{}' not found in instrument metadata of {}", path, sample_id);
                    Cell::Null
                }
            };
            row.set(&column, value);
        }
    }

    row
}

/// Merge freshly extracted metadata rows into the cumulative table: rows of
/// the same samples are replaced, and the result is sorted by `sample_id`.
pub fn merge_metadata(
    existing: Option<FeatureTable>,
    fresh: FeatureTable,
) -> Result<FeatureTable, crate::table::TableError> {
    let mut merged = match existing {
        Some(existing) => existing.replace_rows("sample_id", &fresh)?,
        None => fresh,
    };
    merged.sort_by_column("sample_id")?;
    Ok(merged)
}
