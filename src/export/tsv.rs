use std::io::Write;
use std::path::Path;

use crate::table::{write_atomically, Cell, FeatureTable};

use super::ExportError;

/// Numeric column tag
pub const NUMERIC_TAG: &str = "[f]";
/// Text column tag
pub const TEXT_TAG: &str = "[t]";

/// `[f]` when every non-null value is numeric, `[t]` otherwise.
/// Columns holding only nulls are numeric.
pub fn column_type_tag<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> &'static str {
    let mut cells = cells.into_iter();
    if cells.all(|cell| cell.is_null() || cell.is_numeric()) {
        NUMERIC_TAG
    } else {
        TEXT_TAG
    }
}

/// Type tags of every column, in column order
pub fn type_row(table: &FeatureTable) -> Vec<&'static str> {
    table
        .columns()
        .iter()
        .map(|name| match table.column(name) {
            Some(cells) => column_type_tag(cells),
            None => NUMERIC_TAG,
        })
        .collect()
}

/// Write the EcoTaxa table: names, type tags, then one line per object.
pub fn write_tsv<W: Write>(table: &FeatureTable, writer: W) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    writer.write_record(table.columns())?;
    writer.write_record(type_row(table))?;
    for row in table.rows() {
        writer.write_record(row.iter().map(Cell::render))?;
    }
    writer.flush()?;
    Ok(())
}

/// [`write_tsv`] to a file, replacing it atomically
pub fn write_tsv_file(table: &FeatureTable, path: &Path) -> Result<(), ExportError> {
    write_atomically(path, |file| write_tsv(table, file))
}
