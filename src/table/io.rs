use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use super::{Cell, FeatureTable, TableError};

/// ZSTD level used for work artifacts
const ARTIFACT_ZSTD_LEVEL: i32 = 3;

/// Write a file through a temporary sibling that is renamed over `path`.
///
/// Readers see either the previous file or the complete new one.
pub fn write_atomically<F, E>(path: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&mut File) -> Result<(), E>,
    E: From<std::io::Error>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Storage type chosen for a column from the values it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

fn column_kind<'a>(cells: impl Iterator<Item = &'a Cell>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells {
        kind = match (kind, cell) {
            (_, Cell::Null) => kind,
            (_, Cell::Text(_)) => return ColumnKind::Text,
            (Some(ColumnKind::Float), _) | (_, Cell::Float(_)) => Some(ColumnKind::Float),
            (_, Cell::Int(_)) => Some(ColumnKind::Int),
        };
    }
    // All-null columns are stored as nullable floats
    kind.unwrap_or(ColumnKind::Float)
}

fn to_record_batch(table: &FeatureTable) -> Result<RecordBatch, TableError> {
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.num_columns());

    for (index, name) in table.columns().iter().enumerate() {
        let cells = || table.rows().map(move |row| &row[index]);
        let (data_type, array): (DataType, ArrayRef) = match column_kind(cells()) {
            ColumnKind::Int => {
                let values: Vec<Option<i64>> = cells()
                    .map(|c| match c {
                        Cell::Int(v) => Some(*v),
                        _ => None,
                    })
                    .collect();
                (DataType::Int64, Arc::new(Int64Array::from(values)))
            }
            ColumnKind::Float => {
                let values: Vec<Option<f64>> = cells().map(Cell::as_f64).collect();
                (DataType::Float64, Arc::new(Float64Array::from(values)))
            }
            ColumnKind::Text => {
                let values: Vec<Option<String>> = cells()
                    .map(|c| (!c.is_null()).then(|| c.render()))
                    .collect();
                (DataType::Utf8, Arc::new(StringArray::from(values)))
            }
        };
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &options,
    )?)
}

/// Persist a table as a ZSTD-compressed Parquet file (atomic replace).
pub fn write_parquet(table: &FeatureTable, path: &Path) -> Result<(), TableError> {
    let batch = to_record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(ARTIFACT_ZSTD_LEVEL)?))
        .build();

    write_atomically(path, |file| -> Result<(), TableError> {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    })?;

    debug!(
        "Wrote {} rows x {} columns to {}",
        table.num_rows(),
        table.num_columns(),
        path.display()
    );
    Ok(())
}

fn cells_from_array(name: &str, array: &dyn Array) -> Result<Vec<Cell>, TableError> {
    let len = array.len();
    let cell_at = |i: usize, value: Cell| if array.is_null(i) { Cell::Null } else { value };

    let cells = match array.data_type() {
        DataType::Int64 => {
            let a = array.as_primitive::<Int64Type>();
            (0..len).map(|i| cell_at(i, Cell::Int(a.value(i)))).collect()
        }
        DataType::Int32 => {
            let a = array.as_primitive::<Int32Type>();
            (0..len).map(|i| cell_at(i, Cell::Int(a.value(i) as i64))).collect()
        }
        DataType::Float64 => {
            let a = array.as_primitive::<Float64Type>();
            (0..len).map(|i| cell_at(i, Cell::Float(a.value(i)))).collect()
        }
        DataType::Float32 => {
            let a = array.as_primitive::<Float32Type>();
            (0..len).map(|i| cell_at(i, Cell::Float(a.value(i) as f64))).collect()
        }
        DataType::Utf8 => {
            let a = array.as_string::<i32>();
            (0..len).map(|i| cell_at(i, Cell::Text(a.value(i).to_string()))).collect()
        }
        DataType::LargeUtf8 => {
            let a = array.as_string::<i64>();
            (0..len).map(|i| cell_at(i, Cell::Text(a.value(i).to_string()))).collect()
        }
        DataType::Boolean => {
            let a = array.as_boolean();
            (0..len).map(|i| cell_at(i, Cell::Text(a.value(i).to_string()))).collect()
        }
        DataType::Null => vec![Cell::Null; len],
        other => {
            return Err(TableError::UnsupportedType {
                column: name.to_string(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(cells)
}

/// Read a Parquet artifact back into a table.
pub fn read_parquet(path: &Path) -> Result<FeatureTable, TableError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut table = FeatureTable::new(schema.fields().iter().map(|f| f.name().clone()));
    for batch in reader {
        let batch = batch?;
        let columns = batch
            .columns()
            .iter()
            .zip(schema.fields().iter())
            .map(|(array, field)| cells_from_array(field.name(), array.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            table.push_row(columns.iter().map(|column| column[row].clone()).collect())?;
        }
    }

    debug!("Read {} rows from {}", table.num_rows(), path.display());
    Ok(table)
}

/// Cell conversion applied by [`read_csv`]
#[derive(Debug, Clone, Copy)]
pub enum CsvCells<'a> {
    /// Every non-empty cell is kept as text verbatim
    Text,
    /// Cells that parse as numbers become numeric, except in the listed
    /// key columns, which stay text (`001` must not become `1`)
    Typed { keys: &'a [&'a str] },
}

/// Read a delimited text table with a header row. Empty cells are null.
pub fn read_csv(path: &Path, delimiter: u8, cells: CsvCells<'_>) -> Result<FeatureTable, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let parsed: Vec<bool> = headers
        .iter()
        .map(|header| match cells {
            CsvCells::Text => false,
            CsvCells::Typed { keys } => !keys.contains(&header.as_str()),
        })
        .collect();
    let mut table = FeatureTable::new(headers);

    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if parsed.get(i).copied().unwrap_or(false) {
                    Cell::parse(field)
                } else if field.is_empty() {
                    Cell::Null
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        table.push_row(row)?;
    }

    Ok(table)
}

/// Write a table as delimited text with a header row (atomic replace).
pub fn write_csv(table: &FeatureTable, path: &Path, delimiter: u8) -> Result<(), TableError> {
    write_atomically(path, |file| -> Result<(), TableError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(file);
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row.iter().map(Cell::render))?;
        }
        writer.flush()?;
        Ok(())
    })
}
