/// Errors that can occur building, joining or persisting feature tables
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// CSV error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// A column required by an operation is absent
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A row does not match the table's column count
    #[error("Row has {actual} cells, table has {expected} columns")]
    RowWidth {
        /// Column count of the table
        expected: usize,
        /// Cell count of the rejected row
        actual: usize,
    },

    /// A stored column has a type the table model does not carry
    #[error("Unsupported column type for '{column}': {data_type}")]
    UnsupportedType {
        /// Column name
        column: String,
        /// Arrow data type, rendered
        data_type: String,
    },
}
