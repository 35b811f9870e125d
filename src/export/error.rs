use super::PreflightReport;
use crate::table::TableError;

/// Errors that can occur assembling EcoTaxa tables and bundles
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reading or writing a feature table failed
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// Writing the table as TSV failed
    #[error("TSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Writing the bundle archive failed
    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// An annotated image could not be written
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// A particle image referenced by the table could not be read
    #[error("Cannot read image '{path}': {source}")]
    UnreadableImage {
        path: std::path::PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Required artifacts are missing for at least one sample
    #[error("Missing inputs, nothing was written\n{0}")]
    Preflight(PreflightReport),

    /// The merged table has no usable pixel size for the scale bar
    #[error("Sample '{sample}' has no positive pixel size in column '{column}'")]
    PixelSize {
        /// Sample id
        sample: String,
        /// Configured pixel size column
        column: String,
    },
}
