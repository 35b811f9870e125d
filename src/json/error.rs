/// Errors that can occur while reading converter JSON documents
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    /// I/O error opening or reading the document
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The document is not valid JSON, or its top level is not an object
    #[error("Malformed JSON in '{path}': {source}")]
    Malformed {
        /// Path of the offending document
        path: String,
        /// Underlying parser error
        #[source]
        source: serde_json::Error,
    },
}
