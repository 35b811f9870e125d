/// Errors that can occur segmenting or measuring a particle image
#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    /// I/O error reading or writing an image file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The image could not be decoded or encoded
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Segmentation found no foreground component
    #[error("No particle found in image")]
    NoParticle,

    /// The image has zero width or height
    #[error("Empty image ({width}x{height})")]
    EmptyImage {
        /// Image width in pixels
        width: u32,
        /// Image height in pixels
        height: u32,
    },
}
