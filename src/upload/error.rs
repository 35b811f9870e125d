/// Errors that can occur talking to EcoTaxa
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// I/O error reading a bundle, the token cache or the terminal
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The server answered with an unexpected status
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The server answered with a body we cannot use
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    /// The server reported errors for a request or job
    #[error("EcoTaxa reported errors: {}", .0.join("; "))]
    Remote(Vec<String>),

    /// Login was refused or no credential was supplied
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// `[ecotaxa] project_id` is not configured
    #[error("EcoTaxa project_id is not set; add `project_id = <id>` under [ecotaxa] in config.toml (the id is in the project URL on EcoTaxa)")]
    MissingProjectId,

    /// No home directory to keep the token cache in
    #[error("Cannot locate the token cache: HOME is not set")]
    NoHomeDirectory,
}
