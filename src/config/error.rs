use std::path::PathBuf;

/// Errors raised while loading or validating `config.toml`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist
    #[error("Configuration file not found: {}. Run `cytoprocess create` to generate a template", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read
    #[error("Failed to read configuration file {}: {source}", path.display())]
    IoError {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has the wrong shape
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A mapping entry maps a path to something other than a column name
    #[error("Invalid mapping in [{group}]: '{path}' must map to a column name string")]
    InvalidMapping {
        /// Mapping table name
        group: String,
        /// Offending source path
        path: String,
    },

    /// A mapping group required by the current command has no entries
    #[error("No [{0}] mappings defined in config.toml")]
    EmptyMapping(String),

    /// A numeric setting is out of range
    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting {
        /// Dotted setting name
        key: String,
        /// Why the value was rejected
        reason: String,
    },
}
