//! Project directory layout and sample discovery.
//!
//! ```text
//! <project>/
//! ├── config.toml
//! ├── config/                  # discovery catalogues
//! ├── raw/<sample>.cyz
//! ├── converted/<sample>.json
//! ├── meta/samples.csv
//! ├── work/                    # per-sample Parquet artifacts
//! ├── images/<sample>/<particleId>.png
//! └── ecotaxa/ecotaxa_<sample>.{tsv,zip}
//! ```

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::config::{ConfigError, ProjectConfig};

/// Subdirectories created for every project
pub const PROJECT_DIRS: [&str; 7] = [
    "raw",
    "converted",
    "meta",
    "work",
    "images",
    "ecotaxa",
    "config",
];

/// Name of the cumulative sample metadata artifact
pub const METADATA_ARTIFACT: &str = "sample_metadata_from_instrument.parquet";

/// Errors locating project inputs
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// A required project subdirectory is missing
    #[error("Directory for {kind} files not found: {}", path.display())]
    MissingDirectory {
        /// Kind of file expected there
        kind: &'static str,
        /// Missing directory
        path: PathBuf,
    },

    /// I/O error listing a directory
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Kinds of per-sample source files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Raw instrument captures in `raw/`
    Cyz,
    /// Converter output in `converted/`
    Json,
}

impl SourceKind {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            SourceKind::Cyz => "cyz",
            SourceKind::Json => "json",
        }
    }
}

/// Normalise a user-supplied sample to its id: path and extension stripped.
///
/// `raw/station_1.cyz`, `station_1.json` and `station_1` all name `station_1`.
pub fn normalize_sample(sample: &str) -> String {
    let path = Path::new(sample);
    match path.extension().and_then(|e| e.to_str()) {
        Some("cyz") | Some("json") | Some("zip") | Some("tsv") => path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(sample)
            .to_string(),
        _ => path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(sample)
            .to_string(),
    }
}

/// Sample id of a source file: its stem
pub fn sample_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// A project directory
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Wrap a project root
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Load and validate `config.toml`
    pub fn load_config(&self) -> Result<ProjectConfig, ConfigError> {
        ProjectConfig::from_file(&self.config_file())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn converted_dir(&self) -> PathBuf {
        self.root.join("converted")
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root.join("work")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn ecotaxa_dir(&self) -> PathBuf {
        self.root.join("ecotaxa")
    }

    pub fn catalogue_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    /// Converted JSON document of a sample
    pub fn json_file(&self, sample: &str) -> PathBuf {
        self.converted_dir().join(format!("{}.json", sample))
    }

    /// User-maintained per-sample metadata table
    pub fn samples_csv(&self) -> PathBuf {
        self.meta_dir().join("samples.csv")
    }

    pub fn metadata_artifact(&self) -> PathBuf {
        self.work_dir().join(METADATA_ARTIFACT)
    }

    pub fn cytometric_artifact(&self, sample: &str) -> PathBuf {
        self.work_dir()
            .join(format!("{}_cytometric_features.parquet", sample))
    }

    pub fn pulses_artifact(&self, sample: &str) -> PathBuf {
        self.work_dir().join(format!("{}_pulses.parquet", sample))
    }

    pub fn image_features_artifact(&self, sample: &str) -> PathBuf {
        self.work_dir()
            .join(format!("{}_image_features.parquet", sample))
    }

    /// Directory of decoded particle images for a sample
    pub fn image_dir(&self, sample: &str) -> PathBuf {
        self.images_dir().join(sample)
    }

    pub fn export_tsv(&self, sample: &str) -> PathBuf {
        self.ecotaxa_dir().join(format!("ecotaxa_{}.tsv", sample))
    }

    pub fn export_zip(&self, sample: &str) -> PathBuf {
        self.ecotaxa_dir().join(format!("ecotaxa_{}.zip", sample))
    }

    pub fn metadata_keys_file(&self) -> PathBuf {
        self.catalogue_dir().join("available_metadata_keys.txt")
    }

    pub fn cytometry_features_file(&self) -> PathBuf {
        self.catalogue_dir()
            .join("available_cytometry_features.txt")
    }

    /// List the source files of one kind, sorted, optionally restricted to one sample.
    ///
    /// An empty result is logged as a warning; a missing directory is an error.
    pub fn sample_files(
        &self,
        kind: SourceKind,
        sample: Option<&str>,
    ) -> Result<Vec<PathBuf>, ProjectError> {
        let dir = match kind {
            SourceKind::Cyz => self.raw_dir(),
            SourceKind::Json => self.converted_dir(),
        };
        if !dir.is_dir() {
            return Err(ProjectError::MissingDirectory {
                kind: kind.extension(),
                path: dir,
            });
        }

        debug!("Listing .{} files in {}", kind.extension(), dir.display());
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(kind.extension())
            {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            warn!("No .{} files found in {}", kind.extension(), dir.display());
            return Ok(files);
        }

        if let Some(sample) = sample {
            files.retain(|f| sample_id(f).as_deref() == Some(sample));
            if files.is_empty() {
                warn!(
                    "No .{} files found matching sample '{}' in {}",
                    kind.extension(),
                    sample,
                    dir.display()
                );
            }
        }

        Ok(files)
    }

    /// Sample ids of the converted JSON documents, honouring the filter
    pub fn json_samples(&self, sample: Option<&str>) -> Result<Vec<(String, PathBuf)>, ProjectError> {
        Ok(self
            .sample_files(SourceKind::Json, sample)?
            .into_iter()
            .filter_map(|path| sample_id(&path).map(|id| (id, path)))
            .collect())
    }
}
