//! # Project Configuration
//!
//! Every project carries a `config.toml` at its root. It holds the
//! user-authored mappings from source paths to output columns, plus a handful
//! of per-stage settings:
//!
//! ```toml
//! [sample]
//! "measurementSettings.name" = "name"
//!
//! [acq]
//! "measurementSettings.CytoSettings.iif.ImageScaleMuPerPixelP" = "pixel_size"
//!
//! [object]
//! "FWS.length" = "fws_length"
//!
//! [pulses]
//! n_poly = 10
//!
//! [export]
//! max_object_columns = 500
//!
//! [ecotaxa]
//! project_id = 1234
//! ```
//!
//! Mapping tables keep the order in which they were written; that order
//! drives the column order of every artifact derived from them.

mod error;


pub use error::ConfigError;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable naming the instrument converter binary
pub const CONVERTER_ENV: &str = "CYZ2JSON";

/// Default number of polynomial coefficients per pulse channel
pub const DEFAULT_N_POLY: usize = 10;

/// Template written by `cytoprocess create`
pub const CONFIG_TEMPLATE: &str = r#"# cytoprocess project configuration
#
# Mapping tables map a source path to an output column name. Run
#   cytoprocess extract-meta --list
#   cytoprocess extract-cyto --list
# to list the paths available in your data (written to config/).

# Sample metadata, resolved against the instrument section
[sample]
"measurementSettings.name" = "name"

# Acquisition metadata
[acq]
"measurementSettings.CytoSettings.iif.ImageScaleMuPerPixelP" = "pixel_size"

# Processing metadata
[process]

# Per-particle cytometric features, resolved against particle parameters
[object]
"FWS.length" = "fws_length"
"FWS.total" = "fws_total"

[pulses]
n_poly = 10

[features]
# max_cores = 4

[export]
max_object_columns = 500
max_process_columns = 50
max_acq_columns = 50
max_sample_columns = 50
pixel_size_column = "acq_pixel_size"
scale_bar_um = 10.0

[ecotaxa]
# project_id = 1234
api_url = "https://ecotaxa.obs-vlfr.fr/api"
poll_interval_secs = 2.0
upload_timeout_secs = 300

[converter]
# path = "/opt/cyz2json/Cyz2Json"
"#;

/// The independent mapping groups of `config.toml`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingGroup {
    /// Per-sample metadata
    Sample,
    /// Acquisition metadata
    Acq,
    /// Processing metadata
    Process,
    /// Per-particle cytometric features
    Object,
}

impl MappingGroup {
    /// The metadata groups, in the order their tables are written
    pub const METADATA: [MappingGroup; 3] =
        [MappingGroup::Sample, MappingGroup::Acq, MappingGroup::Process];

    /// Name of the TOML table holding this group
    pub fn table_name(&self) -> &'static str {
        match self {
            MappingGroup::Sample => "sample",
            MappingGroup::Acq => "acq",
            MappingGroup::Process => "process",
            MappingGroup::Object => "object",
        }
    }

    /// Prefix of every output column produced by this group
    pub fn column_prefix(&self) -> &'static str {
        match self {
            MappingGroup::Sample => "sample_",
            MappingGroup::Acq => "acq_",
            MappingGroup::Process => "process_",
            MappingGroup::Object => "object_",
        }
    }

    /// Identifier column carried by rows of this group
    pub fn id_column(&self) -> &'static str {
        match self {
            MappingGroup::Sample => "sample_id",
            MappingGroup::Acq => "acq_id",
            MappingGroup::Process => "process_id",
            MappingGroup::Object => "object_id",
        }
    }
}

/// Ordered source-path to column-name mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<(String, String)>,
}

impl ColumnMapping {
    /// Build a mapping from a TOML table, rejecting non-string column names.
    pub fn from_table(group: MappingGroup, table: &toml::Table) -> Result<Self, ConfigError> {
        let entries = table
            .iter()
            .map(|(path, column)| match column.as_str() {
                Some(column) => Ok((path.clone(), column.to_string())),
                None => Err(ConfigError::InvalidMapping {
                    group: group.table_name().to_string(),
                    path: path.clone(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Iterate `(source_path, column)` pairs in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(p, c)| (p.into(), c.into())).collect(),
        }
    }
}

/// `[pulses]` settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PulseSettings {
    /// Polynomial coefficients per channel
    pub n_poly: usize,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            n_poly: DEFAULT_N_POLY,
        }
    }
}

/// `[features]` settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Upper bound on image worker threads
    pub max_cores: Option<usize>,
}

/// `[export]` settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub max_object_columns: usize,
    pub max_process_columns: usize,
    pub max_acq_columns: usize,
    pub max_sample_columns: usize,
    /// No limit when unset
    pub max_img_columns: Option<usize>,
    /// Merged-table column holding the pixel size in micrometres
    pub pixel_size_column: String,
    /// Length of the drawn scale bar in micrometres
    pub scale_bar_um: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_object_columns: 500,
            max_process_columns: 50,
            max_acq_columns: 50,
            max_sample_columns: 50,
            max_img_columns: None,
            pixel_size_column: "acq_pixel_size".to_string(),
            scale_bar_um: 10.0,
        }
    }
}

/// `[ecotaxa]` settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EcotaxaSettings {
    /// Destination project; required by `upload`
    pub project_id: Option<i64>,
    pub api_url: String,
    pub poll_interval_secs: f64,
    pub upload_timeout_secs: u64,
}

impl Default for EcotaxaSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            api_url: "https://ecotaxa.obs-vlfr.fr/api".to_string(),
            poll_interval_secs: 2.0,
            upload_timeout_secs: 300,
        }
    }
}

/// `[converter]` settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    pub path: Option<PathBuf>,
}

/// Shape of the file on disk, before mapping validation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    sample: toml::Table,
    acq: toml::Table,
    process: toml::Table,
    object: toml::Table,
    pulses: PulseSettings,
    features: FeatureSettings,
    export: ExportSettings,
    ecotaxa: EcotaxaSettings,
    converter: ConverterSettings,
}

/// Validated contents of a project's `config.toml`
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    pub sample: ColumnMapping,
    pub acq: ColumnMapping,
    pub process: ColumnMapping,
    pub object: ColumnMapping,
    pub pulses: PulseSettings,
    pub features: FeatureSettings,
    pub export: ExportSettings,
    pub ecotaxa: EcotaxaSettings,
    pub converter: ConverterSettings,
}

impl ProjectConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;

        let config = Self {
            sample: ColumnMapping::from_table(MappingGroup::Sample, &raw.sample)?,
            acq: ColumnMapping::from_table(MappingGroup::Acq, &raw.acq)?,
            process: ColumnMapping::from_table(MappingGroup::Process, &raw.process)?,
            object: ColumnMapping::from_table(MappingGroup::Object, &raw.object)?,
            pulses: raw.pulses,
            features: raw.features,
            export: raw.export,
            ecotaxa: raw.ecotaxa,
            converter: raw.converter,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pulses.n_poly < 1 {
            return Err(invalid("pulses.n_poly", "must be at least 1"));
        }
        if self.features.max_cores == Some(0) {
            return Err(invalid("features.max_cores", "must be at least 1"));
        }
        if !(self.export.scale_bar_um > 0.0) {
            return Err(invalid("export.scale_bar_um", "must be positive"));
        }
        if !(self.ecotaxa.poll_interval_secs > 0.0) {
            return Err(invalid("ecotaxa.poll_interval_secs", "must be positive"));
        }
        Ok(())
    }

    /// The mapping for one group
    pub fn mapping(&self, group: MappingGroup) -> &ColumnMapping {
        match group {
            MappingGroup::Sample => &self.sample,
            MappingGroup::Acq => &self.acq,
            MappingGroup::Process => &self.process,
            MappingGroup::Object => &self.object,
        }
    }

    /// Converter binary: `[converter] path`, else the `CYZ2JSON` variable
    pub fn converter_path(&self) -> Option<PathBuf> {
        self.converter
            .path
            .clone()
            .or_else(|| std::env::var_os(CONVERTER_ENV).map(PathBuf::from))
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
