use std::fmt;

use crate::config::ExportSettings;

/// Column families recognised by EcoTaxa, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnGroup {
    Img,
    Object,
    Process,
    Acq,
    Sample,
}

impl ColumnGroup {
    pub const ALL: [ColumnGroup; 5] = [
        ColumnGroup::Img,
        ColumnGroup::Object,
        ColumnGroup::Process,
        ColumnGroup::Acq,
        ColumnGroup::Sample,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            ColumnGroup::Img => "img_",
            ColumnGroup::Object => "object_",
            ColumnGroup::Process => "process_",
            ColumnGroup::Acq => "acq_",
            ColumnGroup::Sample => "sample_",
        }
    }

    /// Identifier column; it is not metadata and never counts toward a limit
    pub fn id_column(&self) -> Option<&'static str> {
        match self {
            ColumnGroup::Img => None,
            ColumnGroup::Object => Some("object_id"),
            ColumnGroup::Process => Some("process_id"),
            ColumnGroup::Acq => Some("acq_id"),
            ColumnGroup::Sample => Some("sample_id"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnGroup::Img => "img",
            ColumnGroup::Object => "object",
            ColumnGroup::Process => "process",
            ColumnGroup::Acq => "acq",
            ColumnGroup::Sample => "sample",
        }
    }

    pub fn of(column: &str) -> Option<ColumnGroup> {
        Self::ALL.into_iter().find(|g| column.starts_with(g.prefix()))
    }
}

/// Maximum number of metadata columns per group; `None` is unlimited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLimits {
    pub img: Option<usize>,
    pub object: Option<usize>,
    pub process: Option<usize>,
    pub acq: Option<usize>,
    pub sample: Option<usize>,
}

impl ColumnLimits {
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self {
            img: settings.max_img_columns,
            object: Some(settings.max_object_columns),
            process: Some(settings.max_process_columns),
            acq: Some(settings.max_acq_columns),
            sample: Some(settings.max_sample_columns),
        }
    }

    pub fn limit(&self, group: ColumnGroup) -> Option<usize> {
        match group {
            ColumnGroup::Img => self.img,
            ColumnGroup::Object => self.object,
            ColumnGroup::Process => self.process,
            ColumnGroup::Acq => self.acq,
            ColumnGroup::Sample => self.sample,
        }
    }
}

impl Default for ColumnLimits {
    fn default() -> Self {
        Self::from_settings(&ExportSettings::default())
    }
}

/// Trailing columns dropped from one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationNotice {
    pub group: ColumnGroup,
    /// Metadata columns found, id excluded
    pub found: usize,
    pub limit: usize,
    pub dropped: Vec<String>,
}

impl fmt::Display for TruncationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} metadata columns, truncating to {} (dropped {})",
            self.found,
            self.group.name(),
            self.limit,
            self.dropped.len()
        )
    }
}

/// Column selection of the export table
#[derive(Debug, Clone, Default)]
pub struct GovernedColumns {
    /// Kept columns, grouped in [`ColumnGroup::ALL`] order
    pub columns: Vec<String>,
    /// One entry per truncated group
    pub truncations: Vec<TruncationNotice>,
    /// Columns outside every group
    pub unassigned: Vec<String>,
}

/// Group columns by prefix and cut every group to its limit.
///
/// Order within a group is preserved and only trailing columns are dropped;
/// the id column is always kept.
pub fn govern_columns(columns: &[String], limits: &ColumnLimits) -> GovernedColumns {
    let mut governed = GovernedColumns::default();

    for group in ColumnGroup::ALL {
        let limit = limits.limit(group);
        let id = group.id_column();
        let members: Vec<&String> = columns
            .iter()
            .filter(|c| ColumnGroup::of(c) == Some(group))
            .collect();
        let found = members.iter().filter(|c| Some(c.as_str()) != id).count();

        let mut kept = 0;
        let mut dropped = Vec::new();
        for column in members {
            if Some(column.as_str()) == id {
                governed.columns.push(column.clone());
            } else if limit.map_or(true, |limit| kept < limit) {
                governed.columns.push(column.clone());
                kept += 1;
            } else {
                dropped.push(column.clone());
            }
        }

        if let (Some(limit), false) = (limit, dropped.is_empty()) {
            governed.truncations.push(TruncationNotice {
                group,
                found,
                limit,
                dropped,
            });
        }
    }

    governed.unassigned = columns
        .iter()
        .filter(|c| ColumnGroup::of(c).is_none())
        .cloned()
        .collect();

    governed
}
