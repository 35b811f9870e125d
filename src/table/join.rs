use std::collections::HashMap;

use log::{debug, warn};

use super::{Cell, FeatureTable, TableError};

impl FeatureTable {
    /// Left-join `right` onto this table on the given key columns.
    ///
    /// Every row of `self` appears exactly once in the result, in its original
    /// order; rows without a match get nulls in the right-hand columns. When
    /// `right` holds several rows for one key the first is used. Right-hand
    /// non-key columns whose name already exists on the left are skipped.
    pub fn left_join(&self, right: &FeatureTable, keys: &[&str]) -> Result<FeatureTable, TableError> {
        let left_keys = key_indices(self, keys)?;
        let right_keys = key_indices(right, keys)?;

        let mut lookup: HashMap<Vec<String>, usize> = HashMap::with_capacity(right.num_rows());
        let mut duplicates = 0usize;
        for (i, row) in right.rows.iter().enumerate() {
            let key = row_key(row, &right_keys);
            if lookup.contains_key(&key) {
                duplicates += 1;
            } else {
                lookup.insert(key, i);
            }
        }
        if duplicates > 0 {
            debug!(
                "{} duplicate key row(s) on the right side of a join on {:?}; first occurrence used",
                duplicates, keys
            );
        }

        let mut appended: Vec<(String, usize)> = Vec::new();
        for (i, column) in right.columns.iter().enumerate() {
            if keys.contains(&column.as_str()) {
                continue;
            }
            if self.has_column(column) {
                warn!("Column '{}' present on both sides of a join; keeping the left one", column);
                continue;
            }
            appended.push((column.clone(), i));
        }

        let mut columns = self.columns.clone();
        columns.extend(appended.iter().map(|(name, _)| name.clone()));

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let matched = lookup.get(&row_key(row, &left_keys)).map(|&i| &right.rows[i]);
                let mut joined = row.clone();
                joined.extend(appended.iter().map(|(_, i)| match matched {
                    Some(right_row) => right_row[*i].clone(),
                    None => Cell::Null,
                }));
                joined
            })
            .collect();

        Ok(FeatureTable { columns, rows })
    }
}

fn key_indices(table: &FeatureTable, keys: &[&str]) -> Result<Vec<usize>, TableError> {
    keys.iter()
        .map(|key| {
            table
                .column_index(key)
                .ok_or_else(|| TableError::ColumnNotFound(key.to_string()))
        })
        .collect()
}

fn row_key(row: &[Cell], indices: &[usize]) -> Vec<String> {
    indices.iter().map(|&i| row[i].render()).collect()
}
