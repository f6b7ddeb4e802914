// Declarative column selection applied to ratings tables.

use serde::Deserialize;
use tracing::warn;

use crate::ratings::{RatingsTable, REQUIRED_COLUMNS};

/// Which non-required columns to keep. Required columns are always kept.
///
/// An empty `include` list keeps every column; `exclude` is applied after
/// `include`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnSelection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ColumnSelection {
    pub fn is_noop(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn keeps(&self, column: &str) -> bool {
        if REQUIRED_COLUMNS.contains(&column) {
            return true;
        }
        (self.include.is_empty() || self.include.iter().any(|c| c == column))
            && !self.exclude.iter().any(|c| c == column)
    }

    pub fn apply(&self, mut table: RatingsTable) -> RatingsTable {
        if self.is_noop() {
            return table;
        }
        for name in self.include.iter().chain(&self.exclude) {
            if !REQUIRED_COLUMNS.contains(&name.as_str()) && table.column_index(name).is_none() {
                warn!("column selection names unknown column `{name}`");
            }
        }

        let keep: Vec<bool> = table.columns.iter().map(|c| self.keeps(c)).collect();
        let retain = |values: Vec<String>| -> Vec<String> {
            values
                .into_iter()
                .zip(&keep)
                .filter_map(|(v, &k)| k.then_some(v))
                .collect()
        };

        table.columns = retain(std::mem::take(&mut table.columns));
        for row in &mut table.rows {
            row.extra = retain(std::mem::take(&mut row.extra));
        }
        table
    }
}
