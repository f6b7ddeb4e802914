// Ratings snapshot loading and writing.
//
// Reads FIFA-style player rating CSVs: one row per player per game version,
// identified by `long_name`, with arbitrarily many attribute columns.

use std::borrow::Cow;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::positions::general_position;

/// Columns every ratings file must provide. They are lifted into typed
/// fields of [`RatingsRow`]; all other columns are carried as text.
pub const REQUIRED_COLUMNS: [&str; 4] = ["fifa_version", "long_name", "overall", "player_positions"];

/// Columns `write_csv` computes itself.
const DERIVED_COLUMNS: [&str; 2] = ["general_position", "points"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RatingsRow {
    pub fifa_version: u32,
    pub long_name: String,
    pub overall: u32,
    /// Comma-separated, most common position first (e.g. `"RW, ST, CF"`).
    pub player_positions: String,
    /// Values of the non-required columns, aligned with
    /// [`RatingsTable::columns`].
    pub extra: Vec<String>,
    /// Award points transplanted from the ranking table. `None` means the
    /// player was not in that year's ranking, which is different from
    /// having scored zero.
    pub points: Option<f64>,
}

impl RatingsRow {
    /// First listed position, trimmed.
    pub fn primary_position(&self) -> &str {
        self.player_positions
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
    }
}

/// An ordered ratings table. Row order is meaningful: it is the tie-break
/// order used when several rows match the same player.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RatingsTable {
    /// Names of the non-required columns, in file order.
    pub columns: Vec<String>,
    pub rows: Vec<RatingsRow>,
}

impl RatingsTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// True for required columns, `points`, and any extra column.
    pub fn has_column(&self, name: &str) -> bool {
        REQUIRED_COLUMNS.contains(&name) || name == "points" || self.column_index(name).is_some()
    }

    /// Text value of `column` for `row`, covering both required and extra
    /// columns. Absent points read as `None`.
    pub fn value<'a>(&self, row: &'a RatingsRow, column: &str) -> Option<Cow<'a, str>> {
        match column {
            "fifa_version" => Some(Cow::Owned(row.fifa_version.to_string())),
            "long_name" => Some(Cow::Borrowed(row.long_name.as_str())),
            "overall" => Some(Cow::Owned(row.overall.to_string())),
            "player_positions" => Some(Cow::Borrowed(row.player_positions.as_str())),
            "points" => row.points.map(|p| Cow::Owned(p.to_string())),
            _ => {
                let idx = self.column_index(column)?;
                row.extra.get(idx).map(|v| Cow::Borrowed(v.as_str()))
            }
        }
    }

    /// Numeric value of `column` for `row`. Empty or non-numeric cells read
    /// as `None`.
    pub fn numeric(&self, row: &RatingsRow, column: &str) -> Option<f64> {
        match column {
            "fifa_version" => Some(f64::from(row.fifa_version)),
            "overall" => Some(f64::from(row.overall)),
            "points" => row.points,
            _ => {
                let idx = self.column_index(column)?;
                let value: f64 = row.extra.get(idx)?.trim().parse().ok()?;
                value.is_finite().then_some(value)
            }
        }
    }

    /// Rows that carry award points.
    pub fn linked_rows(&self) -> impl Iterator<Item = &RatingsRow> {
        self.rows.iter().filter(|r| r.points.is_some())
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RatingsError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} is missing required column `{column}`")]
    MissingColumn { path: String, column: String },
}

// ---------------------------------------------------------------------------
// Loader seam
// ---------------------------------------------------------------------------

/// Source of ratings tables, keyed by file location.
pub trait RatingsLoader {
    fn load(&self, path: &Path) -> Result<RatingsTable, RatingsError>;
}

/// Loads ratings from CSV files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRatingsLoader;

impl RatingsLoader for CsvRatingsLoader {
    fn load(&self, path: &Path) -> Result<RatingsTable, RatingsError> {
        load_ratings(path)
    }
}

// ---------------------------------------------------------------------------
// Reader-based loader (enables testing without temp files)
// ---------------------------------------------------------------------------

pub fn load_ratings_from_reader<R: Read>(rdr: R, origin: &str) -> Result<RatingsTable, RatingsError> {
    let csv_err = |source| RatingsError::Csv {
        path: origin.to_string(),
        source,
    };

    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut required = [0usize; 4];
    for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| RatingsError::MissingColumn {
                path: origin.to_string(),
                column: name.to_string(),
            })?;
    }
    let [version_idx, name_idx, overall_idx, positions_idx] = required;

    let extra_idx: Vec<usize> = (0..headers.len())
        .filter(|i| !required.contains(i))
        .collect();
    let columns = extra_idx
        .iter()
        .map(|&i| headers[i].trim().to_string())
        .collect();

    let mut table = RatingsTable::new(columns);
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed ratings row in {origin}: {e}");
                continue;
            }
        };
        let field = |i: usize| record.get(i).unwrap_or_default().trim();

        let long_name = field(name_idx).to_string();
        let Some(fifa_version) = parse_whole(field(version_idx)) else {
            warn!("skipping '{long_name}' (row {}): bad fifa_version", line + 1);
            continue;
        };
        let Some(overall) = parse_whole(field(overall_idx)) else {
            warn!("skipping '{long_name}' (row {}): bad overall", line + 1);
            continue;
        };

        table.rows.push(RatingsRow {
            fifa_version,
            long_name,
            overall,
            player_positions: field(positions_idx).to_string(),
            extra: extra_idx.iter().map(|&i| field(i).to_string()).collect(),
            points: None,
        });
    }

    debug!("loaded {} ratings rows from {origin}", table.rows.len());
    Ok(table)
}

/// Accepts `17` as well as the `17.0` some exporters write for integers.
fn parse_whole(s: &str) -> Option<u32> {
    if let Ok(v) = s.parse::<u32>() {
        return Some(v);
    }
    let v: f64 = s.parse().ok()?;
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX)).then_some(v as u32)
}

/// Load a ratings table from a CSV file.
pub fn load_ratings(path: &Path) -> Result<RatingsTable, RatingsError> {
    let file = std::fs::File::open(path).map_err(|e| RatingsError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_ratings_from_reader(file, &path.display().to_string())
}

// ---------------------------------------------------------------------------
// Transformations
// ---------------------------------------------------------------------------

/// Keep only rows of the given two-digit game version, preserving order.
pub fn year_filter(table: &RatingsTable, year: u32) -> RatingsTable {
    RatingsTable {
        columns: table.columns.clone(),
        rows: table
            .rows
            .iter()
            .filter(|r| r.fifa_version == year)
            .cloned()
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write `table` as CSV: required columns, a derived `general_position`,
/// the extra columns, then `points` (empty when absent).
///
/// Extra columns named `general_position` or `points`, as in a table read
/// back from earlier output, are not repeated. A carried `points` value is
/// kept for rows the run did not link.
pub fn write_csv<W: Write>(table: &RatingsTable, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let kept: Vec<usize> = (0..table.columns.len())
        .filter(|&i| !DERIVED_COLUMNS.contains(&table.columns[i].as_str()))
        .collect();
    let carried_points = table.column_index("points");

    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    header.push("general_position");
    header.extend(kept.iter().map(|&i| table.columns[i].as_str()));
    header.push("points");
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![
            row.fifa_version.to_string(),
            row.long_name.clone(),
            row.overall.to_string(),
            row.player_positions.clone(),
            general_position(row.primary_position())
                .map(|g| g.as_str().to_string())
                .unwrap_or_default(),
        ];
        record.extend(kept.iter().map(|&i| row.extra.get(i).cloned().unwrap_or_default()));
        let points = match row.points {
            Some(p) => p.to_string(),
            None => carried_points
                .and_then(|i| row.extra.get(i).cloned())
                .unwrap_or_default(),
        };
        record.push(points);
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
