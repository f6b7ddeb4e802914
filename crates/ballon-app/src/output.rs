// Run outputs: one augmented ratings CSV per completed year plus a JSON
// summary of the whole run.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use ballon_core::link::{AmbiguousLink, LinkMiss};
use ballon_core::pipeline::{YearError, YearOutput, YearReport};
use ballon_core::positions::{split_goalkeepers, PositionOptions};
use ballon_core::ratings::{write_csv, RatingsTable};

use crate::forecast::Forecast;

// ---------------------------------------------------------------------------
// Summary document
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Summary {
    pub generated_at: DateTime<Utc>,
    pub years: Vec<YearSummary>,
    pub errors: Vec<YearFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,
}

#[derive(Debug, Serialize)]
pub struct YearSummary {
    #[serde(flatten)]
    pub report: YearReport,
    pub misses: Vec<LinkMiss>,
    pub ambiguous_links: Vec<AmbiguousLink>,
}

#[derive(Debug, Serialize)]
pub struct YearFailure {
    pub year: u32,
    pub error: String,
}

impl Summary {
    pub fn new(results: &[Result<YearOutput, YearError>]) -> Self {
        let mut years = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(out) => years.push(YearSummary {
                    report: out.report.clone(),
                    misses: out.link.misses.clone(),
                    ambiguous_links: out.link.ambiguous.clone(),
                }),
                Err(e) => errors.push(YearFailure {
                    year: e.year(),
                    error: e.to_string(),
                }),
            }
        }
        Self {
            generated_at: Utc::now(),
            years,
            errors,
            forecast: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_table(path: &Path, table: &RatingsTable) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(table, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Write `ratings_<year>.csv` (and `goalkeepers_<year>.csv` when goalkeepers
/// are split out) into `dir`. Returns the files written.
pub fn write_year(dir: &Path, out: &YearOutput, positions: PositionOptions) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let ratings_path = dir.join(format!("ratings_{}.csv", out.year));
    if !positions.split_goalkeepers {
        write_table(&ratings_path, &out.table)?;
        return Ok(vec![ratings_path]);
    }

    let (outfield, keepers) = split_goalkeepers(out.table.clone());
    let keepers_path = dir.join(format!("goalkeepers_{}.csv", out.year));
    write_table(&ratings_path, &outfield)?;
    write_table(&keepers_path, &keepers)?;
    Ok(vec![ratings_path, keepers_path])
}

pub fn write_summary(dir: &Path, summary: &Summary) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join("summary.json");
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
