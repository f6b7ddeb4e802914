// Award ranking rows and the fetcher seam.
//
// A ranking is the top of one year's award vote: rank, the player's short
// display name, club, and points. Rows are produced once per year and are
// read-only afterwards.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    #[serde(rename = "Rank", alias = "rank")]
    pub rank: u32,
    /// Short display name, e.g. `"L. Messi"`.
    #[serde(rename = "Player", alias = "player")]
    pub player: String,
    #[serde(rename = "Club", alias = "club", default)]
    pub club: String,
    #[serde(rename = "Points", alias = "points")]
    pub points: f64,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {locator} failed: {message}")]
    Network { locator: String, message: String },

    #[error("{locator} answered HTTP {status}")]
    Status { locator: String, status: u16 },

    #[error("failed to read {locator}: {source}")]
    Io {
        locator: String,
        source: std::io::Error,
    },

    #[error("no ranking table found at {locator}: {message}")]
    Parse { locator: String, message: String },
}

// ---------------------------------------------------------------------------
// Fetcher seam
// ---------------------------------------------------------------------------

/// Retrieves one year's ranking from a source locator (URL or file path).
#[async_trait]
pub trait RankingFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<RankingRow>, FetchError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Short names in ranking order.
pub fn short_names(rows: &[RankingRow]) -> Vec<&str> {
    rows.iter().map(|r| r.player.as_str()).collect()
}

/// Union of short names across several years' rankings.
pub fn all_short_names<'a, I>(rankings: I) -> BTreeSet<&'a str>
where
    I: IntoIterator<Item = &'a [RankingRow]>,
{
    rankings
        .into_iter()
        .flat_map(|rows| rows.iter().map(|r| r.player.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Local CSV rankings
// ---------------------------------------------------------------------------

/// Read a ranking from CSV with `Rank,Player,Club,Points` headers, keeping
/// the first `top_n` valid rows. Malformed rows are skipped.
pub fn load_ranking_from_reader<R: Read>(
    rdr: R,
    locator: &str,
    top_n: usize,
) -> Result<Vec<RankingRow>, FetchError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RankingRow>() {
        match result {
            Ok(mut row) => {
                if !row.points.is_finite() {
                    warn!("skipping ranking entry '{}': non-finite points", row.player.trim());
                    continue;
                }
                row.player = row.player.trim().to_string();
                row.club = row.club.trim().to_string();
                rows.push(row);
            }
            Err(e) => {
                warn!("skipping malformed ranking row in {locator}: {e}");
            }
        }
        if rows.len() == top_n {
            break;
        }
    }
    if rows.is_empty() {
        return Err(FetchError::Parse {
            locator: locator.to_string(),
            message: "ranking CSV produced zero valid rows".into(),
        });
    }
    Ok(rows)
}

pub fn load_ranking_csv(path: &Path, top_n: usize) -> Result<Vec<RankingRow>, FetchError> {
    let locator = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| FetchError::Io {
        locator: locator.clone(),
        source: e,
    })?;
    load_ranking_from_reader(file, &locator, top_n)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
