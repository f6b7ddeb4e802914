// Linker: resolves each ranking short name to one long name in a year's
// ratings table.
//
// Rows are processed in ranking order. Zero matches and multiple matches are
// recorded outcomes, not errors; only the `Strict` policy turns an
// ambiguous match into a failure.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::index::CandidateIndex;
use crate::pattern::{NamePattern, PatternCache};
use crate::ranking::RankingRow;

// ---------------------------------------------------------------------------
// Tie-break policy
// ---------------------------------------------------------------------------

/// How to pick one candidate when a short name matches several distinct long
/// names, or a long name has several rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First candidate in table order.
    #[default]
    FirstRow,
    /// Prefer candidates whose tokens all start whole words; otherwise the
    /// first in table order.
    WordStarts,
    /// Highest `overall` rating, ties broken by table order.
    HighestOverall,
    /// Refuse to choose between distinct long names.
    Strict,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    NoMatch,
    InvalidName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkMiss {
    pub short_name: String,
    pub reason: MissReason,
}

/// A short name that matched several distinct long names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousLink {
    pub short_name: String,
    /// Distinct candidates in order of first appearance.
    pub candidates: Vec<String>,
    pub chosen: String,
}

/// One year's linkage: short name to long name for every linked ranking
/// row, plus diagnostics for the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkResult {
    links: Vec<(String, String)>,
    pub misses: Vec<LinkMiss>,
    pub ambiguous: Vec<AmbiguousLink>,
}

impl LinkResult {
    pub fn get(&self, short_name: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|(s, _)| s == short_name)
            .map(|(_, l)| l.as_str())
    }

    /// `(short name, long name)` pairs in ranking order.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links.iter().map(|(s, l)| (s.as_str(), l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn missed_names(&self) -> Vec<&str> {
        self.misses.iter().map(|m| m.short_name.as_str()).collect()
    }

    fn insert(&mut self, short_name: &str, long_name: &str) {
        self.links.push((short_name.to_string(), long_name.to_string()));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("short name {short_name:?} matches {} distinct long names: {candidates:?}", candidates.len())]
    AmbiguousPattern {
        short_name: String,
        candidates: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------------

pub fn link(
    ranking: &[RankingRow],
    index: &CandidateIndex<'_>,
    cache: &PatternCache,
    policy: TieBreak,
) -> Result<LinkResult, LinkError> {
    let mut result = LinkResult::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for entry in ranking {
        let short_name = entry.player.as_str();
        if !seen.insert(short_name) {
            warn!("short name {short_name:?} listed twice in ranking; keeping first outcome");
            continue;
        }

        let pattern = match cache.resolve(short_name) {
            Ok(p) => p,
            Err(e) => {
                warn!("{e}; skipping ranking row {}", entry.rank);
                result.misses.push(LinkMiss {
                    short_name: short_name.to_string(),
                    reason: MissReason::InvalidName,
                });
                continue;
            }
        };

        let mut candidates: Vec<&str> = Vec::new();
        for name in index.matches(&pattern) {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }

        let chosen = match candidates.as_slice() {
            [] => {
                debug!("no long name matches {short_name:?}");
                result.misses.push(LinkMiss {
                    short_name: short_name.to_string(),
                    reason: MissReason::NoMatch,
                });
                continue;
            }
            [only] => *only,
            many => {
                let chosen = break_tie(short_name, many, index, &pattern, policy)?;
                warn!(
                    "{short_name:?} matches {} long names, chose {chosen:?}",
                    many.len()
                );
                result.ambiguous.push(AmbiguousLink {
                    short_name: short_name.to_string(),
                    candidates: many.iter().map(|s| s.to_string()).collect(),
                    chosen: chosen.to_string(),
                });
                chosen
            }
        };

        if let Some((other, _)) = result.links.iter().find(|(_, l)| l == chosen) {
            warn!("{short_name:?} and {other:?} both resolve to {chosen:?}");
        }
        result.insert(short_name, chosen);
    }

    Ok(result)
}

fn break_tie<'a>(
    short_name: &str,
    candidates: &[&'a str],
    index: &CandidateIndex<'_>,
    pattern: &NamePattern,
    policy: TieBreak,
) -> Result<&'a str, LinkError> {
    let first = candidates[0];
    let chosen = match policy {
        TieBreak::FirstRow => first,
        TieBreak::WordStarts => candidates
            .iter()
            .copied()
            .find(|c| pattern.matches_word_starts(c))
            .unwrap_or(first),
        TieBreak::HighestOverall => {
            let best_overall = |name: &str| {
                index
                    .rows_for(name)
                    .iter()
                    .map(|r| r.overall)
                    .max()
                    .unwrap_or(0)
            };
            let mut best = first;
            let mut best_score = best_overall(first);
            for &candidate in &candidates[1..] {
                let score = best_overall(candidate);
                if score > best_score {
                    best = candidate;
                    best_score = score;
                }
            }
            best
        }
        TieBreak::Strict => {
            return Err(LinkError::AmbiguousPattern {
                short_name: short_name.to_string(),
                candidates: candidates.iter().map(|s| s.to_string()).collect(),
            });
        }
    };
    Ok(chosen)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
