// Year pipeline: fetch, load, link and merge for every configured year.
//
// Rankings for all years are fetched concurrently. The pattern cache is
// warmed once from the union of every year's short names, then each year is
// prepared, linked and merged in configured order. A year that fails is
// reported on its own and never stops the others.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::columns::ColumnSelection;
use crate::config::Config;
use crate::index::CandidateIndex;
use crate::link::{link, LinkError, LinkResult, TieBreak};
use crate::merge::merge;
use crate::pattern::PatternCache;
use crate::positions::{single_position, PositionOptions};
use crate::ranking::{all_short_names, FetchError, RankingFetcher, RankingRow};
use crate::ratings::{year_filter, RatingsError, RatingsLoader, RatingsTable};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Where one year's data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearInput {
    pub year: u32,
    /// URL or file path handed to the ranking fetcher.
    pub source: String,
    pub ratings_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub tie_break: TieBreak,
    /// Ranking rows kept per year; 0 keeps everything.
    pub top_n: usize,
    pub columns: ColumnSelection,
    pub positions: PositionOptions,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearReport {
    pub year: u32,
    pub linked: usize,
    pub missed: usize,
    pub ambiguous: usize,
    /// Rows in the year's filtered ratings table.
    pub rows: usize,
    /// Rows that received points.
    pub points_rows: usize,
}

#[derive(Debug, Clone)]
pub struct YearOutput {
    pub year: u32,
    /// The augmented ratings table.
    pub table: RatingsTable,
    pub ranking: Vec<RankingRow>,
    pub link: LinkResult,
    pub report: YearReport,
}

#[derive(Debug, thiserror::Error)]
pub enum YearError {
    #[error("year {year}: ranking fetch failed: {source}")]
    Fetch { year: u32, source: FetchError },

    #[error("year {year}: ratings load failed: {source}")]
    Ratings { year: u32, source: RatingsError },

    #[error("year {year}: linking failed: {source}")]
    Link { year: u32, source: LinkError },
}

impl YearError {
    pub fn year(&self) -> u32 {
        match self {
            Self::Fetch { year, .. } | Self::Ratings { year, .. } | Self::Link { year, .. } => *year,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Pipeline {
    years: Vec<YearInput>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(years: Vec<YearInput>, options: PipelineOptions) -> Self {
        Self { years, options }
    }

    /// Build from a validated config. Years without a source or ratings path
    /// are skipped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let years = config
            .years
            .iter()
            .filter_map(|&year| {
                match (config.sources.get(&year), config.ratings_paths.get(&year)) {
                    (Some(source), Some(path)) => Some(YearInput {
                        year,
                        source: source.clone(),
                        ratings_path: path.clone(),
                    }),
                    _ => {
                        warn!("year {year} has no source or ratings path; skipping");
                        None
                    }
                }
            })
            .collect();

        Self::new(
            years,
            PipelineOptions {
                tie_break: config.tie_break,
                top_n: config.top_n,
                columns: config.columns.clone(),
                positions: config.positions,
            },
        )
    }

    pub fn years(&self) -> &[YearInput] {
        &self.years
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Fetch every year's ranking concurrently, in configured year order.
    pub async fn fetch_rankings<F>(&self, fetcher: &F) -> Vec<Result<Vec<RankingRow>, FetchError>>
    where
        F: RankingFetcher + ?Sized,
    {
        let fetches = self.years.iter().map(|input| fetcher.fetch(&input.source));
        join_all(fetches)
            .await
            .into_iter()
            .map(|result| {
                result.map(|mut rows| {
                    if self.options.top_n > 0 {
                        rows.truncate(self.options.top_n);
                    }
                    rows
                })
            })
            .collect()
    }

    /// Compile one pattern per distinct short name across `rankings`.
    pub fn warm_cache<'a, I>(rankings: I) -> PatternCache
    where
        I: IntoIterator<Item = &'a [RankingRow]>,
    {
        let names = all_short_names(rankings);
        let mut cache = PatternCache::new();
        for invalid in cache.warm(names.iter().copied()) {
            warn!("{invalid}");
        }
        info!("compiled {} name patterns", cache.len());
        cache
    }

    /// Filter `table` to `year`, then apply column selection and position
    /// simplification.
    pub fn prepare_table(&self, year: u32, table: &RatingsTable) -> RatingsTable {
        let filtered = year_filter(table, year);
        if filtered.is_empty() {
            warn!("ratings table has no rows for version {year}");
        }
        let mut prepared = self.options.columns.apply(filtered);
        if self.options.positions.single_position {
            single_position(&mut prepared);
        }
        prepared
    }

    /// Link and merge one year against an already prepared table.
    pub fn process_year(
        &self,
        year: u32,
        table: &RatingsTable,
        ranking: &[RankingRow],
        cache: &PatternCache,
    ) -> Result<YearOutput, LinkError> {
        let index = CandidateIndex::build(table);
        let link_result = link(ranking, &index, cache, self.options.tie_break)?;
        let merged = merge(table, &link_result, ranking, self.options.tie_break);

        let report = YearReport {
            year,
            linked: link_result.len(),
            missed: link_result.misses.len(),
            ambiguous: link_result.ambiguous.len(),
            rows: merged.len(),
            points_rows: merged.linked_rows().count(),
        };
        info!(
            "year {year}: linked {}/{} names ({} missed, {} ambiguous) over {} rows",
            report.linked,
            ranking.len(),
            report.missed,
            report.ambiguous,
            report.rows
        );
        if !link_result.misses.is_empty() {
            warn!("year {year}: unmatched names {:?}", link_result.missed_names());
        }

        Ok(YearOutput {
            year,
            table: merged,
            ranking: ranking.to_vec(),
            link: link_result,
            report,
        })
    }

    /// Run every configured year. Results come back in configured order,
    /// one per year. Ratings files shared between years are loaded once.
    pub async fn run<F, L>(&self, fetcher: &F, loader: &L) -> Vec<Result<YearOutput, YearError>>
    where
        F: RankingFetcher + ?Sized,
        L: RatingsLoader + ?Sized,
    {
        info!("fetching rankings for {} years", self.years.len());
        let rankings = self.fetch_rankings(fetcher).await;

        let cache = Self::warm_cache(
            rankings
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .map(Vec::as_slice),
        );

        let mut tables: HashMap<PathBuf, RatingsTable> = HashMap::new();
        let mut results = Vec::with_capacity(self.years.len());

        for (input, ranking) in self.years.iter().zip(rankings) {
            let year = input.year;
            let ranking = match ranking {
                Ok(rows) => rows,
                Err(source) => {
                    warn!("year {year}: {source}");
                    results.push(Err(YearError::Fetch { year, source }));
                    continue;
                }
            };

            let table = match tables.entry(input.ratings_path.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => match loader.load(&input.ratings_path) {
                    Ok(table) => {
                        info!(
                            "loaded {} ratings rows from {}",
                            table.len(),
                            input.ratings_path.display()
                        );
                        entry.insert(table)
                    }
                    Err(source) => {
                        warn!("year {year}: {source}");
                        results.push(Err(YearError::Ratings { year, source }));
                        continue;
                    }
                },
            };

            let prepared = self.prepare_table(year, table);
            let result = self
                .process_year(year, &prepared, &ranking, &cache)
                .map_err(|source| {
                    warn!("year {year}: {source}");
                    YearError::Link { year, source }
                });
            results.push(result);
        }

        results
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
