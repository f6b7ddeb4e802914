// Wikipedia ranking fetcher.
//
// Downloads an award page, finds the first `wikitable` whose header names a
// Player and a Points column, and reads its rows in page order. Tied ranks
// are written by Wikipedia as one cell spanning several rows, so cells with a
// `rowspan` are carried down into the rows below. Pages can be cached on disk
// to avoid hitting the network on every run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use ballon_core::ranking::{FetchError, RankingFetcher, RankingRow};

// ---------------------------------------------------------------------------
// Table parser
// ---------------------------------------------------------------------------

/// Compiled selectors and patterns used to read a ranking table.
#[derive(Debug, Clone)]
struct TableParser {
    table: Selector,
    row: Selector,
    cell: Selector,
    header_cell: Selector,
    footnote: Regex,
    leading_number: Regex,
}

impl TableParser {
    fn new() -> Result<Self, String> {
        let selector = |css: &str| {
            Selector::parse(css).map_err(|e| format!("invalid selector `{css}`: {e:?}"))
        };
        let regex = |pattern: &str| {
            Regex::new(pattern).map_err(|e| format!("invalid pattern `{pattern}`: {e}"))
        };
        Ok(Self {
            table: selector("table.wikitable")?,
            row: selector("tr")?,
            cell: selector("th, td")?,
            header_cell: selector("th")?,
            footnote: regex(r"\[[^\]]*\]")?,
            leading_number: regex(r"\d+")?,
        })
    }

    /// Visible text of a cell with footnote markers removed and whitespace
    /// collapsed.
    fn cell_text(&self, cell: &ElementRef<'_>) -> String {
        let raw: String = cell.text().collect();
        let stripped = self.footnote.replace_all(&raw, "");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn parse_points(&self, text: &str) -> Option<f64> {
        let cleaned: String = text.chars().filter(|c| *c != ',').collect();
        cleaned.trim().parse::<f64>().ok().filter(|p| p.is_finite())
    }

    /// First run of digits, so `=3`, `T3` and `3rd` all read as 3.
    fn parse_rank(&self, text: &str) -> Option<u32> {
        self.leading_number
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
    }

    fn parse(&self, html: &str, top_n: usize) -> Result<Vec<RankingRow>, String> {
        let document = Html::parse_document(html);
        let mut tables_seen = 0;

        for table in document.select(&self.table) {
            tables_seen += 1;
            let Some(columns) = self.header_columns(&table) else {
                continue;
            };
            let rows = self.read_rows(&table, &columns, top_n);
            if rows.is_empty() {
                debug!("ranking table has headers but no usable rows; trying next");
                continue;
            }
            return Ok(rows);
        }

        Err(format!(
            "none of {tables_seen} wikitable(s) has Player and Points columns with data"
        ))
    }

    fn header_columns(&self, table: &ElementRef<'_>) -> Option<Columns> {
        let header_row = table
            .select(&self.row)
            .find(|tr| tr.select(&self.header_cell).next().is_some())?;
        let names: Vec<String> = header_row
            .select(&self.cell)
            .map(|c| self.cell_text(&c).to_lowercase())
            .collect();
        let find = |prefix: &str| names.iter().position(|n| n.starts_with(prefix));

        Some(Columns {
            width: names.len(),
            rank: find("rank"),
            player: find("player")?,
            club: find("club"),
            points: find("points")?,
        })
    }

    fn read_rows(&self, table: &ElementRef<'_>, columns: &Columns, top_n: usize) -> Vec<RankingRow> {
        let mut carried: Vec<Option<(usize, String)>> = vec![None; columns.width];
        let mut rows: Vec<RankingRow> = Vec::new();
        let mut header_skipped = false;

        for tr in table.select(&self.row) {
            if !header_skipped
                && tr.select(&self.header_cell).next().is_some()
                && tr.select(&self.cell).count() == tr.select(&self.header_cell).count()
            {
                header_skipped = true;
                continue;
            }

            let values = self.row_values(&tr, &mut carried);
            let value = |i: usize| values.get(i).map(String::as_str).unwrap_or_default();

            let player = value(columns.player).to_string();
            if player.is_empty() {
                continue;
            }
            let Some(points) = self.parse_points(value(columns.points)) else {
                warn!("skipping ranking row for {player:?}: unreadable points");
                continue;
            };
            // Blank or tied rank cells repeat the rank above.
            let rank = match columns.rank {
                Some(i) => self
                    .parse_rank(value(i))
                    .or_else(|| rows.last().map(|r| r.rank))
                    .unwrap_or(1),
                None => rows.len() as u32 + 1,
            };
            let club = columns.club.map(|i| value(i).to_string()).unwrap_or_default();

            rows.push(RankingRow {
                rank,
                player,
                club,
                points,
            });
            if top_n > 0 && rows.len() == top_n {
                break;
            }
        }

        rows
    }

    /// Lay one `<tr>` onto the column grid, filling positions still covered
    /// by a `rowspan` from an earlier row.
    fn row_values(&self, tr: &ElementRef<'_>, carried: &mut [Option<(usize, String)>]) -> Vec<String> {
        let mut cells = tr.select(&self.cell);
        let mut values = Vec::with_capacity(carried.len());

        for slot in carried.iter_mut() {
            if let Some((remaining, text)) = slot {
                values.push(text.clone());
                *remaining -= 1;
                if *remaining == 0 {
                    *slot = None;
                }
                continue;
            }
            let Some(cell) = cells.next() else {
                values.push(String::new());
                continue;
            };
            let text = self.cell_text(&cell);
            let span = cell
                .value()
                .attr("rowspan")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(1);
            if span > 1 {
                *slot = Some((span - 1, text.clone()));
            }
            values.push(text);
        }

        values
    }
}

/// Column positions within a ranking table's grid.
#[derive(Debug, Clone, Copy)]
struct Columns {
    width: usize,
    rank: Option<usize>,
    player: usize,
    club: Option<usize>,
    points: usize,
}

/// Read the ranking table out of an award page. `top_n` of 0 keeps every row.
pub fn parse_ranking_table(html: &str, top_n: usize) -> Result<Vec<RankingRow>, String> {
    TableParser::new()?.parse(html, top_n)
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Fetches award rankings from Wikipedia over HTTP.
#[derive(Debug, Clone)]
pub struct WikipediaFetcher {
    http: reqwest::Client,
    parser: TableParser,
    top_n: usize,
    cache_dir: Option<PathBuf>,
}

impl WikipediaFetcher {
    pub fn new(user_agent: &str, timeout: Duration, top_n: usize) -> Result<Self, FetchError> {
        let client_error = |message: String| FetchError::Network {
            locator: "<client>".into(),
            message,
        };
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| client_error(e.to_string()))?;
        let parser = TableParser::new().map_err(client_error)?;

        Ok(Self {
            http,
            parser,
            top_n,
            cache_dir: None,
        })
    }

    /// Keep downloaded pages under `cache_dir` and read them back on later
    /// runs instead of downloading again.
    pub fn with_cache<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().to_path_buf());
        self
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            let stem: String = url
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
                .collect();
            dir.join(format!("{stem}.html"))
        })
    }

    fn load_from_cache(&self, url: &str) -> Option<String> {
        let path = self.cache_path(url)?;
        let html = std::fs::read_to_string(&path).ok()?;
        debug!("using cached page {}", path.display());
        Some(html)
    }

    fn save_to_cache(&self, url: &str, html: &str) {
        let Some(path) = self.cache_path(url) else {
            return;
        };
        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&path, html));
        match written {
            Ok(()) => debug!("cached {url} at {}", path.display()),
            Err(e) => warn!("failed to cache {url}: {e}"),
        }
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            locator: url.to_string(),
            message: e.to_string(),
        };

        info!("downloading {url}");
        let response = self.http.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                locator: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(network)
    }
}

#[async_trait]
impl RankingFetcher for WikipediaFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<RankingRow>, FetchError> {
        let html = match self.load_from_cache(locator) {
            Some(html) => html,
            None => {
                let html = self.download(locator).await?;
                self.save_to_cache(locator, &html);
                html
            }
        };

        let rows = self
            .parser
            .parse(&html, self.top_n)
            .map_err(|message| FetchError::Parse {
                locator: locator.to_string(),
                message,
            })?;
        info!("read {} ranking rows from {locator}", rows.len());
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
