// Ranking source dispatch: web pages go to the Wikipedia fetcher, anything
// else is read as a local ranking CSV.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use ballon_core::config::Config;
use ballon_core::ranking::{load_ranking_csv, FetchError, RankingFetcher, RankingRow};
use ballon_scrape::WikipediaFetcher;

pub fn is_remote(locator: &str) -> bool {
    let lower = locator.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub struct SourceFetcher {
    web: WikipediaFetcher,
    top_n: usize,
}

impl SourceFetcher {
    pub fn new(web: WikipediaFetcher, top_n: usize) -> Self {
        Self { web, top_n }
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let mut web = WikipediaFetcher::new(
            &config.fetch.user_agent,
            Duration::from_secs(config.fetch.timeout_secs),
            config.top_n,
        )?;
        if let Some(dir) = &config.fetch.cache_dir {
            web = web.with_cache(dir);
        }
        Ok(Self::new(web, config.top_n))
    }
}

#[async_trait]
impl RankingFetcher for SourceFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<RankingRow>, FetchError> {
        if is_remote(locator) {
            self.web.fetch(locator).await
        } else {
            debug!("reading local ranking {locator}");
            load_ranking_csv(Path::new(locator), self.top_n)
        }
    }
}
