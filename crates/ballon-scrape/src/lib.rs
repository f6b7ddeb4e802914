// Award-ranking retrieval from Wikipedia award pages.

pub mod wikipedia;

pub use wikipedia::{parse_ranking_table, WikipediaFetcher};
