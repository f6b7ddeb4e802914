// Configuration loading and parsing (config/ballon.toml).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::columns::ColumnSelection;
use crate::link::TieBreak;
use crate::positions::PositionOptions;

pub const CONFIG_FILE: &str = "ballon.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Two-digit game versions to process, in processing order.
    pub years: Vec<u32>,
    pub tie_break: TieBreak,
    pub top_n: usize,
    pub output_dir: PathBuf,
    pub sources: BTreeMap<u32, String>,
    pub ratings_paths: BTreeMap<u32, PathBuf>,
    pub columns: ColumnSelection,
    pub positions: PositionOptions,
    pub fetch: FetchConfig,
    pub prediction: Option<PredictionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Directory for cached ranking pages. No caching when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("ballon/", env!("CARGO_PKG_VERSION")).to_string(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    pub target_year: u32,
    pub features: Vec<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

// ---------------------------------------------------------------------------
// ballon.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the whole file. Year keys arrive as
/// strings (TOML table keys) and are parsed during assembly.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    pipeline: PipelineSection,
    sources: BTreeMap<String, String>,
    ratings_paths: BTreeMap<String, PathBuf>,
    #[serde(default)]
    columns: ColumnSelection,
    #[serde(default)]
    positions: PositionOptions,
    #[serde(default)]
    fetch: FetchConfig,
    prediction: Option<PredictionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct PipelineSection {
    years: Vec<u32>,
    #[serde(default)]
    tie_break: TieBreak,
    #[serde(default = "default_top_n")]
    top_n: usize,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
}

fn default_top_n() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Parse and validate configuration text. `path` is used for error reporting.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = Config {
        years: file.pipeline.years,
        tie_break: file.pipeline.tie_break,
        top_n: file.pipeline.top_n,
        output_dir: file.pipeline.output_dir,
        sources: year_keys("sources", file.sources)?,
        ratings_paths: year_keys("ratings_paths", file.ratings_paths)?,
        columns: file.columns,
        positions: file.positions,
        fetch: file.fetch,
        prediction: file.prediction,
    };

    validate(&config)?;

    Ok(config)
}

/// Load and validate `config/ballon.toml` relative to `base_dir`.
///
/// Does not touch `defaults/`; a missing file is `FileNotFound`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text, &path)
}

/// Copy every file in `defaults/` that is missing from `config/`. Existing
/// config files are never overwritten and `.example` templates are skipped.
/// Returns the files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(vec![]);
        }
        return Err(copy_error(format!(
            "no defaults/ or config/ directory under {}",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create config directory: {e}")))?;

    let mut defaults: Vec<PathBuf> = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("failed to read defaults directory: {e}")))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map_or(true, |ext| ext != "example"))
        .collect();
    defaults.sort();

    let mut copied = Vec::new();
    for source in defaults {
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        let dest = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target);
        let mut dest = match dest {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(copy_error(format!("failed to create {}: {e}", target.display()))),
        };
        let mut src = std::fs::File::open(&source)
            .map_err(|e| copy_error(format!("failed to read {}: {e}", source.display())))?;
        std::io::copy(&mut src, &mut dest)
            .map_err(|e| copy_error(format!("failed to write {}: {e}", target.display())))?;
        info!("copied default config {}", target.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Seed `config/` from `defaults/` in the working directory, then load it.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn year_keys<V>(section: &str, raw: BTreeMap<String, V>) -> Result<BTreeMap<u32, V>, ConfigError> {
    raw.into_iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<u32>()
                .map(|year| (year, value))
                .map_err(|_| ConfigError::ValidationError {
                    field: format!("{section}.{key}"),
                    message: "key must be a two-digit year".into(),
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.years.is_empty() {
        return Err(invalid("pipeline.years", "must list at least one year"));
    }

    for (i, &year) in config.years.iter().enumerate() {
        if year > 99 {
            return Err(invalid(
                "pipeline.years",
                format!("{year} is not a two-digit version tag"),
            ));
        }
        if config.years[..i].contains(&year) {
            return Err(invalid("pipeline.years", format!("{year} listed twice")));
        }
        if !config.sources.contains_key(&year) {
            return Err(invalid(format!("sources.{year}"), "missing ranking source"));
        }
        if !config.ratings_paths.contains_key(&year) {
            return Err(invalid(format!("ratings_paths.{year}"), "missing ratings path"));
        }
    }

    if config.top_n == 0 {
        return Err(invalid("pipeline.top_n", "must be > 0"));
    }

    if let Some(both) = config
        .columns
        .include
        .iter()
        .find(|c| config.columns.exclude.contains(c))
    {
        return Err(invalid(
            "columns",
            format!("`{both}` is both included and excluded"),
        ));
    }

    if config.fetch.timeout_secs == 0 {
        return Err(invalid("fetch.timeout_secs", "must be > 0"));
    }

    if let Some(prediction) = &config.prediction {
        if prediction.features.is_empty() {
            return Err(invalid("prediction.features", "must list at least one feature"));
        }
        if prediction.top_n == 0 {
            return Err(invalid("prediction.top_n", "must be > 0"));
        }
        if !config.ratings_paths.contains_key(&prediction.target_year) {
            return Err(invalid(
                format!("ratings_paths.{}", prediction.target_year),
                "missing ratings path for prediction target year",
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const VALID: &str = r#"
[pipeline]
years = [17, 18]
tie_break = "highest_overall"
top_n = 10
output_dir = "out"

[sources]
"17" = "https://en.wikipedia.org/wiki/2017_Ballon_d%27Or"
"18" = "data/rankings/2018.csv"

[ratings_paths]
"17" = "data/male_players.csv"
"18" = "data/male_players.csv"
"20" = "data/male_players.csv"

[columns]
exclude = ["player_url"]

[positions]
single_position = true

[fetch]
timeout_secs = 5
cache_dir = "cache/html"

[prediction]
target_year = 20
features = ["overall", "wage_eur", "age", "weight_kg"]
"#;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        parse_config(text, Path::new("config/ballon.toml"))
    }

    fn expect_field(result: Result<Config, ConfigError>, expected: &str) {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, expected),
            Err(other) => panic!("expected ValidationError, got: {other}"),
            Ok(_) => panic!("expected ValidationError for {expected}"),
        }
    }

    #[test]
    fn parses_full_config() {
        let config = parse(VALID).expect("should parse valid config");

        assert_eq!(config.years, vec![17, 18]);
        assert_eq!(config.tie_break, TieBreak::HighestOverall);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.sources[&18], "data/rankings/2018.csv");
        assert_eq!(config.ratings_paths[&20], PathBuf::from("data/male_players.csv"));
        assert_eq!(config.columns.exclude, vec!["player_url"]);
        assert!(config.columns.include.is_empty());
        assert!(config.positions.single_position);
        assert!(!config.positions.split_goalkeepers);
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.cache_dir, Some(PathBuf::from("cache/html")));
        assert!(config.fetch.user_agent.starts_with("ballon/"));

        let prediction = config.prediction.expect("prediction section");
        assert_eq!(prediction.target_year, 20);
        assert_eq!(prediction.features.len(), 4);
        assert_eq!(prediction.top_n, 10);
    }

    #[test]
    fn shipped_defaults_are_valid() {
        let text = include_str!("../../../defaults/ballon.toml");
        let config = parse(text).expect("defaults/ballon.toml should parse");
        assert_eq!(config.years, vec![17, 18, 19, 21, 22]);
        assert!(config.prediction.is_some());
    }

    #[test]
    fn optional_sections_default() {
        let text = r#"
[pipeline]
years = [19]

[sources]
"19" = "https://en.wikipedia.org/wiki/2019_Ballon_d%27Or"

[ratings_paths]
"19" = "players_19.csv"
"#;
        let config = parse(text).expect("minimal config should parse");
        assert_eq!(config.tie_break, TieBreak::FirstRow);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.columns.is_noop());
        assert_eq!(config.positions, PositionOptions::default());
        assert_eq!(config.fetch.timeout_secs, 30);
        assert!(config.prediction.is_none());
    }

    #[test]
    fn rejects_empty_years() {
        expect_field(parse(&VALID.replace("years = [17, 18]", "years = []")), "pipeline.years");
    }

    #[test]
    fn rejects_three_digit_year() {
        expect_field(parse(&VALID.replace("years = [17, 18]", "years = [17, 118]")), "pipeline.years");
    }

    #[test]
    fn rejects_duplicate_year() {
        expect_field(parse(&VALID.replace("years = [17, 18]", "years = [17, 17]")), "pipeline.years");
    }

    #[test]
    fn rejects_year_without_source() {
        let text = VALID.replace("\"18\" = \"data/rankings/2018.csv\"\n", "");
        expect_field(parse(&text), "sources.18");
    }

    #[test]
    fn rejects_year_without_ratings_path() {
        let text = VALID.replace("years = [17, 18]", "years = [17, 18, 19]").replace(
            "\"18\" = \"data/rankings/2018.csv\"",
            "\"18\" = \"data/rankings/2018.csv\"\n\"19\" = \"x\"",
        );
        expect_field(parse(&text), "ratings_paths.19");
    }

    #[test]
    fn rejects_non_numeric_year_key() {
        let text = VALID.replace("\"18\" = \"data/rankings/2018.csv\"", "\"eighteen\" = \"x\"");
        expect_field(parse(&text), "sources.eighteen");
    }

    #[test]
    fn rejects_zero_top_n() {
        expect_field(parse(&VALID.replace("top_n = 10", "top_n = 0")), "pipeline.top_n");
    }

    #[test]
    fn rejects_column_in_both_lists() {
        let text = VALID.replace(
            "exclude = [\"player_url\"]",
            "include = [\"age\"]\nexclude = [\"age\"]",
        );
        expect_field(parse(&text), "columns");
    }

    #[test]
    fn rejects_zero_timeout() {
        expect_field(parse(&VALID.replace("timeout_secs = 5", "timeout_secs = 0")), "fetch.timeout_secs");
    }

    #[test]
    fn rejects_prediction_without_features() {
        let text = VALID.replace(
            "features = [\"overall\", \"wage_eur\", \"age\", \"weight_kg\"]",
            "features = []",
        );
        expect_field(parse(&text), "prediction.features");
    }

    #[test]
    fn rejects_prediction_target_without_ratings() {
        expect_field(parse(&VALID.replace("target_year = 20", "target_year = 23")), "ratings_paths.23");
    }

    #[test]
    fn rejects_unknown_tie_break() {
        let err = parse(&VALID.replace("highest_overall", "coin_flip")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let err = parse("this is not valid [[[ toml").unwrap_err();
        match &err {
            ConfigError::ParseError { path, .. } => {
                assert!(path.ends_with("ballon.toml"));
            }
            other => panic!("expected ParseError, got: {other}"),
        }
    }

    #[test]
    fn load_config_from_reads_config_dir() {
        let tmp = std::env::temp_dir().join("ballon_config_test_load");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), VALID).unwrap();

        let config = load_config_from(&tmp).expect("should load from config dir");
        assert_eq!(config.years, vec![17, 18]);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = std::env::temp_dir().join("ballon_config_test_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        match &err {
            ConfigError::FileNotFound { path } => {
                assert!(path.ends_with("ballon.toml"));
            }
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seeds_config_dir_from_defaults() {
        let tmp = std::env::temp_dir().join("ballon_config_test_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::write(defaults_dir.join(CONFIG_FILE), VALID).unwrap();
        fs::write(defaults_dir.join("ballon.toml.example"), "# template\n").unwrap();

        assert!(!tmp.join("config").exists());

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config/ballon.toml").exists());
        assert!(!tmp.join("config/ballon.toml.example").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seeding_keeps_user_edits() {
        let tmp = std::env::temp_dir().join("ballon_config_test_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        let config_dir = tmp.join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(defaults_dir.join(CONFIG_FILE), VALID).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), "# custom\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert!(copied.is_empty());

        let content = fs::read_to_string(config_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn seeding_fails_without_either_dir() {
        let tmp = std::env::temp_dir().join("ballon_config_test_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_files(&tmp).unwrap_err();
        match &err {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("no defaults/ or config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
