// Name patterns: ordered, gap-tolerant token matchers built from the short
// display names used by award ranking tables.

use std::borrow::Cow;
use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

/// A short name that produced no tokens after whitespace splitting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("short name {name:?} contains no tokens")]
pub struct InvalidName {
    pub name: String,
}

// ---------------------------------------------------------------------------
// NamePattern
// ---------------------------------------------------------------------------

/// Matcher derived from a short name such as `"L. Messi"`.
///
/// A long name matches when every whitespace-separated token of the short
/// name occurs in it as a contiguous, case-sensitive run of characters, in
/// the same order and without overlapping. Anything may appear before,
/// between, or after the tokens.
///
/// A `.` inside a token stands for any single character, so the initial
/// `"L."` matches the `"Li"` of `"Lionel"`. Every other character matches
/// only itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    source: String,
    tokens: Vec<String>,
    token_chars: Vec<Vec<char>>,
}

impl NamePattern {
    pub fn compile(short_name: &str) -> Result<Self, InvalidName> {
        let tokens: Vec<String> = short_name.split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            return Err(InvalidName {
                name: short_name.to_string(),
            });
        }
        let token_chars = tokens.iter().map(|t| t.chars().collect()).collect();
        Ok(Self {
            source: short_name.to_string(),
            tokens,
            token_chars,
        })
    }

    /// The short name this pattern was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_match(&self, long_name: &str) -> bool {
        self.scan(long_name, |_, _| true)
    }

    /// Stricter variant of [`is_match`](Self::is_match): every token must
    /// begin at the start of a whitespace-separated word of `long_name`.
    /// `"Messi"` and `"L."` qualify against `"Lionel Andrés Messi"`, `"ssi"`
    /// does not.
    pub fn matches_word_starts(&self, long_name: &str) -> bool {
        self.scan(long_name, |hay, start| {
            start == 0 || hay[start - 1].is_whitespace()
        })
    }

    /// Leftmost-first scan. Taking the earliest admissible occurrence of each
    /// token leaves the longest remainder for the ones after it, so a greedy
    /// scan never rejects a name that some other placement accepts.
    fn scan<F>(&self, long_name: &str, admissible: F) -> bool
    where
        F: Fn(&[char], usize) -> bool,
    {
        let hay: Vec<char> = long_name.chars().collect();
        let mut from = 0;
        for token in &self.token_chars {
            let Some(last_start) = hay.len().checked_sub(token.len()) else {
                return false;
            };
            let found = (from..=last_start).find(|&start| {
                admissible(&hay, start)
                    && token
                        .iter()
                        .zip(&hay[start..])
                        .all(|(t, h)| token_char_matches(*t, *h))
            });
            match found {
                Some(start) => from = start + token.len(),
                None => return false,
            }
        }
        true
    }
}

fn token_char_matches(token: char, hay: char) -> bool {
    if token == '.' {
        hay != '\n'
    } else {
        token == hay
    }
}

// ---------------------------------------------------------------------------
// PatternCache
// ---------------------------------------------------------------------------

/// Compiled patterns keyed by exact short name, scoped to one pipeline run.
///
/// The cache is filled once from the union of every year's ranking names and
/// then shared read-only by each year's linker.
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    patterns: HashMap<String, NamePattern>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every name not already cached. Names that fail to compile are
    /// returned rather than stored.
    pub fn warm<'a, I>(&mut self, names: I) -> Vec<InvalidName>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut invalid = Vec::new();
        for name in names {
            if let Err(e) = self.compile(name) {
                invalid.push(e);
            }
        }
        debug!(patterns = self.patterns.len(), "pattern cache warmed");
        invalid
    }

    /// Return the cached pattern for `short_name`, compiling and storing it
    /// on first use.
    pub fn compile(&mut self, short_name: &str) -> Result<&NamePattern, InvalidName> {
        if !self.patterns.contains_key(short_name) {
            let pattern = NamePattern::compile(short_name)?;
            self.patterns.insert(short_name.to_string(), pattern);
        }
        Ok(&self.patterns[short_name])
    }

    pub fn get(&self, short_name: &str) -> Option<&NamePattern> {
        self.patterns.get(short_name)
    }

    /// Cached pattern if present, otherwise a freshly compiled one that is
    /// not retained.
    pub fn resolve(&self, short_name: &str) -> Result<Cow<'_, NamePattern>, InvalidName> {
        match self.patterns.get(short_name) {
            Some(pattern) => Ok(Cow::Borrowed(pattern)),
            None => {
                debug!("pattern cache miss for {short_name:?}");
                NamePattern::compile(short_name).map(Cow::Owned)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
