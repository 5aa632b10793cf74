use std::cmp::Ordering;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // digits with an optional single trailing letter: "14", "21A"
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^(\d+)([A-Za-z]?)$").unwrap();
}

/// Article identifier such as `14` or `21A`.
///
/// Identifiers are canonicalized on construction (trimmed, trailing letter
/// upper-cased) so `21a` and `21A` name the same article. Ordering follows
/// the numeric prefix first, then the letter suffix, so `9 < 10 < 21 < 21A`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArticleId(String);

impl ArticleId {
    /// Parse and canonicalize an identifier. Returns `None` for anything that
    /// is not digits followed by at most one letter.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = IDENTIFIER_RE.captures(raw.trim())?;
        let digits = caps[1].trim_start_matches('0');
        let digits = if digits.is_empty() { "0" } else { digits };
        Some(Self(format!("{}{}", digits, caps[2].to_uppercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of the identifier. Saturates for absurdly long digit runs.
    pub fn number(&self) -> u64 {
        let digits: String = self.0.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(u64::MAX)
    }

    /// Trailing letter, if any.
    pub fn suffix(&self) -> Option<char> {
        self.0.chars().last().filter(|c| c.is_ascii_alphabetic())
    }
}

impl Ord for ArticleId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number()
            .cmp(&other.number())
            .then_with(|| self.suffix().cmp(&other.suffix()))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ArticleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ArticleId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid article identifier '{}'", value))
    }
}

impl From<ArticleId> for String {
    fn from(id: ArticleId) -> Self {
        id.0
    }
}

/// One addressable unit of the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub body: String,
    /// Absent until the embedding backfill has run for this article.
    pub embedding: Option<Vec<f32>>,
}

impl Article {
    pub fn new(id: ArticleId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            embedding: None,
        }
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// Text fed to the embedding provider: title and body joined like a sentence.
    pub fn embedding_text(&self) -> String {
        format!("{}. {}", self.title, self.body)
    }
}
