use lazy_static::lazy_static;
use regex::Regex;

use super::article::ArticleId;

lazy_static! {
    // "article 14", "Article 21A", "ARTICLE\t5". Both ends are word boundaries,
    // so "subarticle 14" and "article 14th" carry no reference.
    static ref ARTICLE_REF_RE: Regex = Regex::new(r"(?i)\barticle\s+(\d+[a-z]?)\b").unwrap();
}

/// A question for the duration of one routing call.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    raw: String,
    normalized: String,
}

impl Query {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(Self {
            raw: raw.to_string(),
            normalized: trimmed.to_lowercase(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lower-cased, trimmed form used for matching.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Leftmost article reference in the question, if any.
    pub fn article_reference(&self) -> Option<ArticleId> {
        extract_article_reference(&self.normalized)
    }

    pub fn contains_any<'a, I>(&self, keywords: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        keywords
            .into_iter()
            .any(|k| !k.is_empty() && self.normalized.contains(k.as_str()))
    }
}

pub fn extract_article_reference(text: &str) -> Option<ArticleId> {
    ARTICLE_REF_RE
        .captures(text)
        .and_then(|c| ArticleId::parse(&c[1]))
}
