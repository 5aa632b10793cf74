//! Plain-text rendering of routing results.

use super::router::MatchResult;
use crate::core::article::Article;

pub const NO_MATCH_MESSAGE: &str = "No relevant constitutional article found.";
pub const INVALID_QUESTION_MESSAGE: &str = "Please enter a valid question.";
pub const ERROR_MESSAGE: &str = "Sorry, an error occurred. Please try again.";

const ENTRY_SEPARATOR: &str = "\n\n";

pub fn article_header(article: &Article) -> String {
    format!("Article {}: {}", article.id, article.title)
}

/// Header line, blank line, body.
pub fn format_article(article: &Article) -> String {
    format!("{}\n\n{}", article_header(article), article.body)
}

pub fn format_match(result: &MatchResult) -> String {
    match result {
        MatchResult::Exact(article) => format_article(article),
        MatchResult::Semantic(scored) => format_article(&scored.article),
        MatchResult::Category { category, articles } => {
            let entries = articles
                .iter()
                .map(|a| format!("{}\n{}", article_header(a), a.body))
                .collect::<Vec<_>>()
                .join(ENTRY_SEPARATOR);

            match &category.heading {
                Some(heading) => format!("{}{}{}", heading, ENTRY_SEPARATOR, entries),
                None => entries,
            }
        }
        MatchResult::EmptyCategory { category } => {
            format!("No {} articles found.", category.name)
        }
        MatchResult::NoMatch => NO_MATCH_MESSAGE.to_string(),
    }
}
