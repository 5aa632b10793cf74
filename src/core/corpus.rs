//! Corpus files: CSV tables or JSON/YAML lists of article records.
//!
//! Field names accept the spellings used by the Constitution of India CSV
//! export (`Article_No`, `Title`, `Description`) as well as lower-case ones.
//! CSV columns are matched by header; extra columns are ignored.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use walkdir::WalkDir;

use super::article::{Article, ArticleId};

#[derive(Debug, Deserialize)]
struct ArticleRecord {
    #[serde(alias = "Article_No", alias = "article_no", alias = "id", default)]
    article: String,
    #[serde(alias = "Title", default)]
    title: String,
    #[serde(alias = "Description", alias = "body", default)]
    description: String,
}

#[derive(Debug, Default)]
pub struct Corpus {
    pub articles: Vec<Article>,
    /// Records without an identifier.
    pub skipped: usize,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
    Csv,
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Option<Format> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "csv" => Some(Format::Csv),
        "json" => Some(Format::Json),
        "yaml" | "yml" => Some(Format::Yaml),
        _ => None,
    }
}

/// Load a corpus file, or every corpus file below a directory.
///
/// Identifiers must be unique across the whole corpus.
pub fn load_corpus(path: &Path) -> Result<Corpus> {
    let files = if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && format_of(e.path()).is_some())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    } else if format_of(path).is_some() {
        vec![path.to_path_buf()]
    } else {
        bail!(
            "unsupported corpus file '{}': expected .csv, .json, .yaml or .yml",
            path.display()
        );
    };

    let mut corpus = Corpus::default();
    let mut seen = HashSet::new();

    for file in &files {
        let records = read_records(file)?;
        for (idx, record) in records.into_iter().enumerate() {
            let raw_id = record.article.trim();
            if raw_id.is_empty() {
                corpus.skipped += 1;
                continue;
            }

            let id = ArticleId::parse(raw_id).with_context(|| {
                format!(
                    "record {} in {}: invalid article identifier '{}'",
                    idx + 1,
                    file.display(),
                    raw_id
                )
            })?;

            if !seen.insert(id.clone()) {
                bail!(
                    "duplicate article identifier '{}' in {}",
                    id,
                    file.display()
                );
            }

            corpus.articles.push(Article::new(
                id,
                record.title.trim(),
                record.description.trim(),
            ));
        }
    }

    corpus.files = files;
    Ok(corpus)
}

fn read_records(path: &Path) -> Result<Vec<ArticleRecord>> {
    if format_of(path) == Some(Format::Csv) {
        return read_csv_records(path);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;

    let records = match format_of(path) {
        Some(Format::Json) => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON corpus {}", path.display()))?,
        Some(Format::Yaml) => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML corpus {}", path.display()))?,
        Some(Format::Csv) | None => Vec::new(),
    };

    Ok(records)
}

fn read_csv_records(path: &Path) -> Result<Vec<ArticleRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;

    reader
        .deserialize()
        .enumerate()
        .map(|(idx, row)| {
            row.with_context(|| {
                format!("Failed to parse row {} of CSV corpus {}", idx + 1, path.display())
            })
        })
        .collect()
}
