//! Ingest command - Load a corpus into the article store

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use lawsarthi::core::corpus::load_corpus;
use lawsarthi::{AnswerEngine, AppPaths, Settings};

pub fn run(paths: &AppPaths, settings: Settings, path: &Path, json: bool) -> Result<()> {
    let corpus = load_corpus(path)?;
    let engine = AnswerEngine::new(paths, settings);
    let count = engine.ingest(&corpus)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ingested": count,
                "skipped": corpus.skipped,
                "files": corpus.files.len(),
                "db_path": engine.db_path().display().to_string(),
            })
        );
        return Ok(());
    }

    println!(
        "{} Ingested {} articles from {} file(s)",
        "✓".green().bold(),
        count.to_string().cyan(),
        corpus.files.len()
    );
    if corpus.skipped > 0 {
        println!(
            "  {} {} records skipped (no article number)",
            "→".dimmed(),
            corpus.skipped
        );
    }
    println!(
        "  {} Embeddings cleared; run {} next",
        "→".dimmed(),
        "lawsarthi embed".cyan()
    );

    Ok(())
}
