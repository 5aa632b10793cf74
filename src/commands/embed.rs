//! Embed command - Compute article embeddings

use anyhow::Result;
use colored::Colorize;

use lawsarthi::search::EmbeddingProvider;
use lawsarthi::{AnswerEngine, AppPaths, Settings};

pub fn run(paths: &AppPaths, settings: Settings, rebuild: bool, json: bool) -> Result<()> {
    let engine = AnswerEngine::from_settings(paths, settings)?;

    if !engine.db_path().exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "error": "Article store not found",
                    "db_path": engine.db_path().display().to_string(),
                })
            );
        } else {
            eprintln!(
                "{} Article store not found. Run {} first.",
                "Error:".red().bold(),
                "lawsarthi ingest <path>".cyan()
            );
        }
        std::process::exit(1);
    }

    if !json {
        println!("{} Computing embeddings...", "→".dimmed());
    }

    let stats = engine.backfill(rebuild)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "embedded": stats.embedded,
                "chunked": stats.chunked,
                "failed": stats.failed,
                "duration_ms": stats.duration_ms,
                "embedder": engine.embedder().embedder_id(),
            })
        );
    } else {
        println!();
        println!(
            "{} Embedded {} articles in {:.2}s",
            "✓".green().bold(),
            stats.embedded.to_string().cyan(),
            stats.duration_ms as f64 / 1000.0
        );
        if stats.chunked > 0 {
            println!(
                "  {} {} long articles pooled over chunks",
                "→".dimmed(),
                stats.chunked
            );
        }
        if stats.failed > 0 {
            println!("  {} {} articles failed", "✗".red(), stats.failed);
        }
    }

    Ok(())
}
