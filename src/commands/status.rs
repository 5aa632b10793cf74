//! Status command - Article store summary

use anyhow::Result;
use colored::*;

use lawsarthi::search::EmbeddingProvider;
use lawsarthi::{AnswerEngine, AppPaths, Settings};

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn run(paths: &AppPaths, settings: Settings, json: bool) -> Result<()> {
    let engine = AnswerEngine::from_settings(paths, settings)?;
    let db_path = engine.db_path().to_path_buf();

    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "db_path": db_path.display().to_string(),
                })
            );
        } else {
            println!(
                "{} Article store not found. Run {} first.",
                "!".yellow().bold(),
                "lawsarthi ingest <path>".cyan()
            );
        }
        return Ok(());
    }

    let stats = engine.stats()?;
    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let settings = engine.settings();
    let threshold = engine.similarity_threshold();
    let categories: Vec<_> = settings.categories.iter().map(|c| c.name.as_str()).collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "exists": true,
                "db_path": db_path.display().to_string(),
                "article_count": stats.article_count,
                "embedded_count": stats.embedded_count,
                "embedder_id": stats.embedder_id,
                "embedding_dim": stats.embedding_dim,
                "last_ingested": stats.last_ingested,
                "last_embedded": stats.last_embedded,
                "file_size_bytes": file_size,
                "similarity_threshold": threshold,
                "active_embedder": engine.embedder().embedder_id(),
                "top_k": settings.top_k,
                "categories": categories,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Article Store".bold());
    println!();
    println!(
        "  {} {} articles",
        "→".dimmed(),
        stats.article_count.to_string().cyan()
    );

    let pending = stats.article_count.saturating_sub(stats.embedded_count);
    let embedded = stats.embedded_count.to_string();
    println!(
        "  {} {} embedded{}",
        "→".dimmed(),
        if pending > 0 { embedded.yellow() } else { embedded.green() },
        if pending > 0 {
            format!(" ({} pending)", pending)
        } else {
            String::new()
        }
    );

    if let (Some(id), Some(dim)) = (&stats.embedder_id, stats.embedding_dim) {
        println!("  {} Embedder: {} ({} dims)", "→".dimmed(), id, dim);
    }
    println!("  {} Size: {:.2} KB", "→".dimmed(), file_size as f64 / 1024.0);
    if let Some(ts) = stats.last_ingested {
        println!("  {} Last ingested: {}", "→".dimmed(), format_timestamp(ts));
    }
    if let Some(ts) = stats.last_embedded {
        println!("  {} Last embedded: {}", "→".dimmed(), format_timestamp(ts));
    }

    println!();
    println!("{}", "Routing".bold());
    println!();
    println!(
        "  {} Similarity threshold: {:.2} (top {})",
        "→".dimmed(),
        threshold,
        settings.top_k
    );
    println!(
        "  {} Query embedder: {}",
        "→".dimmed(),
        engine.embedder().embedder_id()
    );
    println!("  {} Categories: {}", "→".dimmed(), categories.join(", "));

    Ok(())
}
