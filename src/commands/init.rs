use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use lawsarthi::{AppPaths, Settings};

pub fn run(paths: &AppPaths, config: Option<&Path>, force: bool) -> Result<()> {
    let target = config.unwrap_or(&paths.config);

    if target.exists() && !force {
        println!(
            "{} {} already exists. Run with {} to overwrite.",
            "!".yellow().bold(),
            target.display(),
            "--force".cyan()
        );
        return Ok(());
    }

    let yaml = Settings::default().to_yaml()?;
    fs::write(target, yaml).with_context(|| format!("failed to write {}", target.display()))?;
    println!("{} Wrote {}", "✓".green(), target.display());

    fs::create_dir_all(&paths.data)
        .with_context(|| format!("failed to create {}", paths.data.display()))?;
    println!("{} Data directory {}", "✓".green(), paths.data.display());

    println!();
    println!("Next steps:");
    println!("  {} lawsarthi ingest <corpus.json>", "→".dimmed());
    println!("  {} lawsarthi embed", "→".dimmed());
    println!("  {} lawsarthi ask \"What does Article 21 say?\"", "→".dimmed());

    Ok(())
}
