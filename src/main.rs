mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lawsarthi::{AppPaths, Settings};

const DEFAULT_LOG_FILTER: &str = "lawsarthi=info";

#[derive(Parser)]
#[command(name = "lawsarthi")]
#[command(about = "Answer questions about the Constitution of India", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Settings file (default: ./lawsarthi.yaml)")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file
    Init {
        #[arg(long, help = "Overwrite an existing settings file")]
        force: bool,
    },
    /// Load a corpus file or directory into the article store
    Ingest {
        path: PathBuf,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Compute embeddings for articles that have none
    Embed {
        #[arg(long, help = "Discard existing embeddings first")]
        rebuild: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Ask a question
    Ask {
        question: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show article store status
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries answers and the MCP transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let paths = AppPaths::from_current_dir().context("failed to resolve working directory")?;

    if let Commands::Init { force } = cli.command {
        return commands::init::run(&paths, cli.config.as_deref(), force);
    }

    let settings = Settings::load(&paths, cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Ingest { path, json } => commands::ingest::run(&paths, settings, &path, json),
        Commands::Embed { rebuild, json } => commands::embed::run(&paths, settings, rebuild, json),
        Commands::Ask { question, json } => commands::ask::run(&paths, settings, &question, json),
        Commands::Status { json } => commands::status::run(&paths, settings, json),

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(&paths);
                Ok(())
            } else {
                run_mcp_server(&paths, settings)
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server(paths: &AppPaths, settings: Settings) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(lawsarthi::mcp::run_mcp_server(paths, settings))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(paths: &AppPaths) {
    use colored::Colorize;

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "lawsarthi".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(
        r#"{{
  "mcpServers": {{
    "lawsarthi": {{
      "command": "{}",
      "args": ["mcp"],
      "cwd": "{}"
    }}
  }}
}}"#,
        binary_path,
        paths.root.display()
    );
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Answer a question about the Constitution", "law_ask".green());
    println!("  • {} - Get one article by number", "law_get_article".green());
}
