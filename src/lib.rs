//! lawsarthi library
//!
//! Answers questions about the Constitution of India by routing them to the
//! articles that address them.
//!
//! # Modules
//!
//! - `core`: Articles, queries, keyword categories and corpus files
//! - `search`: Query routing, the article store and embeddings
//! - `config`: Settings file and environment overrides
//! - `mcp`: MCP server exposing the router as tools

pub mod config;
pub mod core;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod search;

// Re-exports for convenience
pub use crate::config::{ConfigError, Settings};
pub use crate::core::article::{Article, ArticleId};
pub use crate::core::category::Category;
pub use crate::core::paths::AppPaths;
pub use crate::core::query::Query;
pub use crate::search::{Answer, AnswerEngine, MatchResult, RetrievalError, Strategy};
