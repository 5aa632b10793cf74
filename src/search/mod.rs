//! Article retrieval
//!
//! Strategies are tried in a fixed order: exact article number, category
//! keywords, then embedding similarity against the stored corpus.

pub mod chunk;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod format;
pub mod router;
#[cfg(feature = "bert")]
pub mod sentence;
pub mod store;

pub use embedding::{EmbeddingProvider, HarmonicEmbedder};
pub use engine::{ask_with_deadline, Answer, AnswerEngine, BackfillStats, Outcome};
pub use error::{RetrievalError, RetrievalResult};
pub use router::{MatchResult, QueryRouter, RouterConfig, Strategy};
pub use store::{ArticleStore, ScoredArticle, SqliteArticleStore, StoreStats};
