//! Query router: exact identifier, then category, then semantic search.
//!
//! Each strategy either resolves the query or falls through to the next one.
//! Collaborator failures (store, embedding provider) abort the call; they are
//! never turned into a lower-priority strategy or a "no match".

use tracing::{debug, warn};

use super::embedding::EmbeddingProvider;
use super::error::{RetrievalError, RetrievalResult};
use super::store::{ArticleStore, ScoredArticle};
use crate::core::article::Article;
use crate::core::category::{match_category, Category};
use crate::core::query::Query;

/// Default minimum similarity for a semantic match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.60;

/// Default number of nearest neighbours considered.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exact,
    Category,
    Semantic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Category => "category",
            Self::Semantic => "semantic",
        }
    }
}

/// Outcome of routing one query.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// The question named an identifier present in the store.
    Exact(Article),
    /// A category keyword matched; articles are in ascending identifier order.
    Category {
        category: Category,
        articles: Vec<Article>,
    },
    /// A category keyword matched but none of its articles are stored.
    EmptyCategory { category: Category },
    /// Best nearest neighbour at or above the similarity threshold.
    Semantic(ScoredArticle),
    NoMatch,
}

impl MatchResult {
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Self::Exact(_) => Some(Strategy::Exact),
            Self::Category { .. } | Self::EmptyCategory { .. } => Some(Strategy::Category),
            Self::Semantic(_) => Some(Strategy::Semantic),
            Self::NoMatch => None,
        }
    }

    pub fn articles(&self) -> Vec<&Article> {
        match self {
            Self::Exact(article) => vec![article],
            Self::Category { articles, .. } => articles.iter().collect(),
            Self::Semantic(scored) => vec![&scored.article],
            Self::EmptyCategory { .. } | Self::NoMatch => Vec::new(),
        }
    }

    pub fn similarity(&self) -> Option<f32> {
        match self {
            Self::Semantic(scored) => Some(scored.similarity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub similarity_threshold: f32,
    pub top_k: usize,
    pub categories: Vec<Category>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            categories: crate::core::category::default_categories(),
        }
    }
}

pub struct QueryRouter<S, E> {
    store: S,
    embedder: E,
    config: RouterConfig,
}

impl<S: ArticleStore, E: EmbeddingProvider> QueryRouter<S, E> {
    pub fn new(store: S, embedder: E, config: RouterConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Resolve a query to exactly one [`MatchResult`].
    pub fn route(&self, query: &Query) -> RetrievalResult<MatchResult> {
        if let Some(result) = self.match_exact(query)? {
            return Ok(result);
        }

        if let Some(result) = self.match_category(query)? {
            return Ok(result);
        }

        match self.semantic_candidates(query)?.into_iter().next() {
            Some(best) => {
                debug!(
                    article = %best.article.id,
                    similarity = best.similarity,
                    "semantic match"
                );
                Ok(MatchResult::Semantic(best))
            }
            None => {
                debug!(query = query.normalized(), "no strategy matched");
                Ok(MatchResult::NoMatch)
            }
        }
    }

    fn match_exact(&self, query: &Query) -> RetrievalResult<Option<MatchResult>> {
        let Some(id) = query.article_reference() else {
            return Ok(None);
        };

        match self.store.get_by_identifier(&id)? {
            Some(article) => {
                debug!(article = %id, "exact identifier match");
                Ok(Some(MatchResult::Exact(article)))
            }
            None => {
                debug!(article = %id, "referenced article not in store, falling through");
                Ok(None)
            }
        }
    }

    fn match_category(&self, query: &Query) -> RetrievalResult<Option<MatchResult>> {
        let Some(category) = match_category(&self.config.categories, query) else {
            return Ok(None);
        };

        let articles = self
            .store
            .get_by_identifier_set(&category.ordered_articles())?;

        if articles.is_empty() {
            warn!(
                category = %category.name,
                configured = category.articles.len(),
                "category matched but none of its articles are in the store"
            );
            return Ok(Some(MatchResult::EmptyCategory {
                category: category.clone(),
            }));
        }

        debug!(category = %category.name, count = articles.len(), "category match");
        Ok(Some(MatchResult::Category {
            category: category.clone(),
            articles,
        }))
    }

    /// Top-k neighbours of the query at or above the threshold, best first.
    pub fn semantic_candidates(&self, query: &Query) -> RetrievalResult<Vec<ScoredArticle>> {
        let vector = self.embedder.embed(query.raw().trim())?;
        if vector.len() != self.embedder.dim() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.embedder.dim(),
                actual: vector.len(),
            });
        }
        if let Some(stored) = self.store.embedding_dim()? {
            if stored != vector.len() {
                return Err(RetrievalError::DimensionMismatch {
                    expected: stored,
                    actual: vector.len(),
                });
            }
        }
        if let Some(stored) = self.store.stored_embedder_id()? {
            if stored != self.embedder.embedder_id() {
                return Err(RetrievalError::EmbedderMismatch {
                    stored,
                    current: self.embedder.embedder_id().to_string(),
                });
            }
        }

        let threshold = self.config.similarity_threshold;
        let candidates = self.store.nearest_neighbors(&vector, self.config.top_k)?;
        debug!(
            candidates = candidates.len(),
            best = candidates.first().map(|c| c.similarity),
            threshold,
            "nearest neighbours"
        );

        Ok(candidates
            .into_iter()
            .filter(|c| c.similarity >= threshold)
            .collect())
    }
}
