//! Article store backed by SQLite.
//!
//! Embeddings are kept as little-endian f32 BLOBs next to the article row and
//! similarity is computed in Rust over the rows that have one. Every query
//! binds its values as parameters; vectors never appear in SQL text.

use std::cmp::Ordering;
use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};

use super::embedding::cosine_similarity;
use super::error::{RetrievalError, RetrievalResult};
use crate::core::article::{Article, ArticleId};

const META_EMBEDDER_ID: &str = "embedder_id";
const META_EMBEDDING_DIM: &str = "embedding_dim";
const META_LAST_INGESTED: &str = "last_ingested";

/// An article paired with its similarity to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredArticle {
    pub article: Article,
    pub similarity: f32,
}

/// Read surface the router depends on.
pub trait ArticleStore {
    fn get_by_identifier(&self, id: &ArticleId) -> RetrievalResult<Option<Article>>;

    /// Articles present for `ids`, in ascending identifier order. Missing
    /// identifiers are silently absent from the result.
    fn get_by_identifier_set(&self, ids: &[ArticleId]) -> RetrievalResult<Vec<Article>>;

    /// Up to `k` embedded articles, most similar first, ties by identifier.
    fn nearest_neighbors(&self, query: &[f32], k: usize) -> RetrievalResult<Vec<ScoredArticle>>;

    /// Dimension of stored embeddings, if any have been written.
    fn embedding_dim(&self) -> RetrievalResult<Option<usize>>;

    /// Provider that computed the stored embeddings, if any have been written.
    fn stored_embedder_id(&self) -> RetrievalResult<Option<String>>;
}

impl<S: ArticleStore + ?Sized> ArticleStore for &S {
    fn get_by_identifier(&self, id: &ArticleId) -> RetrievalResult<Option<Article>> {
        (**self).get_by_identifier(id)
    }

    fn get_by_identifier_set(&self, ids: &[ArticleId]) -> RetrievalResult<Vec<Article>> {
        (**self).get_by_identifier_set(ids)
    }

    fn nearest_neighbors(&self, query: &[f32], k: usize) -> RetrievalResult<Vec<ScoredArticle>> {
        (**self).nearest_neighbors(query, k)
    }

    fn embedding_dim(&self) -> RetrievalResult<Option<usize>> {
        (**self).embedding_dim()
    }

    fn stored_embedder_id(&self) -> RetrievalResult<Option<String>> {
        (**self).stored_embedder_id()
    }
}

/// Total order used for ranking: similarity descending, then identifier.
pub fn rank_order(a: &ScoredArticle, b: &ScoredArticle) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.article.id.cmp(&b.article.id))
}

/// Index statistics
#[derive(Debug)]
pub struct StoreStats {
    pub article_count: usize,
    pub embedded_count: usize,
    pub embedder_id: Option<String>,
    pub embedding_dim: Option<usize>,
    pub last_ingested: Option<i64>,
    pub last_embedded: Option<i64>,
}

pub struct SqliteArticleStore {
    conn: Connection,
}

impl SqliteArticleStore {
    /// Open or create the store at `db_path`.
    pub fn open(db_path: &Path) -> RetrievalResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an existing store for lookups only. A missing file is an error,
    /// never an empty store.
    pub fn open_read_only(db_path: &Path) -> RetrievalResult<Self> {
        if !db_path.is_file() {
            return Err(RetrievalError::StoreNotFound {
                path: db_path.to_path_buf(),
            });
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> RetrievalResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> RetrievalResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                embedding BLOB,
                embedded_at INTEGER,
                ingested_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )?;

        Ok(())
    }

    /// Full corpus reload: clears every article and inserts `articles`, all in
    /// one transaction. Stored embeddings and their metadata go with them.
    pub fn replace_all(&mut self, articles: &[Article]) -> RetrievalResult<usize> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM articles", [])?;
        tx.execute(
            "DELETE FROM store_meta WHERE key IN (?1, ?2)",
            params![META_EMBEDDER_ID, META_EMBEDDING_DIM],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO articles (id, title, body, embedding, embedded_at, ingested_at)
                 VALUES (?1, ?2, ?3, NULL, NULL, ?4)",
            )?;
            for article in articles {
                stmt.execute(params![article.id.as_str(), article.title, article.body, now])?;
            }
        }

        tx.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![META_LAST_INGESTED, now.to_string()],
        )?;
        tx.commit()?;

        Ok(articles.len())
    }

    /// Articles that still need an embedding, in identifier order.
    pub fn articles_missing_embedding(&self) -> RetrievalResult<Vec<Article>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, body, embedding FROM articles WHERE embedding IS NULL",
        )?;
        let rows = stmt.query_map([], read_row)?;

        let mut articles = Vec::new();
        for row in rows {
            articles.push(row?.into_article()?);
        }
        articles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(articles)
    }

    /// Persist an embedding. The first embedding written fixes the store's
    /// dimension and embedder; later writes must agree on both. Returns
    /// `false` when no article has `id`.
    pub fn set_embedding(
        &self,
        id: &ArticleId,
        embedding: &[f32],
        embedder_id: &str,
    ) -> RetrievalResult<bool> {
        let stored_dim = self.embedding_dim()?;
        if let Some(expected) = stored_dim {
            if expected != embedding.len() {
                return Err(RetrievalError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let stored_embedder = self.stored_embedder_id()?;
        if let Some(stored) = &stored_embedder {
            if stored != embedder_id {
                return Err(RetrievalError::EmbedderMismatch {
                    stored: stored.clone(),
                    current: embedder_id.to_string(),
                });
            }
        }

        let updated = self.conn.execute(
            "UPDATE articles SET embedding = ?1, embedded_at = ?2 WHERE id = ?3",
            params![
                embedding_to_blob(embedding),
                chrono::Utc::now().timestamp(),
                id.as_str()
            ],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        if stored_dim.is_none() {
            self.set_meta(META_EMBEDDING_DIM, &embedding.len().to_string())?;
        }
        if stored_embedder.is_none() {
            self.set_meta(META_EMBEDDER_ID, embedder_id)?;
        }
        Ok(true)
    }

    /// Drop every embedding so the next backfill recomputes them.
    pub fn clear_embeddings(&self) -> RetrievalResult<usize> {
        let cleared = self
            .conn
            .execute("UPDATE articles SET embedding = NULL, embedded_at = NULL", [])?;
        self.conn.execute(
            "DELETE FROM store_meta WHERE key IN (?1, ?2)",
            params![META_EMBEDDER_ID, META_EMBEDDING_DIM],
        )?;
        Ok(cleared)
    }

    pub fn stats(&self) -> RetrievalResult<StoreStats> {
        let article_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;

        let embedded_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM articles WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let last_embedded: Option<i64> = self
            .conn
            .query_row("SELECT MAX(embedded_at) FROM articles", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();

        Ok(StoreStats {
            article_count: article_count as usize,
            embedded_count: embedded_count as usize,
            embedder_id: self.stored_embedder_id()?,
            embedding_dim: self.embedding_dim()?,
            last_ingested: self
                .get_meta(META_LAST_INGESTED)?
                .and_then(|v| v.parse().ok()),
            last_embedded,
        })
    }

    fn set_meta(&self, key: &str, value: &str) -> RetrievalResult<()> {
        self.conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> RetrievalResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(value)
    }
}

impl ArticleStore for SqliteArticleStore {
    fn get_by_identifier(&self, id: &ArticleId) -> RetrievalResult<Option<Article>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, body, embedding FROM articles WHERE id = ?1",
                params![id.as_str()],
                read_row,
            )
            .optional()?;

        row.map(ArticleRow::into_article).transpose()
    }

    fn get_by_identifier_set(&self, ids: &[ArticleId]) -> RetrievalResult<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, title, body, embedding FROM articles WHERE id IN ({})",
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter().map(ArticleId::as_str)), read_row)?;

        let mut articles = Vec::new();
        for row in rows {
            articles.push(row?.into_article()?);
        }
        articles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(articles)
    }

    fn nearest_neighbors(&self, query: &[f32], k: usize) -> RetrievalResult<Vec<ScoredArticle>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // Exhaustive scan; the corpus is a few hundred articles.
        let mut stmt = self.conn.prepare(
            "SELECT id, title, body, embedding FROM articles WHERE embedding IS NOT NULL",
        )?;
        let rows = stmt.query_map([], read_row)?;

        let mut scored = Vec::new();
        for row in rows {
            let article = row?.into_article()?;
            let Some(embedding) = article.embedding.as_deref() else {
                continue;
            };
            if embedding.len() != query.len() {
                return Err(RetrievalError::DimensionMismatch {
                    expected: embedding.len(),
                    actual: query.len(),
                });
            }

            let similarity = cosine_similarity(query, embedding);
            scored.push(ScoredArticle {
                article,
                similarity,
            });
        }

        scored.sort_by(rank_order);
        scored.truncate(k);
        Ok(scored)
    }

    fn embedding_dim(&self) -> RetrievalResult<Option<usize>> {
        Ok(self
            .get_meta(META_EMBEDDING_DIM)?
            .and_then(|v| v.parse().ok()))
    }

    fn stored_embedder_id(&self) -> RetrievalResult<Option<String>> {
        self.get_meta(META_EMBEDDER_ID)
    }
}

struct ArticleRow {
    id: ArticleId,
    title: String,
    body: String,
    embedding: Option<Vec<u8>>,
}

impl ArticleRow {
    fn into_article(self) -> RetrievalResult<Article> {
        let embedding = match self.embedding {
            Some(blob) => Some(blob_to_embedding(&blob).ok_or_else(|| {
                RetrievalError::CorruptEmbedding {
                    id: self.id.to_string(),
                    len: blob.len(),
                }
            })?),
            None => None,
        };

        Ok(Article {
            id: self.id,
            title: self.title,
            body: self.body,
            embedding,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ArticleRow> {
    let raw_id: String = row.get(0)?;
    let id = ArticleId::parse(&raw_id).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Text,
            format!("invalid article identifier '{}'", raw_id).into(),
        )
    })?;

    Ok(ArticleRow {
        id,
        title: row.get(1)?,
        body: row.get(2)?,
        embedding: row.get(3)?,
    })
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
