//! Answer engine - ties settings, the article store and the embedder together
//!
//! The store connection is opened per call and dropped when the call ends, so
//! an engine can be shared across worker threads. Lookups open the store
//! read-only; only ingest and backfill write to it.

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::chunk::chunk_text;
use super::embedding::{mean_pool, EmbeddingProvider, HarmonicEmbedder};
use super::error::{RetrievalError, RetrievalResult};
use super::format::{format_match, ERROR_MESSAGE, INVALID_QUESTION_MESSAGE};
use super::router::{MatchResult, QueryRouter, Strategy};
use super::store::{ArticleStore, SqliteArticleStore, StoreStats};
use crate::config::Settings;
use crate::core::article::{Article, ArticleId};
use crate::core::corpus::Corpus;
use crate::core::paths::AppPaths;
use crate::core::query::Query;

/// What a question resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Empty or whitespace-only input; nothing was looked up.
    InvalidQuestion,
    Matched(MatchResult),
}

/// Formatted reply plus the structured result behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub outcome: Outcome,
}

impl Answer {
    pub fn strategy(&self) -> Option<Strategy> {
        match &self.outcome {
            Outcome::Matched(result) => result.strategy(),
            Outcome::InvalidQuestion => None,
        }
    }

    pub fn article_ids(&self) -> Vec<&ArticleId> {
        match &self.outcome {
            Outcome::Matched(result) => result.articles().into_iter().map(|a| &a.id).collect(),
            Outcome::InvalidQuestion => Vec::new(),
        }
    }

    pub fn similarity(&self) -> Option<f32> {
        match &self.outcome {
            Outcome::Matched(result) => result.similarity(),
            Outcome::InvalidQuestion => None,
        }
    }
}

/// Embedding backfill statistics
#[derive(Debug, Default)]
pub struct BackfillStats {
    pub embedded: usize,
    /// Articles whose body was split into several chunks.
    pub chunked: usize,
    pub failed: usize,
    pub duration_ms: u128,
}

pub struct AnswerEngine<E: ?Sized = HarmonicEmbedder> {
    settings: Settings,
    db_path: PathBuf,
    embedder: Arc<E>,
}

impl AnswerEngine<HarmonicEmbedder> {
    /// Engine with the bundled embedder.
    pub fn new(paths: &AppPaths, settings: Settings) -> Self {
        Self::with_embedder(paths, settings, Arc::new(HarmonicEmbedder::new()))
    }
}

impl AnswerEngine<dyn EmbeddingProvider> {
    /// Engine with the provider the settings select: the sentence-transformer
    /// model in `model_dir` when set, HTP otherwise.
    pub fn from_settings(paths: &AppPaths, settings: Settings) -> RetrievalResult<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = match settings.model_dir(paths) {
            None => Arc::new(HarmonicEmbedder::new()),
            #[cfg(feature = "bert")]
            Some(dir) => Arc::new(super::sentence::SentenceEmbedder::load(&dir)?),
            #[cfg(not(feature = "bert"))]
            Some(dir) => {
                return Err(RetrievalError::Embedding {
                    provider: "sentence".to_string(),
                    message: format!(
                        "model_dir {} is set but this build lacks the `bert` feature",
                        dir.display()
                    ),
                })
            }
        };
        Ok(Self::with_embedder(paths, settings, embedder))
    }
}

impl<E: EmbeddingProvider + ?Sized> AnswerEngine<E> {
    pub fn with_embedder(paths: &AppPaths, settings: Settings, embedder: Arc<E>) -> Self {
        let db_path = settings.db_path(paths);
        Self {
            settings,
            db_path,
            embedder,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Semantic threshold in effect: the configured one, else the provider's.
    pub fn similarity_threshold(&self) -> f32 {
        self.settings
            .similarity_threshold
            .unwrap_or_else(|| self.embedder.recommended_threshold())
    }

    fn open_store(&self) -> RetrievalResult<SqliteArticleStore> {
        SqliteArticleStore::open(&self.db_path)
    }

    fn open_store_read_only(&self) -> RetrievalResult<SqliteArticleStore> {
        SqliteArticleStore::open_read_only(&self.db_path)
    }

    /// Answer a question. Collaborator failures are returned as errors.
    pub fn ask(&self, question: &str) -> RetrievalResult<Answer> {
        let Some(query) = Query::parse(question) else {
            debug!("rejected empty question");
            return Ok(Answer {
                text: INVALID_QUESTION_MESSAGE.to_string(),
                outcome: Outcome::InvalidQuestion,
            });
        };

        let store = self.open_store_read_only()?;
        let router = QueryRouter::new(
            &store,
            self.embedder.as_ref(),
            self.settings.router_config(self.embedder.recommended_threshold()),
        );
        let result = router.route(&query)?;

        Ok(Answer {
            text: format_match(&result),
            outcome: Outcome::Matched(result),
        })
    }

    /// Answer a question for an end user: failures are logged and replaced by
    /// a generic apology.
    pub fn respond(&self, question: &str) -> String {
        match self.ask(question) {
            Ok(answer) => answer.text,
            Err(e) => {
                error!(error = %e, "failed to answer question");
                ERROR_MESSAGE.to_string()
            }
        }
    }

    /// Replace the stored corpus with `corpus`.
    pub fn ingest(&self, corpus: &Corpus) -> RetrievalResult<usize> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut store = self.open_store()?;
        let count = store.replace_all(&corpus.articles)?;
        info!(
            articles = count,
            skipped = corpus.skipped,
            files = corpus.files.len(),
            "corpus ingested"
        );
        Ok(count)
    }

    /// Compute embeddings for every article that lacks one. With `rebuild`,
    /// existing embeddings are discarded first.
    pub fn backfill(&self, rebuild: bool) -> RetrievalResult<BackfillStats> {
        let start = Instant::now();
        let store = self.open_store()?;

        if rebuild {
            let cleared = store.clear_embeddings()?;
            info!(cleared, "cleared existing embeddings");
        }

        if let Some(stored) = store.embedding_dim()? {
            if stored != self.embedder.dim() {
                return Err(RetrievalError::DimensionMismatch {
                    expected: stored,
                    actual: self.embedder.dim(),
                });
            }
        }
        if let Some(stored) = store.stored_embedder_id()? {
            if stored != self.embedder.embedder_id() {
                return Err(RetrievalError::EmbedderMismatch {
                    stored,
                    current: self.embedder.embedder_id().to_string(),
                });
            }
        }

        let mut stats = BackfillStats::default();
        for article in store.articles_missing_embedding()? {
            let (vector, chunks) = match self.embed_article(&article) {
                Ok(embedded) => embedded,
                Err(e @ RetrievalError::DimensionMismatch { .. }) => return Err(e),
                Err(e @ RetrievalError::EmbedderMismatch { .. }) => return Err(e),
                Err(e) => {
                    warn!(article = %article.id, error = %e, "failed to embed article");
                    stats.failed += 1;
                    continue;
                }
            };

            store.set_embedding(&article.id, &vector, self.embedder.embedder_id())?;
            stats.embedded += 1;
            if chunks > 1 {
                stats.chunked += 1;
            }
            debug!(article = %article.id, chunks, "article embedded");
        }

        stats.duration_ms = start.elapsed().as_millis();
        info!(
            embedded = stats.embedded,
            chunked = stats.chunked,
            failed = stats.failed,
            "embedding backfill finished"
        );
        Ok(stats)
    }

    /// Embed `title. body`, or when the body is longer than the chunk size,
    /// the mean of `title. chunk` over all overlapping chunks.
    fn embed_article(&self, article: &Article) -> RetrievalResult<(Vec<f32>, usize)> {
        let chunks = chunk_text(
            &article.body,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        );

        let vector = if chunks.len() == 1 {
            self.embed_checked(&article.embedding_text())?
        } else {
            let vectors = chunks
                .iter()
                .map(|chunk| self.embed_checked(&format!("{}. {}", article.title, chunk)))
                .collect::<RetrievalResult<Vec<_>>>()?;
            mean_pool(&vectors).ok_or_else(|| RetrievalError::Embedding {
                provider: self.embedder.embedder_id().to_string(),
                message: format!("could not pool chunks of article {}", article.id),
            })?
        };

        Ok((vector, chunks.len()))
    }

    fn embed_checked(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let vector = self.embedder.embed(text)?;
        if vector.len() != self.embedder.dim() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.embedder.dim(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    pub fn get_article(&self, id: &ArticleId) -> RetrievalResult<Option<Article>> {
        self.open_store_read_only()?.get_by_identifier(id)
    }

    pub fn stats(&self) -> RetrievalResult<StoreStats> {
        self.open_store_read_only()?.stats()
    }
}

/// [`AnswerEngine::ask`] on a worker thread, bounded by `query_timeout_ms`.
///
/// On timeout the worker is left to finish on its own; its result is dropped.
pub fn ask_with_deadline<E>(
    engine: Arc<AnswerEngine<E>>,
    question: String,
) -> RetrievalResult<Answer>
where
    E: EmbeddingProvider + ?Sized + 'static,
{
    let timeout_ms = engine.settings().query_timeout_ms;
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("lawsarthi-ask".to_string())
        .spawn(move || {
            // the receiver is gone once the deadline has passed
            let _ = tx.send(engine.ask(&question));
        })?;

    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(RetrievalError::Timeout { timeout_ms }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(RetrievalError::Io(
            std::io::Error::other("answer worker exited without a result"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::HTP_SIMILARITY_THRESHOLD;
    use crate::search::format::NO_MATCH_MESSAGE;

    const ARTICLE_21_BODY: &str = "No person shall be deprived of his life or personal liberty except according to procedure established by law.";

    fn article(id: &str, title: &str, body: &str) -> Article {
        Article::new(ArticleId::parse(id).unwrap(), title, body)
    }

    fn corpus() -> Corpus {
        Corpus {
            articles: vec![
                article("14", "Equality before law", "The State shall not deny to any person equality before the law or the equal protection of the laws within the territory of India."),
                article("21", "Right to Life", ARTICLE_21_BODY),
                article("5", "Citizenship at the commencement of the Constitution", "At the commencement of this Constitution, every person who has his domicile in the territory of India shall be a citizen of India."),
                article("6", "Rights of citizenship of certain persons who have migrated to India from Pakistan", "Notwithstanding anything in article 5, a person who has migrated to the territory of India from the territory now included in Pakistan shall be deemed to be a citizen of India."),
                article("7", "Rights of citizenship of certain migrants to Pakistan", "Notwithstanding anything in articles 5 and 6, a person who has after the first day of March, 1947, migrated from the territory of India to the territory now included in Pakistan shall not be deemed to be a citizen of India."),
            ],
            skipped: 0,
            files: Vec::new(),
        }
    }

    fn engine_in(dir: &tempfile::TempDir, settings: Settings) -> AnswerEngine {
        let paths = AppPaths::from_root(dir.path().to_path_buf());
        AnswerEngine::new(&paths, settings)
    }

    fn ready_engine(dir: &tempfile::TempDir) -> AnswerEngine {
        let settings = Settings {
            categories: vec![crate::core::category::Category::new(
                "citizenship",
                ["citizenship", "citizen", "migrant"],
                ["5", "6", "7"].iter().map(|s| ArticleId::parse(s).unwrap()),
            )],
            ..Settings::default()
        };
        let engine = engine_in(dir, settings);
        engine.ingest(&corpus()).unwrap();
        engine.backfill(false).unwrap();
        engine
    }

    #[test]
    fn test_exact_answer_header() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        let answer = engine.ask("What is Article 21?").unwrap();
        assert_eq!(answer.strategy(), Some(Strategy::Exact));
        assert_eq!(
            answer.text,
            format!("Article 21: Right to Life\n\n{}", ARTICLE_21_BODY)
        );
    }

    #[test]
    fn test_category_answer_lists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        let answer = engine.ask("Tell me about citizenship").unwrap();
        assert_eq!(answer.strategy(), Some(Strategy::Category));
        let ids: Vec<&str> = answer.article_ids().iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["5", "6", "7"]);

        let p5 = answer.text.find("Article 5: ").unwrap();
        let p6 = answer.text.find("Article 6: ").unwrap();
        let p7 = answer.text.find("Article 7: ").unwrap();
        assert!(p5 < p6 && p6 < p7);
    }

    #[test]
    fn test_semantic_answer() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        let answer = engine
            .ask("Does the State guarantee equality before the law?")
            .unwrap();
        assert_eq!(answer.strategy(), Some(Strategy::Semantic));
        assert_eq!(answer.article_ids()[0].as_str(), "14");
        assert!(answer.similarity().unwrap() >= HTP_SIMILARITY_THRESHOLD);
        assert!(answer.text.starts_with("Article 14: Equality before law\n\n"));
    }

    #[test]
    fn test_unrelated_question_gets_no_match_message() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        let answer = engine.ask("banana recipe").unwrap();
        assert_eq!(answer.outcome, Outcome::Matched(MatchResult::NoMatch));
        assert_eq!(answer.text, NO_MATCH_MESSAGE);
    }

    #[test]
    fn test_blank_question_never_opens_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            db_path: dir.path().join("missing/dir/articles.db"),
            ..Settings::default()
        };
        let engine = engine_in(&dir, settings);

        let answer = engine.ask("   ").unwrap();
        assert_eq!(answer.outcome, Outcome::InvalidQuestion);
        assert_eq!(answer.text, INVALID_QUESTION_MESSAGE);
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn test_store_failure_becomes_generic_message() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            db_path: dir.path().join("missing/dir/articles.db"),
            ..Settings::default()
        };
        let engine = engine_in(&dir, settings);

        assert!(engine.ask("What is Article 21?").is_err());
        assert_eq!(engine.respond("What is Article 21?"), ERROR_MESSAGE);
    }

    #[test]
    fn test_unloaded_store_is_reported_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir, Settings::default());
        std::fs::create_dir_all(engine.db_path().parent().unwrap()).unwrap();

        let err = engine.ask("What does Article 21 say?").unwrap_err();
        assert!(matches!(err, RetrievalError::StoreNotFound { .. }));
        let err = engine.get_article(&ArticleId::parse("21").unwrap()).unwrap_err();
        assert!(matches!(err, RetrievalError::StoreNotFound { .. }));
        assert!(!engine.db_path().exists());
        assert_eq!(engine.respond("What does Article 21 say?"), ERROR_MESSAGE);
    }

    #[test]
    fn test_paraphrase_reaches_semantic_match() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        let answer = engine
            .ask("Can a person be deprived of personal liberty?")
            .unwrap();
        assert_eq!(answer.strategy(), Some(Strategy::Semantic));
        assert_eq!(answer.article_ids()[0].as_str(), "21");
        assert!(answer.similarity().unwrap() >= engine.similarity_threshold());
    }

    #[test]
    fn test_configured_threshold_overrides_provider() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(&dir, Settings::default());
        assert_eq!(engine.similarity_threshold(), HTP_SIMILARITY_THRESHOLD);

        let strict = engine_in(
            &dir,
            Settings {
                similarity_threshold: Some(0.9),
                ..Settings::default()
            },
        );
        assert_eq!(strict.similarity_threshold(), 0.9);
    }

    #[test]
    fn test_concurrent_asks_share_one_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ready_engine(&dir));
        let questions = [
            "What is Article 21?",
            "Tell me about citizenship",
            "Does the State guarantee equality before the law?",
            "banana recipe",
        ];
        let expected: Vec<Answer> = questions.iter().map(|q| engine.ask(q).unwrap()).collect();

        let results: Vec<Vec<Answer>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    scope.spawn(move || {
                        questions
                            .iter()
                            .map(|q| engine.ask(q).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.len(), 8);
        for answers in results {
            assert_eq!(answers, expected);
        }
    }

    struct SlowEmbedder;

    impl EmbeddingProvider for SlowEmbedder {
        fn embedder_id(&self) -> &str {
            "slow-d2"
        }

        fn dim(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> RetrievalResult<Vec<f32>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![1.0, 0.0])
        }
    }

    #[test]
    fn test_deadline_turns_slow_answer_into_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_root(dir.path().to_path_buf());
        let settings = Settings {
            query_timeout_ms: 20,
            ..Settings::default()
        };
        let engine = AnswerEngine::with_embedder(&paths, settings, Arc::new(SlowEmbedder));
        engine.ingest(&corpus()).unwrap();

        let err = ask_with_deadline(Arc::new(engine), "free speech".to_string()).unwrap_err();
        assert!(matches!(err, RetrievalError::Timeout { timeout_ms: 20 }));
    }

    #[test]
    fn test_settings_select_bundled_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_root(dir.path().to_path_buf());
        let engine = AnswerEngine::from_settings(&paths, Settings::default()).unwrap();
        assert_eq!(engine.embedder().embedder_id(), "htp-v2-d384");
    }

    #[test]
    fn test_unusable_model_dir_is_an_embedding_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_root(dir.path().to_path_buf());
        let settings = Settings {
            model_dir: Some(PathBuf::from("models/all-MiniLM-L6-v2")),
            ..Settings::default()
        };

        let err = AnswerEngine::from_settings(&paths, settings).err().unwrap();
        assert!(matches!(err, RetrievalError::Embedding { .. }));
    }

    #[test]
    fn test_answers_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        for question in [
            "What is Article 21?",
            "citizen rights",
            "Does the State guarantee equality before the law?",
            "banana recipe",
        ] {
            assert_eq!(engine.respond(question), engine.respond(question));
        }
    }

    #[test]
    fn test_backfill_is_incremental() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        let again = engine.backfill(false).unwrap();
        assert_eq!(again.embedded, 0);

        let rebuilt = engine.backfill(true).unwrap();
        assert_eq!(rebuilt.embedded, 5);

        let stats = engine.stats().unwrap();
        assert_eq!(stats.article_count, 5);
        assert_eq!(stats.embedded_count, 5);
        assert_eq!(stats.embedding_dim, Some(384));
        assert_eq!(stats.embedder_id.as_deref(), Some("htp-v2-d384"));
    }

    #[test]
    fn test_long_bodies_are_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            chunk_size: 40,
            chunk_overlap: 10,
            ..Settings::default()
        };
        let engine = engine_in(&dir, settings);
        engine.ingest(&corpus()).unwrap();

        let stats = engine.backfill(false).unwrap();
        assert_eq!(stats.embedded, 5);
        assert_eq!(stats.chunked, 5);

        let stored = engine
            .get_article(&ArticleId::parse("21").unwrap())
            .unwrap()
            .unwrap();
        let vector = stored.embedding.unwrap();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_backfill_rejects_other_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ready_engine(&dir);

        assert_eq!(engine.stats().unwrap().embedding_dim, Some(384));

        let paths = AppPaths::from_root(dir.path().to_path_buf());
        let small = AnswerEngine::with_embedder(
            &paths,
            Settings::default(),
            Arc::new(HarmonicEmbedder::with_dim(8).unwrap()),
        );

        let err = small.backfill(false).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch { expected: 384, actual: 8 }
        ));
        assert_eq!(small.respond("Does the State guarantee equality?"), ERROR_MESSAGE);
    }
}
