//! Law MCP Server implementation

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Settings;
use crate::core::article::ArticleId;
use crate::core::paths::AppPaths;
use crate::search::embedding::EmbeddingProvider;
use crate::search::engine::AnswerEngine;
use crate::search::error::RetrievalError;
use crate::search::format::ERROR_MESSAGE;

/// Parameters for law_ask tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskParams {
    /// Question in plain English (e.g., "What does Article 21 say?")
    #[schemars(description = "Question about the Constitution of India")]
    pub question: String,
}

/// Parameters for law_get_article tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetArticleParams {
    /// Article number (e.g., "21" or "21A")
    #[schemars(description = "Article number, optionally with a letter suffix")]
    pub article: String,
}

#[derive(Debug, Serialize)]
struct ArticleJson<'a> {
    article: &'a str,
    title: &'a str,
    body: &'a str,
}

/// Answer `question` on a blocking worker, giving up after `timeout_ms`.
///
/// Never fails: errors and timeouts are logged and turned into the generic
/// apology.
pub async fn answer_with_deadline<E>(engine: Arc<AnswerEngine<E>>, question: String) -> String
where
    E: EmbeddingProvider + ?Sized + 'static,
{
    let timeout_ms = engine.settings().query_timeout_ms;
    let task = tokio::task::spawn_blocking(move || engine.ask(&question));

    match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
        Ok(Ok(Ok(answer))) => answer.text,
        Ok(Ok(Err(e))) => {
            error!(error = %e, "failed to answer question");
            ERROR_MESSAGE.to_string()
        }
        Ok(Err(e)) => {
            error!(error = %e, "answer task panicked");
            ERROR_MESSAGE.to_string()
        }
        Err(_) => {
            error!(error = %RetrievalError::Timeout { timeout_ms }, "failed to answer question");
            ERROR_MESSAGE.to_string()
        }
    }
}

/// Law MCP Service
#[derive(Clone)]
pub struct LawService {
    engine: Arc<AnswerEngine<dyn EmbeddingProvider>>,
    tool_router: ToolRouter<Self>,
}

impl LawService {
    pub fn new(paths: &AppPaths, settings: Settings) -> Result<Self> {
        let engine = AnswerEngine::from_settings(paths, settings)?;
        Ok(Self::with_engine(Arc::new(engine)))
    }
}

#[tool_router]
impl LawService {
    pub fn with_engine(engine: Arc<AnswerEngine<dyn EmbeddingProvider>>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    /// Answer a question by routing it to the relevant articles
    #[tool(description = "Answer a question about the Constitution of India. Questions naming an article (\"Article 21\") return that article; topic words such as \"citizenship\" return the articles of that topic; anything else returns the closest article by meaning, or a no-match message.")]
    async fn law_ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let text = answer_with_deadline(Arc::clone(&self.engine), params.0.question).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Get a single article by number
    #[tool(description = "Get the title and full text of one article of the Constitution of India by its number, e.g. \"14\" or \"21A\".")]
    async fn law_get_article(
        &self,
        params: Parameters<GetArticleParams>,
    ) -> Result<CallToolResult, McpError> {
        let requested = params.0.article;
        let Some(id) = ArticleId::parse(&requested) else {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "Invalid article number: {}",
                requested
            ))]));
        };

        let engine = Arc::clone(&self.engine);
        let lookup = id.clone();
        let found = tokio::task::spawn_blocking(move || engine.get_article(&lookup))
            .await
            .map_err(|e| McpError::internal_error(format!("Lookup task failed: {}", e), None))?
            .map_err(|e| {
                error!(article = %id, error = %e, "article lookup failed");
                McpError::internal_error(ERROR_MESSAGE.to_string(), None)
            })?;

        match found {
            Some(article) => {
                let output = serde_json::to_string_pretty(&ArticleJson {
                    article: article.id.as_str(),
                    title: &article.title,
                    body: &article.body,
                })
                .map_err(|e| {
                    McpError::internal_error(format!("JSON serialization failed: {}", e), None)
                })?;
                Ok(CallToolResult::success(vec![Content::text(output)]))
            }
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                "Article not found: {}",
                id
            ))])),
        }
    }
}

#[tool_handler]
impl ServerHandler for LawService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Constitution of India MCP Server. Answers questions by article number, topic keyword or semantic similarity.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server over stdio
pub async fn run_mcp_server(paths: &AppPaths, settings: Settings) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let service = LawService::new(paths, settings)?;
    info!(
        db = %service.engine.db_path().display(),
        embedder = service.engine.embedder().embedder_id(),
        "starting MCP server"
    );

    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::article::Article;
    use crate::core::corpus::Corpus;
    use crate::search::embedding::HarmonicEmbedder;
    use crate::search::error::RetrievalResult;

    struct SlowEmbedder;

    impl EmbeddingProvider for SlowEmbedder {
        fn embedder_id(&self) -> &str {
            "slow"
        }

        fn dim(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> RetrievalResult<Vec<f32>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![1.0, 0.0])
        }
    }

    fn engine_with<E: EmbeddingProvider>(
        dir: &tempfile::TempDir,
        settings: Settings,
        embedder: E,
    ) -> Arc<AnswerEngine<E>> {
        let paths = AppPaths::from_root(dir.path().to_path_buf());
        let engine = AnswerEngine::with_embedder(&paths, settings, Arc::new(embedder));
        let corpus = Corpus {
            articles: vec![Article::new(
                ArticleId::parse("21").unwrap(),
                "Protection of life and personal liberty",
                "No person shall be deprived of his life or personal liberty.",
            )],
            ..Corpus::default()
        };
        engine.ingest(&corpus).unwrap();
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_answer_within_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(&dir, Settings::default(), HarmonicEmbedder::new());

        let text = answer_with_deadline(engine, "Explain Article 21".to_string()).await;
        assert!(text.starts_with("Article 21: Protection of life and personal liberty"));
    }

    #[tokio::test]
    async fn test_timeout_returns_generic_message() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            query_timeout_ms: 20,
            ..Settings::default()
        };
        let engine = engine_with(&dir, settings, SlowEmbedder);

        let text = answer_with_deadline(engine, "What about free speech?".to_string()).await;
        assert_eq!(text, ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_store_failure_returns_generic_message() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_root(dir.path().to_path_buf());
        // data directory never created, so the store cannot be opened
        let engine = Arc::new(AnswerEngine::new(&paths, Settings::default()));

        let text = answer_with_deadline(engine, "What does Article 21 say?".to_string()).await;
        assert_eq!(text, ERROR_MESSAGE);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tool_calls_agree() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(&dir, Settings::default(), HarmonicEmbedder::new());
        engine.backfill(false).unwrap();

        let calls = (0..8).map(|i| {
            let question = if i % 2 == 0 {
                "Explain Article 21"
            } else {
                "Can a person be deprived of personal liberty?"
            };
            tokio::spawn(answer_with_deadline(Arc::clone(&engine), question.to_string()))
        });
        let mut texts = Vec::new();
        for call in calls.collect::<Vec<_>>() {
            texts.push(call.await.unwrap());
        }

        for text in &texts {
            assert!(text.starts_with("Article 21: Protection of life and personal liberty"));
        }
        assert!(texts.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_service_uses_configured_engine() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_root(dir.path().to_path_buf());
        let service = LawService::new(&paths, Settings::default()).unwrap();
        assert_eq!(service.engine.embedder().embedder_id(), "htp-v2-d384");
    }
}
