//! Settings loaded from `lawsarthi.yaml`, overridable with `LAWSARTHI_*`
//! environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::category::{default_categories, Category};
use crate::core::paths::{AppPaths, DATA_DIR_NAME, DB_FILE_NAME};
use crate::search::router::{RouterConfig, DEFAULT_TOP_K};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("similarity_threshold must be within [-1, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    InvalidChunking { size: usize, overlap: usize },

    #[error("query_timeout_ms must be at least 1")]
    InvalidTimeout,

    #[error("category '{category}': {reason}")]
    InvalidCategory { category: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Relative paths are resolved against the project root.
    pub db_path: PathBuf,
    /// Minimum similarity for a semantic match. Unset means the embedding
    /// provider's recommended value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    pub top_k: usize,
    /// Bodies longer than this many characters are embedded chunk by chunk.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub query_timeout_ms: u64,
    /// Directory holding a sentence-transformer model (`config.json`,
    /// `tokenizer.json`, `model.safetensors`). Unset selects the bundled
    /// HTP embedder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
    pub categories: Vec<Category>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: Path::new(DATA_DIR_NAME).join(DB_FILE_NAME),
            similarity_threshold: None,
            top_k: DEFAULT_TOP_K,
            chunk_size: 500,
            chunk_overlap: 50,
            query_timeout_ms: 10_000,
            model_dir: None,
            categories: default_categories(),
        }
    }
}

impl Settings {
    const ENV_DB_PATH: &'static str = "LAWSARTHI_DB_PATH";
    const ENV_THRESHOLD: &'static str = "LAWSARTHI_SIMILARITY_THRESHOLD";
    const ENV_TOP_K: &'static str = "LAWSARTHI_TOP_K";
    const ENV_TIMEOUT: &'static str = "LAWSARTHI_QUERY_TIMEOUT_MS";
    const ENV_MODEL_DIR: &'static str = "LAWSARTHI_MODEL_DIR";

    /// Load settings for a project: the explicit `config` file if given,
    /// otherwise `lawsarthi.yaml` under the root when present, otherwise
    /// defaults. Environment overrides and validation are applied last.
    pub fn load(paths: &AppPaths, config: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match config {
            Some(path) => Self::from_file(path)?,
            None if paths.config.exists() => Self::from_file(&paths.config)?,
            None => Self::default(),
        };

        settings.apply_env(|name| env::var(name).ok())?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(Self::ENV_DB_PATH) {
            self.db_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(Self::ENV_THRESHOLD) {
            self.similarity_threshold = Some(parse_env(Self::ENV_THRESHOLD, value)?);
        }
        if let Some(value) = lookup(Self::ENV_TOP_K) {
            self.top_k = parse_env(Self::ENV_TOP_K, value)?;
        }
        if let Some(value) = lookup(Self::ENV_TIMEOUT) {
            self.query_timeout_ms = parse_env(Self::ENV_TIMEOUT, value)?;
        }
        if let Some(value) = lookup(Self::ENV_MODEL_DIR) {
            self.model_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Lower-case and trim category keywords so matching is case-insensitive.
    fn normalize(&mut self) {
        for category in &mut self.categories {
            category.keywords = category
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.similarity_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidThreshold(threshold));
            }
        }
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunking {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        for category in &self.categories {
            let reason = if category.name.trim().is_empty() {
                Some("name is empty")
            } else if category.keywords.iter().all(|k| k.trim().is_empty()) {
                Some("no trigger keywords")
            } else if category.articles.is_empty() {
                Some("no article identifiers")
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(ConfigError::InvalidCategory {
                    category: category.name.clone(),
                    reason: reason.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Router settings; `default_threshold` applies when none is configured.
    pub fn router_config(&self, default_threshold: f32) -> RouterConfig {
        RouterConfig {
            similarity_threshold: self.similarity_threshold.unwrap_or(default_threshold),
            top_k: self.top_k,
            categories: self.categories.clone(),
        }
    }

    pub fn db_path(&self, paths: &AppPaths) -> PathBuf {
        paths.resolve(&self.db_path)
    }

    pub fn model_dir(&self, paths: &AppPaths) -> Option<PathBuf> {
        self.model_dir.as_deref().map(|dir| paths.resolve(dir))
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.similarity_threshold, None);
        assert_eq!(settings.model_dir, None);
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.categories[0].name, "citizenship");
        assert_eq!(settings.db_path, PathBuf::from(".lawsarthi/articles.db"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml(
            r#"
similarity_threshold: 0.75
categories:
  - name: equality
    keywords: [Equality, "  EQUAL  "]
    articles: ["14", "15", "16"]
"#,
        )
        .unwrap();

        assert_eq!(settings.similarity_threshold, Some(0.75));
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.categories.len(), 1);
        assert_eq!(settings.categories[0].heading, None);
    }

    #[test]
    fn test_yaml_rejects_bad_identifier() {
        let result = Settings::from_yaml(
            "categories:\n  - name: x\n    keywords: [x]\n    articles: [\"fourteen\"]\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = Settings::default().to_yaml().unwrap();
        assert_eq!(Settings::from_yaml(&yaml).unwrap(), Settings::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env(env_of(&[
                ("LAWSARTHI_SIMILARITY_THRESHOLD", "0.45"),
                ("LAWSARTHI_TOP_K", " 8 "),
                ("LAWSARTHI_DB_PATH", "/var/lib/lawsarthi.db"),
                ("LAWSARTHI_QUERY_TIMEOUT_MS", "2500"),
                ("LAWSARTHI_MODEL_DIR", "models/all-MiniLM-L6-v2"),
            ]))
            .unwrap();

        assert_eq!(settings.similarity_threshold, Some(0.45));
        assert_eq!(settings.model_dir, Some(PathBuf::from("models/all-MiniLM-L6-v2")));
        assert_eq!(settings.top_k, 8);
        assert_eq!(settings.db_path, PathBuf::from("/var/lib/lawsarthi.db"));
        assert_eq!(settings.query_timeout_ms, 2500);

        let err = settings
            .apply_env(env_of(&[("LAWSARTHI_TOP_K", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "LAWSARTHI_TOP_K", .. }));
    }

    #[test]
    fn test_threshold_falls_back_to_provider() {
        let settings = Settings::default();
        assert!((settings.router_config(0.35).similarity_threshold - 0.35).abs() < f32::EPSILON);

        let pinned = Settings {
            similarity_threshold: Some(0.6),
            ..Settings::default()
        };
        assert!((pinned.router_config(0.35).similarity_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validation() {
        let invalid = [
            Settings {
                similarity_threshold: Some(1.5),
                ..Settings::default()
            },
            Settings {
                top_k: 0,
                ..Settings::default()
            },
            Settings {
                chunk_overlap: 500,
                ..Settings::default()
            },
            Settings {
                query_timeout_ms: 0,
                ..Settings::default()
            },
            Settings {
                categories: vec![Category::new("empty", Vec::<String>::new(), Vec::new())],
                ..Settings::default()
            },
        ];

        for settings in invalid {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }

    #[test]
    fn test_load_from_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_root(dir.path().to_path_buf());

        // No file yet: defaults
        let settings = Settings::load(&paths, None).unwrap();
        assert_eq!(settings.db_path(&paths), paths.db);

        fs::write(
            &paths.config,
            "top_k: 3\ncategories:\n  - name: equality\n    keywords: [Equality]\n    articles: [\"14\"]\n",
        )
        .unwrap();
        let settings = Settings::load(&paths, None).unwrap();
        assert_eq!(settings.categories[0].keywords, vec!["equality"]);

        let explicit = dir.path().join("other.yaml");
        fs::write(&explicit, "top_k: [not a number]\n").unwrap();
        assert!(matches!(
            Settings::load(&paths, Some(&explicit)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
