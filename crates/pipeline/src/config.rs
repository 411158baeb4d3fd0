use assemble::AlignmentPolicy;
use ingest::ChunkStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "kgpipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub llm: LlmConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub stages: StagesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub html_dir: PathBuf,
    pub cleaned_dir: PathBuf,
    /// Where every stage file is read and written
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    OpenAi,
}

impl Provider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Ollama => extract::OllamaClient::DEFAULT_URL,
            Provider::OpenAi => extract::OpenAiClient::DEFAULT_URL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    /// Defaults to the provider's public endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    /// OpenAI only; falls back to `OPENAI_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Articles processed at once within a stage
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
    pub request_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub chunk_strategy: ChunkStrategy,
    /// Preceding sentences given to the decontextualizer; 0 means all of them
    pub context_window: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pairs_per_sentence: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_html_chars: Option<usize>,
    pub alignment_policy: AlignmentPolicy,
    /// Include the chunk completeness check in `run`
    pub check_chunks: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            html_dir: PathBuf::from("html"),
            cleaned_dir: PathBuf::from("cleaned"),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            base_url: None,
            model: "llama3".to_string(),
            api_key: None,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 1,
            request_timeout_secs: 60,
            request_delay_ms: 0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10000,
        }
    }
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            chunk_strategy: ChunkStrategy::Rule,
            context_window: extract::decontextualize::DEFAULT_CONTEXT_WINDOW,
            max_pairs_per_sentence: None,
            max_html_chars: None,
            alignment_policy: AlignmentPolicy::Strict,
            check_chunks: false,
        }
    }
}

impl LlmConfig {
    /// API key the provider needs: the configured one, else `OPENAI_API_KEY`.
    ///
    /// `None` for providers that take no key. A missing OpenAI key is an error.
    pub fn resolve_api_key(&self) -> Result<Option<String>, ConfigError> {
        self.resolve_api_key_with(std::env::var("OPENAI_API_KEY").ok())
    }

    fn resolve_api_key_with(&self, env_key: Option<String>) -> Result<Option<String>, ConfigError> {
        if self.provider != Provider::OpenAi {
            return Ok(None);
        }

        let non_empty = |key: &String| !key.trim().is_empty();
        self.api_key
            .clone()
            .filter(non_empty)
            .or_else(|| env_key.filter(non_empty))
            .map(Some)
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "the openai provider needs llm.api_key or OPENAI_API_KEY".into(),
                )
            })
    }
}

impl StagesConfig {
    pub fn context_window(&self) -> Option<usize> {
        (self.context_window > 0).then_some(self.context_window)
    }
}

impl PipelineConfig {
    /// Many articles at once, short timeouts, capped relation fan-out
    pub fn fast() -> Self {
        Self {
            concurrency: ConcurrencyConfig {
                max_concurrent_requests: 4,
                request_timeout_secs: 30,
                request_delay_ms: 0,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 50000,
            },
            stages: StagesConfig {
                context_window: 2,
                max_pairs_per_sentence: Some(20),
                ..StagesConfig::default()
            },
            ..Self::default()
        }
    }

    /// One article at a time, full context, fresh responses, chunk check on
    pub fn accurate() -> Self {
        Self {
            concurrency: ConcurrencyConfig {
                max_concurrent_requests: 1,
                request_timeout_secs: 120,
                request_delay_ms: 0,
            },
            retry: RetryConfig {
                max_retries: 5,
                initial_backoff_ms: 2000,
                max_backoff_ms: 20000,
            },
            cache: CacheConfig {
                enabled: false,
                max_entries: 0,
            },
            stages: StagesConfig {
                context_window: 0,
                check_chunks: true,
                ..StagesConfig::default()
            },
            ..Self::default()
        }
    }

    /// Read `path`, or `kgpipe.toml` when present, or fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The config as TOML with any API key masked
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        let mut shown = self.clone();
        if shown.llm.api_key.is_some() {
            shown.llm.api_key = Some("***".to_string());
        }
        toml::to_string_pretty(&shown)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "concurrency.max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.concurrency.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "concurrency.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be at least 1 when the cache is enabled".into(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ms must not be below retry.initial_backoff_ms".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        PipelineConfig::default().validate().unwrap();
        PipelineConfig::fast().validate().unwrap();
        PipelineConfig::accurate().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [llm]
            provider = "openai"
            model = "gpt-4o-mini"

            [stages]
            chunk_strategy = "unicode"
            alignment_policy = "skip_misaligned"
            max_pairs_per_sentence = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.stages.chunk_strategy, ChunkStrategy::Unicode);
        assert_eq!(config.stages.alignment_policy, AlignmentPolicy::SkipMisaligned);
        assert_eq!(config.stages.max_pairs_per_sentence, Some(12));
        assert_eq!(config.stages.context_window(), Some(3));
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.paths.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_zero_context_window_is_unbounded() {
        assert_eq!(PipelineConfig::accurate().stages.context_window(), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.concurrency.max_concurrent_requests = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.retry.max_backoff_ms = 10;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_redacts_key() {
        let mut config = PipelineConfig::fast();
        config.llm.api_key = Some("sk-secret".to_string());

        let text = config.to_redacted_toml().unwrap();
        assert!(!text.contains("sk-secret"));

        let back = PipelineConfig::from_toml(&text).unwrap();
        assert_eq!(back.concurrency, config.concurrency);
        assert_eq!(back.stages, config.stages);
    }

    #[test]
    fn test_openai_key_resolution() {
        let mut llm = LlmConfig {
            provider: Provider::OpenAi,
            ..LlmConfig::default()
        };
        assert!(matches!(
            llm.resolve_api_key_with(None),
            Err(ConfigError::Invalid(_))
        ));
        assert!(llm.resolve_api_key_with(Some("  ".to_string())).is_err());
        assert_eq!(
            llm.resolve_api_key_with(Some("sk-env".to_string())).unwrap(),
            Some("sk-env".to_string())
        );

        llm.api_key = Some("sk-config".to_string());
        assert_eq!(
            llm.resolve_api_key_with(Some("sk-env".to_string())).unwrap(),
            Some("sk-config".to_string())
        );

        let ollama = LlmConfig::default();
        assert_eq!(ollama.resolve_api_key_with(None).unwrap(), None);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/kgpipe.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
