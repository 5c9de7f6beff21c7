//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Upper bound on the automatically sized worker pool.
pub const MAX_AUTO_WORKERS: usize = 32;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub sparse: SparseConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Serialize the configuration back to TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default_config_string())?;
        Ok(())
    }

    /// Check the settings a run cannot do without.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.llm.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[llm.endpoints]] entry is required".to_string(),
            ));
        }
        if let Some(endpoint) = self.llm.endpoints.iter().find(|e| e.base_url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "llm endpoint '{}' has no base_url",
                endpoint.name
            )));
        }
        if self.embedding.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("embedding.base_url is empty".to_string()));
        }
        if self.sparse.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("sparse.base_url is empty".to_string()));
        }
        if self.sparse.max_attempts == 0 {
            return Err(ConfigError::Invalid("sparse.max_attempts must be at least 1".to_string()));
        }
        if self.pipeline.checkpoint_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.checkpoint_batch_size must be at least 1".to_string(),
            ));
        }
        if self.pipeline.intra_document_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.intra_document_concurrency must be at least 1".to_string(),
            ));
        }
        if self.pipeline.per_document_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.per_document_timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Pagewise Configuration
# Offline page enrichment: context summaries, dense and sparse embeddings

[llm]
# Request timeout in seconds for one chat completion
timeout_seconds = 480
temperature = 0.0
top_p = 0.5
max_tokens = 4096

# Upper bound of the random pause before each endpoint attempt (milliseconds)
failover_jitter_ms = 1000

# Interchangeable OpenAI-compatible endpoints. Each call tries them in random
# order until one succeeds.
[[llm.endpoints]]
name = "local-0"
base_url = "http://localhost:8000/v1"
model = "qwen2.5-7b-instruct"
# api_key = "EMPTY"

[embedding]
# OpenAI-compatible embeddings endpoint
base_url = "http://localhost:8001/v1"
model = "bge-m3"
# api_key = ""
timeout_seconds = 120

[sparse]
# Sparse embedding service (POST {base_url}/sparse_embed)
base_url = "http://localhost:8002"
attempt_timeout_seconds = 3
max_attempts = 3
base_delay_ms = 500

[pipeline]
# Documents per checkpoint file
checkpoint_batch_size = 2000

# Documents processed in parallel (0 = available parallelism, at most 32)
max_workers = 0

# Wall-clock limit for one document; a timed-out document is retried once
per_document_timeout_seconds = 300

# Concurrent model calls while processing one document
intra_document_concurrency = 24
"#
        .to_string()
    }
}

/// One interchangeable chat-completion endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoints: Vec<EndpointConfig>,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub failover_jitter_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![],
            timeout_seconds: 480,
            temperature: 0.0,
            top_p: 0.5,
            max_tokens: 4096,
            failover_jitter_ms: 1000,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn failover_jitter(&self) -> Duration {
        Duration::from_millis(self.failover_jitter_ms)
    }
}

/// Dense embedding backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001/v1".to_string(),
            model: "bge-m3".to_string(),
            api_key: None,
            timeout_seconds: 120,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Sparse embedding backend settings, including its retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseConfig {
    pub base_url: String,
    pub attempt_timeout_seconds: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            attempt_timeout_seconds: 3,
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl SparseConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Batch scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub checkpoint_batch_size: usize,
    pub max_workers: usize,
    pub per_document_timeout_seconds: u64,
    pub intra_document_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            checkpoint_batch_size: 2000,
            max_workers: 0,
            per_document_timeout_seconds: 300,
            intra_document_concurrency: 24,
        }
    }
}

impl PipelineConfig {
    /// Worker count after resolving `0` to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_AUTO_WORKERS)
    }

    pub fn per_document_timeout(&self) -> Duration {
        Duration::from_secs(self.per_document_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.checkpoint_batch_size, 2000);
        assert_eq!(config.pipeline.per_document_timeout_seconds, 300);
        assert_eq!(config.pipeline.intra_document_concurrency, 24);
        assert_eq!(config.sparse.max_attempts, 3);
        assert!(config.llm.endpoints.is_empty());
    }

    #[test]
    fn test_default_config_string_parses_and_validates() {
        let config: Config = toml::from_str(&Config::default_config_string()).unwrap();
        assert_eq!(config.llm.endpoints.len(), 1);
        assert_eq!(config.llm.endpoints[0].name, "local-0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config: Config = toml::from_str(&Config::default_config_string()).unwrap();
        let serialized = config.to_toml_string().unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.llm.endpoints[0].base_url, deserialized.llm.endpoints[0].base_url);
        assert_eq!(config.embedding.model, deserialized.embedding.model);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [pipeline]
            checkpoint_batch_size = 50

            [[llm.endpoints]]
            name = "a"
            base_url = "http://a/v1"
            model = "m"
            "#
        )
        .unwrap();

        let config = Config::load_from(temp_file.path()).unwrap();

        assert_eq!(config.pipeline.checkpoint_batch_size, 50);
        assert_eq!(config.llm.endpoints[0].model, "m");
        // Defaults should still work
        assert_eq!(config.pipeline.per_document_timeout_seconds, 300);
        assert_eq!(config.llm.timeout_seconds, 480);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.pipeline.checkpoint_batch_size, 2000);
    }

    #[test]
    fn test_validate_rejects_missing_endpoints() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("llm.endpoints"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config: Config = toml::from_str(&Config::default_config_string()).unwrap();
        config.pipeline.checkpoint_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let mut pipeline = PipelineConfig::default();
        let auto = pipeline.effective_workers();
        assert!(auto >= 1 && auto <= MAX_AUTO_WORKERS);

        pipeline.max_workers = 5;
        assert_eq!(pipeline.effective_workers(), 5);
    }
}
