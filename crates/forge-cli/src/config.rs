//! Configuration file management for forge.
//!
//! Provides a TOML-based config file at `~/.config/forge/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use forge_core::generation::ReasoningMode;
use forge_core::pipeline::RetryPolicy;
use forge_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub retry: RetrySection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model for synthesis, and for reranking unless `rerank_model` is set.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_model: Option<String>,
    /// Enables semantic retrieval when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub rerank_reasoning: ReasoningMode,
    pub synthesis_reasoning: ReasoningMode,
    pub rerank_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
}

/// Embedding model `forge init` writes unless told to stay lexical.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            rerank_model: None,
            embedding_model: None,
            rerank_reasoning: ReasoningMode::Disabled,
            synthesis_reasoning: ReasoningMode::Enabled,
            rerank_timeout_secs: 120,
            synthesis_timeout_secs: 300,
        }
    }
}

impl std::fmt::Debug for LlmSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSection")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("rerank_model", &self.rerank_model)
            .field("embedding_model", &self.embedding_model)
            .field("rerank_reasoning", &self.rerank_reasoning)
            .field("synthesis_reasoning", &self.synthesis_reasoning)
            .field("rerank_timeout_secs", &self.rerank_timeout_secs)
            .field("synthesis_timeout_secs", &self.synthesis_timeout_secs)
            .finish()
    }
}

impl LlmSection {
    pub fn rerank_model(&self) -> &str {
        self.rerank_model.as_deref().unwrap_or(&self.model)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_secs(self.rerank_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub retrieval_limit: usize,
    pub max_selected: usize,
    pub card_chars: usize,
    pub rerank_max_tokens: u32,
    pub synthesis_max_tokens: u32,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            retrieval_limit: 100,
            max_selected: 12,
            card_chars: 800,
            rerank_max_tokens: 4_000,
            synthesis_max_tokens: 16_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Total attempts per generative stage, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub retry_malformed_output: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            retry_malformed_output: false,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            retry_malformed_output: self.retry_malformed_output,
            ..RetryPolicy::default()
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the forge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/forge` or `~/.config/forge`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("forge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("forge")
}

/// Return the path to the forge config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file may hold an API key, so it is made owner-only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ForgeConfig {
    pub db_config: DbConfig,
    pub llm: LlmSection,
    pub pipeline: PipelineSection,
    pub retry: RetrySection,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ForgeConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `FORGE_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - LLM: `FORGE_LLM_BASE_URL`, `FORGE_LLM_API_KEY`, `FORGE_LLM_MODEL` >
    ///   `[llm]` > defaults
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = if config_path().exists() {
            Some(load_config()?)
        } else {
            None
        };
        Self::from_parts(cli_db_url, file_config.unwrap_or_default())
    }

    fn from_parts(cli_db_url: Option<&str>, file: ConfigFile) -> Result<Self> {
        let db_url = cli_db_url
            .map(str::to_string)
            .or_else(|| env_var("FORGE_DATABASE_URL"))
            .unwrap_or(file.database.url);

        let mut llm = file.llm;
        if let Some(base_url) = env_var("FORGE_LLM_BASE_URL") {
            llm.base_url = base_url;
        }
        if let Some(api_key) = env_var("FORGE_LLM_API_KEY") {
            llm.api_key = Some(api_key);
        }
        if let Some(model) = env_var("FORGE_LLM_MODEL") {
            llm.model = model;
        }

        let db_config = DbConfig {
            database_url: db_url,
            ..DbConfig::from_env()
        };

        let config = Self {
            db_config,
            llm,
            pipeline: file.pipeline,
            retry: file.retry,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            bail!(
                "llm.model must not be empty; set FORGE_LLM_MODEL or edit {}",
                config_path().display()
            );
        }
        if self.pipeline.retrieval_limit == 0 {
            bail!("pipeline.retrieval_limit must be at least 1");
        }
        if self.pipeline.max_selected == 0 {
            bail!("pipeline.max_selected must be at least 1");
        }
        if self.llm.rerank_timeout_secs == 0 || self.llm.synthesis_timeout_secs == 0 {
            bail!("llm timeouts must be at least 1 second");
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
