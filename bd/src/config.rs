//! bizdesk configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{StageTemplate, default_stage_templates};

/// Main bizdesk configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Owner whose records every command operates on
    pub owner_id: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// AI assistant settings
    pub assistant: AssistantConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Pipeline bootstrap configuration
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./bizdesk.yml`, then
    /// `~/.config/bizdesk/bizdesk.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from("bizdesk.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("bizdesk").join("bizdesk.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Owner id from config, falling back to the login name
    pub fn resolved_owner_id(&self) -> String {
        self.owner_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "default".to_string())
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    pub model: String,

    /// Environment variable containing the API key
    pub api_key_env: String,

    pub base_url: String,

    /// Maximum tokens per response
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

/// AI assistant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AssistantConfig {
    /// Stream the final answer as it is generated
    pub stream: bool,

    /// Tokens requested per round
    pub max_tokens: u32,

    /// Directory with prompt overrides (`chat.hbs`, `daily_briefing.hbs`)
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            stream: true,
            max_tokens: 2048,
            prompts_dir: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Directory holding the row store and logs
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/bizdesk on Linux)
        let data_dir = dirs::data_dir()
            .map(|d| d.join("bizdesk"))
            .unwrap_or_else(|| PathBuf::from(".bizdesk"));
        Self { data_dir }
    }
}

impl StorageConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Pipeline bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Stages created for an owner with an empty pipeline
    pub default_stages: Vec<StageTemplate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_stages: default_stage_templates(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pipeline.default_stages.len(), 6);
        assert!(config.assistant.stream);
        assert!(config.owner_id.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r##"
owner-id: loja-centro
log-level: debug

llm:
  provider: openai
  model: gpt-4o
  api-key-env: BIZDESK_OPENAI_KEY
  base-url: https://llm.internal
  max-tokens: 1024
  timeout-ms: 30000

assistant:
  stream: false

storage:
  data-dir: /var/lib/bizdesk

pipeline:
  default-stages:
    - name: Novo
      color: "#000000"
      probability: 10
      is-default: true
    - name: Fechado
      color: "#00ff00"
      probability: 100
      is-win-stage: true
"##;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.owner_id.as_deref(), Some("loja-centro"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "BIZDESK_OPENAI_KEY");
        assert_eq!(config.llm.max_tokens, 1024);
        assert!(!config.assistant.stream);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/bizdesk"));
        assert_eq!(config.pipeline.default_stages.len(), 2);
        assert!(config.pipeline.default_stages[1].is_win_stage);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gpt-4.1
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.assistant.max_tokens, 2048);
        assert_eq!(config.pipeline.default_stages[0].name, "Lead");
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let missing = PathBuf::from("/nonexistent/bizdesk.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_explicit_path_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bizdesk.yml");
        fs::write(&path, "owner-id: u42\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.resolved_owner_id(), "u42");
    }
}
