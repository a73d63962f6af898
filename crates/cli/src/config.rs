use std::path::Path;

use anyhow::{Context, Result};
use generator::OpenRouterConfig;
use orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "schemaforge.toml";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Contents of `schemaforge.toml`. The API key is never read from here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaforgeConfig {
    pub generator: OpenRouterConfig,
    pub orchestrator: OrchestratorConfig,
}

impl SchemaforgeConfig {
    /// Load `path`. A missing file yields defaults; a malformed or invalid one
    /// is an error.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .orchestrator
            .validate()
            .with_context(|| format!("Invalid [orchestrator] section in {}", path.display()))?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

/// `--api-key` wins over the environment.
pub fn resolve_api_key(flag: Option<String>) -> Result<String> {
    flag.filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
        .with_context(|| format!("No API key: pass --api-key or set {}", API_KEY_ENV))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SchemaforgeConfig::load(&dir.path().join(CONFIG_FILE)).await.unwrap();
        assert_eq!(config.orchestrator, OrchestratorConfig::default());
        assert_eq!(config.generator.base_url, OpenRouterConfig::default().base_url);
    }

    #[tokio::test]
    async fn test_sections_are_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
            [generator]
            model = "openai/gpt-4o-mini"
            max_tokens = 2000

            [orchestrator]
            phase_timeout_ms = 45000

            [orchestrator.retry]
            max_retries = 2
            "#,
        )
        .unwrap();

        let config = SchemaforgeConfig::load(&path).await.unwrap();
        assert_eq!(config.generator.model, "openai/gpt-4o-mini");
        assert_eq!(config.generator.max_tokens, Some(2000));
        assert_eq!(config.orchestrator.phase_timeout_ms, 45000);
        assert_eq!(config.orchestrator.retry.max_retries, 2);
        assert_eq!(config.orchestrator.retry.base_delay_ms, 1000);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[generator\nmodel = ").unwrap();
        assert!(SchemaforgeConfig::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_phase_timeout_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[orchestrator]\nphase_timeout_ms = 0\n").unwrap();

        let err = SchemaforgeConfig::load(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("phase_timeout_ms"));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = SchemaforgeConfig::default().to_toml().unwrap();
        let parsed: SchemaforgeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.orchestrator, OrchestratorConfig::default());
    }

    #[test]
    fn test_flag_api_key_wins() {
        assert_eq!(resolve_api_key(Some("sk-flag".to_string())).unwrap(), "sk-flag");
    }
}
