use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::ai::ollama::DEFAULT_OLLAMA_URL;
use crate::ai::{ClaudeClient, GeminiClient, ModelClient, OllamaClient, OpenAIClient};
use crate::error::ChatError;
use crate::provider::Provider;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::default().as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("lumina").join("config.json"))
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or_default()
    }

    /// Configured model, unless it belongs to a different provider's list.
    pub fn model_for(&self, provider: Provider) -> String {
        match &self.default_model {
            Some(model) if self.provider() == provider => model.clone(),
            _ => provider.default_model().to_string(),
        }
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    fn stored_key(&self, provider: Provider) -> Option<&String> {
        match provider {
            Provider::Gemini => self.gemini_api_key.as_ref(),
            Provider::Claude => self.claude_api_key.as_ref(),
            Provider::OpenAI => self.openai_api_key.as_ref(),
            Provider::Ollama => None,
        }
    }

    pub fn set_api_key(&mut self, provider: Provider, key: &str) {
        let key = Some(key.trim().to_string());
        match provider {
            Provider::Gemini => self.gemini_api_key = key,
            Provider::Claude => self.claude_api_key = key,
            Provider::OpenAI => self.openai_api_key = key,
            Provider::Ollama => {}
        }
    }

    /// API key for `provider`, environment first, then the config file.
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        self.api_key_with(provider, |name| std::env::var(name).ok())
    }

    pub fn api_key_with<F>(&self, provider: Provider, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        provider
            .env_keys()
            .iter()
            .filter_map(|name| env(name))
            .chain(self.stored_key(provider).cloned())
            .find(|key| !key.trim().is_empty())
    }

    /// Returns where the key for `provider` comes from: "env", "config", "local", or None.
    pub fn key_source(&self, provider: Provider) -> Option<&'static str> {
        if !provider.requires_api_key() {
            return Some("local");
        }
        let from_env = provider
            .env_keys()
            .iter()
            .any(|name| std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false));
        if from_env {
            Some("env")
        } else if self.stored_key(provider).is_some_and(|k| !k.trim().is_empty()) {
            Some("config")
        } else {
            None
        }
    }

    /// Build the client for `provider` from this configuration.
    pub fn client_for(&self, provider: Provider) -> Result<ModelClient, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout())
            .build()?;

        let key = || self.api_key(provider).ok_or(ChatError::MissingApiKey(provider));

        let client: ModelClient = match provider {
            Provider::Gemini => GeminiClient::new(&key()?).with_http_client(http).into(),
            Provider::Claude => ClaudeClient::new(&key()?).with_http_client(http).into(),
            Provider::OpenAI => OpenAIClient::new(&key()?).with_http_client(http).into(),
            Provider::Ollama => OllamaClient::new(self.ollama_url()).with_http_client(http).into(),
        };
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.provider(), Provider::Gemini);
        assert_eq!(config.ollama_url(), "http://localhost:11434");
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.provider = Some("openai".to_string());
        config.default_model = Some("gpt-4o".to_string());
        config.set_api_key(Provider::OpenAI, "  sk-test  ");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::OpenAI);
        assert_eq!(loaded.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.model_for(Provider::OpenAI), "gpt-4o");
        assert_eq!(loaded.model_for(Provider::Gemini), "gemini-2.5-flash");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_key_wins_over_file() {
        let mut config = Config::new();
        config.set_api_key(Provider::Gemini, "from-file");

        let env = |name: &str| (name == "API_KEY").then(|| "from-env".to_string());
        assert_eq!(config.api_key_with(Provider::Gemini, env).as_deref(), Some("from-env"));

        let no_env = |_: &str| None;
        assert_eq!(config.api_key_with(Provider::Gemini, no_env).as_deref(), Some("from-file"));

        let blank_env = |_: &str| Some("   ".to_string());
        assert_eq!(config.api_key_with(Provider::Gemini, blank_env).as_deref(), Some("from-file"));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = Config::new();
        assert_eq!(config.key_source(Provider::Ollama), Some("local"));
        let client = config.client_for(Provider::Ollama).unwrap();
        assert_eq!(client.provider(), Provider::Ollama);
    }
}
