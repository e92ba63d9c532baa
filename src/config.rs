use crate::provider::Provider;
use crate::store::KeyValueStore;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const AI_CONFIG_KEY: &str = "aiConfig";
const DATA_DIR_ENV: &str = "VIRAL_SCRIPT_HOME";

/// Where an API key was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Config,
}

impl KeySource {
    pub fn label(&self) -> &'static str {
        match self {
            KeySource::Env => "env var",
            KeySource::Config => "configured",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub provider: Provider,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Key taken from the provider's environment variable, never persisted
    #[serde(skip)]
    env_key: Option<String>,
}

impl AiConfig {
    pub fn new(provider: Provider, api_key: &str) -> Self {
        Self {
            provider,
            api_key: api_key.trim().to_string(),
            model: None,
            env_key: None,
        }
    }

    /// Load the stored config and pick up the provider's environment key.
    pub fn load_with_env(store: &dyn KeyValueStore) -> Result<Self> {
        Ok(Self::load(store)?.with_env())
    }

    pub fn with_env(mut self) -> Self {
        self.refresh_env();
        self
    }

    /// Re-read the environment key, e.g. after the provider changed.
    pub fn refresh_env(&mut self) {
        self.env_key = std::env::var(self.provider.env_var())
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
    }

    /// Switch provider, keeping the stored key only if a new one is given.
    pub fn set_provider(&mut self, provider: Provider, api_key: Option<&str>) {
        if provider != self.provider {
            self.model = None;
        }
        self.provider = provider;
        if let Some(key) = api_key {
            self.api_key = key.trim().to_string();
        }
        self.refresh_env();
    }

    /// Absent config yields the default (Gemini, no key).
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let Some(raw) = store.get(AI_CONFIG_KEY)? else {
            return Ok(Self::default());
        };
        let config = serde_json::from_str(&raw).context("Stored AI config is not valid JSON")?;
        Ok(config)
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        store.set(AI_CONFIG_KEY, &content)
    }

    pub fn model_or_default(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Key to send: the environment key wins over the stored key.
    pub fn effective_api_key(&self) -> String {
        self.resolve_key().map(|(key, _)| key).unwrap_or_default()
    }

    pub fn key_source(&self) -> Option<KeySource> {
        self.resolve_key().map(|(_, source)| source)
    }

    pub fn has_api_key(&self) -> bool {
        self.key_source().is_some()
    }

    fn resolve_key(&self) -> Option<(String, KeySource)> {
        if let Some(key) = &self.env_key {
            return Some((key.clone(), KeySource::Env));
        }
        if !self.api_key.trim().is_empty() {
            return Some((self.api_key.trim().to_string(), KeySource::Config));
        }
        None
    }

    /// Stored key with all but the last four characters hidden
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", "*".repeat((chars.len() - 4).min(20)), tail)
    }
}

/// Directory holding the config, history and log files.
pub fn data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("viral-script"))
}
