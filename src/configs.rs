use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_MAX_TOKENS: u32 = 200_000;
pub const DEFAULT_MAX_FILES: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ARCHIVE_NAME: &str = "translated_files.zip";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub translation: TranslationConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TranslationConfig {
    /// Upper bound on files accepted in one batch.
    pub max_files: usize,
    /// Files translated at once. `1` keeps the batch strictly sequential.
    pub file_concurrent: usize,
    pub archive_name: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            file_concurrent: 1,
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads a TOML config file. Missing tables and keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        let config: AppConfig = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config '{}'", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.translation.max_files == 0 {
            bail!("translation.max_files must be at least 1");
        }
        if self.translation.file_concurrent == 0 {
            bail!("translation.file_concurrent must be at least 1");
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.max_tokens, 200_000);
        assert_eq!(config.llm.timeout(), Duration::from_secs(120));
        assert_eq!(config.translation.max_files, 5);
        assert_eq!(config.translation.file_concurrent, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides_only_given_keys() {
        let config: AppConfig = toml::from_str(
            r#"
            [llm]
            model = "openai/gpt-4o-mini"
            timeout_secs = 30

            [translation]
            max_files = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.api_base, DEFAULT_API_BASE);
        assert_eq!(config.translation.max_files, 2);
        assert_eq!(config.translation.archive_name, DEFAULT_ARCHIVE_NAME);
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.translation.max_files = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.translation.file_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }
}
