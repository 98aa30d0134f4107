use crate::batcher::DEFAULT_BATCH_SIZE;
use crate::errors::ConfigError;
use llm::providers::google_provider::DEFAULT_MODEL;
use llm::{GenerationSettings, GoogleProvider, RetryConfig};
use serde::Deserialize;
use std::env;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Retry knobs as they appear in the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
        }
    }
}

/// Pipeline configuration: defaults, then the optional TOML file, then the
/// environment, then command line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelerConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// Overrides the Generative Language endpoint host
    pub base_url: Option<String>,
    pub batch_size: usize,
    /// Record table; discovered from the label column when unset
    pub table: Option<String>,
    pub request_timeout_secs: u64,
    pub temperature: Option<f32>,
    pub retry: RetrySettings,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            batch_size: DEFAULT_BATCH_SIZE.get(),
            table: None,
            request_timeout_secs: 120,
            temperature: None,
            retry: RetrySettings::default(),
        }
    }
}

impl LabelerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load `.env` if present and apply environment overrides.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup` (`GEMINI_API_KEY`, `GOOGLE_API_KEY`,
    /// `GEMINI_MODEL`, `GEMINI_BASE_URL`, `LABELER_BATCH_SIZE`, `LABELER_TABLE`).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            self.api_key = Some(api_key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = non_empty("GEMINI_BASE_URL") {
            self.base_url = Some(base_url);
        }
        if let Some(table) = non_empty("LABELER_TABLE") {
            self.table = Some(table);
        }
        if let Some(batch_size) = non_empty("LABELER_BATCH_SIZE") {
            self.batch_size = batch_size.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("LABELER_BATCH_SIZE must be a positive integer, got '{batch_size}'"))
            })?;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch_size()?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn batch_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.batch_size)
            .ok_or_else(|| ConfigError::Invalid("batch_size must be at least 1".to_string()))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.retry.max_attempts)
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    /// Gemini client for this configuration; requires an API key.
    pub fn build_provider(&self) -> Result<GoogleProvider, ConfigError> {
        self.validate()?;
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut provider = GoogleProvider::new(api_key, self.model.as_str())?
            .with_timeout(Duration::from_secs(self.request_timeout_secs))?
            .with_retry_config(self.retry_config())
            .with_generation_settings(GenerationSettings {
                temperature: self.temperature,
                max_output_tokens: None,
            });
        if let Some(base_url) = &self.base_url {
            provider = provider.with_base_url(base_url.as_str());
        }

        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LabelerConfig::default();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.batch_size, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_override() {
        let config = LabelerConfig::from_toml(
            r#"
            batch_size = 10
            table = "tweets_2024"

            [retry]
            max_attempts = 3
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.table.as_deref(), Some("tweets_2024"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            LabelerConfig::from_toml("batchsize = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = LabelerConfig::default()
            .with_overrides(lookup(&[
                ("GEMINI_API_KEY", ""),
                ("GOOGLE_API_KEY", "google-key"),
                ("GEMINI_MODEL", "gemini-pro"),
                ("LABELER_BATCH_SIZE", " 12 "),
            ]))
            .expect("valid overrides");

        assert_eq!(config.api_key.as_deref(), Some("google-key"));
        assert_eq!(config.model, "gemini-pro");
        assert_eq!(config.batch_size, 12);
    }

    #[test]
    fn test_invalid_batch_size() {
        let result = LabelerConfig::default().with_overrides(lookup(&[("LABELER_BATCH_SIZE", "many")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = LabelerConfig {
            batch_size: 0,
            ..LabelerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_build_provider_requires_key() {
        let config = LabelerConfig::default();
        assert!(matches!(config.build_provider(), Err(ConfigError::MissingApiKey)));

        let config = LabelerConfig {
            api_key: Some("key".to_string()),
            ..LabelerConfig::default()
        };
        let provider = config.build_provider().expect("provider builds");
        assert_eq!(provider.model(), "gemini-2.5-flash");
        assert_eq!(provider.retry_policy().config(), &config.retry_config());
    }
}
