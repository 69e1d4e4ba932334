use std::time::Duration;
use thiserror::Error;

use crate::i18n::Language;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_ASPECT_RATIO: &str = "3:4";
/// Request body cap for uploads; base64 inflates a photo by a third.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set; image generation is unavailable")]
    MissingCredential,
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub aspect_ratio: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub language: Language,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("API_KEY"))
            .ok_or(ConfigError::MissingCredential)?;

        let language = match get("PORTRAIT_LANGUAGE") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key: "PORTRAIT_LANGUAGE", value: v })?,
            None => Language::default(),
        };

        let timeout_secs: u64 = match get("GEMINI_TIMEOUT_SECS") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key: "GEMINI_TIMEOUT_SECS", value: v })?,
            None => 120,
        };

        let port: u16 = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: v })?,
            None => 8080,
        };

        let max_upload_bytes: usize = match get("PORTRAIT_MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid { key: "PORTRAIT_MAX_UPLOAD_BYTES", value: v })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            gemini: GeminiConfig {
                api_key,
                base_url: get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                model: get("GEMINI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
                aspect_ratio: get("PORTRAIT_ASPECT_RATIO").unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            language,
            port,
            max_upload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = Config::from_lookup(lookup(&[("PORT", "9000")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));

        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(cfg.gemini.api_key, "k");
        assert_eq!(cfg.gemini.base_url, DEFAULT_API_BASE);
        assert_eq!(cfg.gemini.model, DEFAULT_IMAGE_MODEL);
        assert_eq!(cfg.gemini.aspect_ratio, "3:4");
        assert_eq!(cfg.gemini.timeout, Duration::from_secs(120));
        assert_eq!(cfg.language, Language::Cn);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn api_key_fallback_and_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_KEY", "legacy"),
            ("PORTRAIT_LANGUAGE", "en"),
            ("GEMINI_TIMEOUT_SECS", "30"),
            ("PORT", "3000"),
            ("PORTRAIT_MAX_UPLOAD_BYTES", "1048576"),
        ]))
        .unwrap();
        assert_eq!(cfg.gemini.api_key, "legacy");
        assert_eq!(cfg.language, Language::En);
        assert_eq!(cfg.gemini.timeout, Duration::from_secs(30));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.max_upload_bytes, 1024 * 1024);
    }

    #[test]
    fn rejects_bad_values() {
        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("PORTRAIT_LANGUAGE", "fr")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORTRAIT_LANGUAGE", .. }));
        for bad in ["0", "-5", "lots"] {
            let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("PORTRAIT_MAX_UPLOAD_BYTES", bad)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "PORTRAIT_MAX_UPLOAD_BYTES", .. }));
        }
    }
}
