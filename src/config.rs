//! Configuration file parser for ~/.config/fakeflix/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and reported with a warning, since they
//! are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("HOME environment variable not set")]
    NoHome,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The two API keys are masked in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog API root, without a trailing slash.
    pub api_base_url: String,

    /// Catalog API key. `FAKEFLIX_API_KEY` takes precedence.
    pub api_key: Option<String>,

    /// Language code sent with every catalog query.
    pub language: String,

    /// Region code for region-filtered queries (top rated).
    pub region: String,

    /// Prefix for poster and backdrop paths.
    pub image_base_url: String,

    /// Identity service root, without a trailing slash.
    pub identity_base_url: String,

    /// Root of the token service that renews expired ID tokens.
    pub token_base_url: String,

    /// Identity service API key. `FAKEFLIX_IDENTITY_API_KEY` takes precedence.
    pub identity_api_key: Option<String>,

    /// Upper bound on a single response body, in bytes.
    pub max_response_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: None,
            language: "en-US".to_string(),
            region: "US".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/original".to_string(),
            identity_base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            token_base_url: "https://securetoken.googleapis.com/v1".to_string(),
            identity_api_key: None,
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("language", &self.language)
            .field("region", &self.region)
            .field("image_base_url", &self.image_base_url)
            .field("identity_base_url", &self.identity_base_url)
            .field("token_base_url", &self.token_base_url)
            .field(
                "identity_api_key",
                &self.identity_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "api_base_url",
        "api_key",
        "language",
        "region",
        "image_base_url",
        "identity_base_url",
        "token_base_url",
        "identity_api_key",
        "max_response_bytes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            api_base_url = %config.api_base_url,
            language = %config.language,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Overlay API keys from the environment (`FAKEFLIX_API_KEY`,
    /// `FAKEFLIX_IDENTITY_API_KEY`). Environment values win over the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("FAKEFLIX_API_KEY").ok(),
            std::env::var("FAKEFLIX_IDENTITY_API_KEY").ok(),
        )
    }

    fn with_overrides(mut self, api_key: Option<String>, identity_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(key) = identity_key.filter(|k| !k.trim().is_empty()) {
            self.identity_api_key = Some(key);
        }
        self
    }
}

/// Get the config directory path (~/.config/fakeflix/)
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("fakeflix"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("fakeflix_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.language, "en-US");
        assert_eq!(config.region, "US");
        assert!(config.api_key.is_none());
        assert_eq!(config.token_base_url, "https://securetoken.googleapis.com/v1");
        assert_eq!(config.max_response_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/fakeflix_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.language, "en-US");
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let (dir, path) = write_temp("whitespace", "  \n \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.region, "US");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("language = \"it-IT\"\n").unwrap();
        assert_eq!(config.language, "it-IT");
        assert_eq!(config.region, "US");
        assert_eq!(config.api_base_url, "https://api.themoviedb.org/3");
    }

    #[test]
    fn test_full_config() {
        let content = r#"
api_base_url = "http://127.0.0.1:9000"
api_key = "tmdb-key"
language = "de-DE"
region = "DE"
image_base_url = "https://img.example.com/w500"
identity_base_url = "http://127.0.0.1:9001"
token_base_url = "http://127.0.0.1:9002"
identity_api_key = "id-key"
max_response_bytes = 2048
"#;
        let (dir, path) = write_temp("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.api_key.as_deref(), Some("tmdb-key"));
        assert_eq!(config.language, "de-DE");
        assert_eq!(config.region, "DE");
        assert_eq!(config.identity_api_key.as_deref(), Some("id-key"));
        assert_eq!(config.token_base_url, "http://127.0.0.1:9002");
        assert_eq!(config.max_response_bytes, 2048);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("language = \"en-GB\"\ntheme = \"dark\"\n").unwrap();
        assert_eq!(config.language, "en-GB");
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("max_response_bytes = \"lots\"\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_temp("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let config = Config::parse("api_key = \"from-file\"\n")
            .unwrap()
            .with_overrides(Some("from-env".into()), None);
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert!(config.identity_api_key.is_none());
    }

    #[test]
    fn test_blank_env_override_ignored() {
        let config = Config::parse("api_key = \"from-file\"\n")
            .unwrap()
            .with_overrides(Some("   ".into()), None);
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_debug_masks_api_keys() {
        let config = Config {
            api_key: Some("super-secret-tmdb".to_string()),
            identity_api_key: Some("super-secret-identity".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
