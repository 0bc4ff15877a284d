use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OcrError, Result};

/// Scanner configuration, loaded from `~/.config/bookclub/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Disk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    pub ttl_secs: u64,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            api_key_env: "GOOGLE_BOOKS_API_KEY".to_string(),
            timeout_secs: 10,
            user_agent: "bookclub-ocr/0.1".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Disk,
            directory: None,
            ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl ScanConfig {
    /// Standard config file path: `~/.config/bookclub/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BOOKCLUB_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("bookclub")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if reqwest::Url::parse(&self.provider.base_url).is_err() {
            return Err(OcrError::Config(format!(
                "provider.base_url is not a URL: {}",
                self.provider.base_url
            )));
        }
        if self.provider.timeout_secs == 0 {
            return Err(OcrError::Config("provider.timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Directory for the disk cache backend.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache.directory {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("bookclub")
                .join("metadata"),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.provider.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.cache.backend, CacheBackend::Disk);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(604_800));
        assert!(cfg.provider.base_url.starts_with("https://"));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = ScanConfig::default();
        cfg.cache.backend = CacheBackend::Memory;
        cfg.cache.ttl_secs = 60;
        cfg.save_to(&path).unwrap();

        let loaded = ScanConfig::load_from(&path).unwrap();
        assert_eq!(loaded.cache.backend, CacheBackend::Memory);
        assert_eq!(loaded.cache.ttl_secs, 60);
        assert_eq!(loaded.provider.base_url, cfg.provider.base_url);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nbackend = \"memory\"\n").unwrap();

        let loaded = ScanConfig::load_from(&path).unwrap();
        assert_eq!(loaded.cache.backend, CacheBackend::Memory);
        assert_eq!(loaded.cache.ttl_secs, 604_800);
        assert_eq!(loaded.provider.timeout_secs, 10);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = ScanConfig::load_from(Path::new("/tmp/nonexistent_bookclub_config.toml")).unwrap();
        assert_eq!(cfg.cache.backend, CacheBackend::Disk);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[provider]\nbase_url = \"not a url\"\n").unwrap();
        assert!(matches!(ScanConfig::load_from(&path), Err(OcrError::Config(_))));

        std::fs::write(&path, "[provider]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(ScanConfig::load_from(&path), Err(OcrError::Config(_))));

        std::fs::write(&path, "[cache]\nbackend = \"redis\"\n").unwrap();
        assert!(matches!(ScanConfig::load_from(&path), Err(OcrError::TomlParse(_))));
    }

    #[test]
    fn test_explicit_cache_dir() {
        let mut cfg = ScanConfig::default();
        cfg.cache.directory = Some("/var/cache/bookclub".to_string());
        assert_eq!(cfg.cache_dir(), PathBuf::from("/var/cache/bookclub"));
    }
}
