use std::collections::HashMap;
use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parsing(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parsing(e) => write!(f, "TOML parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parsing(value)
    }
}

/// Site-level pipeline configuration, usually read from `sift.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub sitemap: SitemapConfig,
    pub robots: RobotsConfig,
    pub minify: MinifyConfig,
    pub encrypt: EncryptConfig,
    pub reload: ReloadConfig,
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&data)?;

        Ok(config)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    /// Absolute base URL used for sitemap locations.
    pub base_url: Option<String>,
    /// Virtual directory holding reusable template components.
    pub components_dir: String,
    /// Virtual path of the layout every page is wrapped in, if any.
    pub layout: Option<String>,
    /// Template name the layout includes the page body under.
    pub child_block: String,
    /// Free-form data exposed to templates under `global`.
    pub global: HashMap<String, serde_json::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            components_dir: "/components".to_string(),
            layout: None,
            child_block: "content".to_string(),
            global: HashMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SitemapConfig {
    pub enable: bool,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RobotsConfig {
    pub enable: bool,
    /// Literal lines appended after the disallow-all header.
    pub lines: Vec<String>,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            lines: Vec::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MinifyConfig {
    pub enable: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct EncryptConfig {
    /// Virtual path of the password-page template within the source.
    pub template: Option<String>,
    /// Metadata key marking assets for encryption.
    pub meta_key: String,
    pub iterations: u32,
    /// "none", "local", or "session".
    pub storage: String,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            template: None,
            meta_key: "Protected".to_string(),
            iterations: crate::encrypt::DEFAULT_ITERATIONS,
            storage: "none".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ReloadConfig {
    pub ws_path: String,
    pub timeout_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            ws_path: "/__livereload".to_string(),
            timeout_ms: 1000,
        }
    }
}
