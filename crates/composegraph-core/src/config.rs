use composegraph_schema::IdentityScope;
use composegraph_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MANIFEST_DIR: &str = "docker_composes";
pub const DEFAULT_MANIFEST_PATTERN: &str = "*.{yml,yaml}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid manifest pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestSettings {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_DIR)
}

fn default_pattern() -> String {
    DEFAULT_MANIFEST_PATTERN.to_owned()
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            pattern: default_pattern(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentitySettings {
    #[serde(default)]
    pub scope: IdentityScope,
}

/// Everything a compiler run or query session needs, passed explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub manifests: ManifestSettings,
    #[serde(default)]
    pub identity: IdentitySettings,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.manifest_matcher()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Compiled glob for manifest file names.
    pub fn manifest_matcher(&self) -> Result<globset::GlobMatcher, ConfigError> {
        globset::Glob::new(&self.manifests.pattern)
            .map(|g| g.compile_matcher())
            .map_err(|e| ConfigError::Pattern {
                pattern: self.manifests.pattern.clone(),
                reason: e.kind().to_string(),
            })
    }
}
