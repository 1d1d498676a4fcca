use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:7474";
pub const DEFAULT_USER: &str = "neo4j";
pub const DEFAULT_DATABASE: &str = "neo4j";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

fn default_user() -> String {
    DEFAULT_USER.to_owned()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_owned()
}

/// Where the graph lives and how to authenticate against it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user: default_user(),
            password: None,
            database: default_database(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.user = user.to_owned();
        self.password = Some(password.to_owned());
        self
    }

    pub fn endpoint(&self) -> Result<Endpoint, StoreError> {
        Endpoint::parse(&self.endpoint)
    }
}

/// A parsed store endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `memory:`: a fresh process-local graph.
    Memory,
    /// `file:<path>`: a JSON snapshot on disk.
    File(PathBuf),
    /// `http://` or `https://`: a Neo4j server's HTTP API.
    Http(String),
}

impl Endpoint {
    pub fn parse(endpoint: &str) -> Result<Self, StoreError> {
        let endpoint = endpoint.trim();
        if endpoint == "memory:" || endpoint == "memory" {
            return Ok(Endpoint::Memory);
        }
        if let Some(path) = endpoint.strip_prefix("file:") {
            if path.is_empty() {
                return Err(StoreError::UnsupportedEndpoint(
                    "file: endpoint needs a path".to_owned(),
                ));
            }
            return Ok(Endpoint::File(PathBuf::from(path)));
        }
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(Endpoint::Http(endpoint.trim_end_matches('/').to_owned()));
        }
        Err(StoreError::UnsupportedEndpoint(endpoint.to_owned()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Memory => write!(f, "memory:"),
            Endpoint::File(path) => write!(f, "file:{}", path.display()),
            Endpoint::Http(url) => write!(f, "{url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_server() {
        let config = StoreConfig::default();
        assert_eq!(config.endpoint, "http://localhost:7474");
        assert_eq!(config.user, "neo4j");
        assert_eq!(config.database, "neo4j");
        assert!(config.password.is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let config = StoreConfig::new("http://db:7474/").with_credentials("admin", "hunter2");
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
        assert_eq!(config.endpoint, "http://db:7474");
    }

    #[test]
    fn parses_endpoints() {
        assert_eq!(Endpoint::parse("memory:").unwrap(), Endpoint::Memory);
        assert_eq!(
            Endpoint::parse("file:/tmp/graph.json").unwrap(),
            Endpoint::File(PathBuf::from("/tmp/graph.json"))
        );
        assert_eq!(
            Endpoint::parse("https://neo.example.com/").unwrap(),
            Endpoint::Http("https://neo.example.com".to_owned())
        );
    }

    #[test]
    fn rejects_bolt_and_empty_file() {
        assert!(matches!(
            Endpoint::parse("bolt://localhost:7687"),
            Err(StoreError::UnsupportedEndpoint(_))
        ));
        assert!(Endpoint::parse("neo4j://localhost").is_err());
        assert!(Endpoint::parse("file:").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<StoreConfig, _> =
            serde_json::from_str(r#"{"endpoint": "memory:", "passwd": "x"}"#);
        assert!(parsed.is_err());
        let parsed: StoreConfig = serde_json::from_str(r#"{"endpoint": "memory:"}"#).unwrap();
        assert_eq!(parsed.user, "neo4j");
    }
}
