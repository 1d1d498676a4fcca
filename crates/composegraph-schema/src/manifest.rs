use crate::normalize::scalar;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseYaml(#[from] serde_yaml_ng::Error),
    #[error("manifest root must be a mapping, found {0}")]
    NotAMapping(&'static str),
    #[error("`services` must be a mapping, found {0}")]
    ServicesNotAMapping(&'static str),
}

/// A compose-style manifest: a `services` mapping of service name to
/// configuration block. Everything else in the document is ignored.
///
/// Service entries that cannot be read (a non-scalar name, a body that is
/// not a mapping) are set aside in [`ComposeFile::rejected`] so the rest of
/// the manifest still compiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeFile {
    services: BTreeMap<String, ServiceConfig>,
    rejected: Vec<RejectedService>,
}

/// A `services` entry that was skipped while reading the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedService {
    pub name: String,
    pub reason: String,
}

/// One service configuration block, kept loosely typed so the extractor can
/// accept every documented shape of each key.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default)]
    pub ports: Option<Value>,
    #[serde(default)]
    pub environment: Option<Value>,
    #[serde(default)]
    pub volumes: Option<Value>,
    #[serde(default)]
    pub depends_on: Option<Value>,
    #[serde(default)]
    pub networks: Option<Value>,
}

impl ComposeFile {
    /// Declared services in name order. A service declared with an empty body
    /// yields an empty configuration.
    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceConfig)> + '_ {
        self.services
            .iter()
            .map(|(name, config)| (name.as_str(), config))
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn rejected(&self) -> &[RejectedService] {
        &self.rejected
    }

    fn from_services(services: Mapping) -> Self {
        let mut file = ComposeFile::default();
        for (key, body) in services {
            let Some(name) = scalar(&key) else {
                file.rejected.push(RejectedService {
                    name: format!("<{}>", kind_name(&key)),
                    reason: format!("service name must be a scalar, found {}", kind_name(&key)),
                });
                continue;
            };
            let config = match body {
                Value::Null => Ok(ServiceConfig::default()),
                Value::Mapping(_) => serde_yaml_ng::from_value(body).map_err(|e| e.to_string()),
                other => Err(format!(
                    "service body must be a mapping, found {}",
                    kind_name(&other)
                )),
            };
            match config {
                Ok(config) => {
                    file.services.insert(name, config);
                }
                Err(reason) => file.rejected.push(RejectedService { name, reason }),
            }
        }
        file
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Parse a manifest document. `<<` merge keys are resolved first, so
/// services inheriting from shared anchored blocks see the inherited keys.
pub fn parse_manifest_str(input: &str) -> Result<ComposeFile, ManifestError> {
    let mut document: Value = serde_yaml_ng::from_str(input)?;
    document.apply_merge()?;
    let mut root = match document {
        Value::Mapping(root) => root,
        Value::Null => return Ok(ComposeFile::default()),
        other => return Err(ManifestError::NotAMapping(kind_name(&other))),
    };
    match root.remove("services") {
        None | Some(Value::Null) => Ok(ComposeFile::default()),
        Some(Value::Mapping(services)) => Ok(ComposeFile::from_services(services)),
        Some(other) => Err(ManifestError::ServicesNotAMapping(kind_name(&other))),
    }
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ComposeFile, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_services_and_ignores_other_keys() {
        let input = r#"
version: "3.9"
services:
  web:
    image: nginx:1.25
    ports: ["8080:80"]
    build: ./web
  db:
    image: postgres
networks:
  backend: {}
"#;
        let manifest = parse_manifest_str(input).expect("should parse");
        assert_eq!(manifest.service_count(), 2);
        let names: Vec<&str> = manifest.services().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["db", "web"]);
        let (_, web) = manifest.services().find(|(n, _)| *n == "web").unwrap();
        assert_eq!(web.image, Some(Value::String("nginx:1.25".to_owned())));
    }

    #[test]
    fn empty_service_body_is_empty_config() {
        let manifest = parse_manifest_str("services:\n  worker:\n").unwrap();
        let (name, config) = manifest.services().next().unwrap();
        assert_eq!(name, "worker");
        assert_eq!(config, &ServiceConfig::default());
    }

    #[test]
    fn missing_services_is_empty_manifest() {
        let manifest = parse_manifest_str("volumes:\n  data: {}\n").unwrap();
        assert_eq!(manifest.service_count(), 0);
        assert_eq!(parse_manifest_str("").unwrap().service_count(), 0);
    }

    #[test]
    fn rejects_non_mapping_root() {
        let err = parse_manifest_str("- just\n- a list\n").unwrap_err();
        assert!(matches!(err, ManifestError::NotAMapping("a sequence")));
    }

    #[test]
    fn rejects_invalid_yaml() {
        assert!(parse_manifest_str("services: [unclosed").is_err());
    }

    #[test]
    fn reads_manifest_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose-app.yml");
        std::fs::write(&path, "services:\n  api:\n    image: app:2\n").unwrap();
        let manifest = parse_manifest_file(&path).unwrap();
        assert_eq!(manifest.service_count(), 1);
        assert!(parse_manifest_file(dir.path().join("missing.yml")).is_err());
    }

    #[test]
    fn services_must_be_a_mapping() {
        let err = parse_manifest_str("services: [web, db]\n").unwrap_err();
        assert!(matches!(err, ManifestError::ServicesNotAMapping("a sequence")));
        assert_eq!(parse_manifest_str("services:\n").unwrap().service_count(), 0);
    }

    #[test]
    fn merge_keys_are_resolved_before_decoding() {
        let input = "x-common: &common\n  image: app:1\nservices:\n  api:\n    <<: *common\n";
        let manifest = parse_manifest_str(input).unwrap();
        let (_, api) = manifest.services().next().unwrap();
        assert_eq!(api.image, Some(Value::String("app:1".to_owned())));
    }

    #[test]
    fn scalar_service_keys_are_stringified() {
        let manifest = parse_manifest_str("services:\n  123: {image: nginx}\n  true: {}\n").unwrap();
        let names: Vec<&str> = manifest.services().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["123", "true"]);
        assert!(manifest.rejected().is_empty());
    }
}
