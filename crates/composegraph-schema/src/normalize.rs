use crate::manifest::{ComposeFile, ServiceConfig};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Image reference split into repository name and version tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    /// Split `reference` into name and tag.
    ///
    /// The tag separator is the last `:` after the last `/`, so a registry
    /// port (`registry:5000/app`) is never mistaken for a tag. A digest
    /// (`app@sha256:...`) is kept as the version. Without a tag the version
    /// is `latest`.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        let (base, digest) = match reference.split_once('@') {
            Some((base, digest)) => (base, Some(digest)),
            None => (reference, None),
        };

        let (name, tag) = match base.rfind(':') {
            Some(idx) if !base[idx..].contains('/') => (&base[..idx], &base[idx + 1..]),
            _ => (base, ""),
        };

        let tag = match digest {
            Some(d) if !d.is_empty() => d,
            _ if tag.is_empty() => "latest",
            _ => tag,
        };

        Self {
            name: name.to_owned(),
            tag: tag.to_owned(),
        }
    }

    pub fn reference(&self) -> String {
        if self.tag.contains(':') {
            format!("{}@{}", self.name, self.tag)
        } else {
            format!("{}:{}", self.name, self.tag)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String,
}

impl PortMapping {
    /// Parse the short port syntax: `container`, `host:container` or
    /// `ip:host:container`, each optionally suffixed with `/protocol`.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        let (body, protocol) = match spec.rsplit_once('/') {
            Some((body, proto)) if !proto.trim().is_empty() => (body, proto.trim().to_lowercase()),
            Some((body, _)) => (body, "tcp".to_owned()),
            None => (spec, "tcp".to_owned()),
        };

        let fields: Vec<&str> = body.split(':').collect();
        let (host, container) = match fields.as_slice() {
            [single] => (*single, *single),
            [host, container] | [_, host, container] => {
                if host.trim().is_empty() {
                    (*container, *container)
                } else {
                    (*host, *container)
                }
            }
            _ => {
                return Err(format!(
                    "expected 1-3 colon-separated fields in port '{spec}'"
                ))
            }
        };

        Ok(Self {
            host_port: parse_port_number(host, spec)?,
            container_port: parse_port_number(container, spec)?,
            protocol,
        })
    }

    pub fn display(&self) -> String {
        format!(
            "{}:{}/{}",
            self.host_port, self.container_port, self.protocol
        )
    }
}

fn parse_port_number(raw: &str, spec: &str) -> Result<u16, String> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid port number '{raw}' in '{spec}'"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl VolumeMount {
    /// Parse `host:container[:mode]` or a bare path, which is mounted to itself.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let parts: Vec<&str> = spec.trim().splitn(3, ':').collect();
        let (host, container, mode) = match parts.as_slice() {
            [path] => (*path, *path, None),
            [host, container] => (*host, *container, None),
            [host, container, mode] => (*host, *container, Some((*mode).to_owned())),
            _ => unreachable!("splitn(3) yields between one and three parts"),
        };
        if container.is_empty() {
            return Err(format!("volume '{spec}' has an empty container path"));
        }
        let host = if host.is_empty() { container } else { host };
        Ok(Self {
            host_path: host.to_owned(),
            container_path: container.to_owned(),
            mode: mode.filter(|m| !m.is_empty()),
        })
    }
}

/// A field that could not be fully normalized. Extraction of the rest of the
/// service continues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldWarning {
    pub service: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.service, self.field, self.message)
    }
}

/// Canonical form of one service configuration block.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub image: Option<ImageRef>,
    pub ports: Vec<PortMapping>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<VolumeMount>,
    pub networks: BTreeSet<String>,
    pub depends_on: Vec<String>,
}

/// All services of one manifest, normalized, plus the warnings raised while
/// extracting them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedManifest {
    pub source_file: String,
    pub services: Vec<ServiceRecord>,
    pub warnings: Vec<FieldWarning>,
}

impl NormalizedManifest {
    pub fn service(&self, name: &str) -> Option<&ServiceRecord> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.service(name).is_some()
    }
}

impl ComposeFile {
    /// Normalize every declared service. Never fails: malformed fields are
    /// skipped and reported in [`NormalizedManifest::warnings`].
    pub fn normalize(&self, source_file: &str) -> NormalizedManifest {
        let mut services = Vec::with_capacity(self.service_count());
        let mut warnings: Vec<FieldWarning> = self
            .rejected()
            .iter()
            .map(|rejected| FieldWarning {
                service: rejected.name.clone(),
                field: "services".to_owned(),
                message: rejected.reason.clone(),
            })
            .collect();
        for (name, config) in self.services() {
            let (record, mut service_warnings) = extract_service(name, config);
            services.push(record);
            warnings.append(&mut service_warnings);
        }
        NormalizedManifest {
            source_file: source_file.to_owned(),
            services,
            warnings,
        }
    }
}

/// Extract one service's sub-entities into a [`ServiceRecord`].
pub fn extract_service(name: &str, config: &ServiceConfig) -> (ServiceRecord, Vec<FieldWarning>) {
    let mut ex = Extractor {
        service: name,
        warnings: Vec::new(),
    };
    let record = ServiceRecord {
        name: name.to_owned(),
        image: config.image.as_ref().and_then(|v| ex.image(v)),
        ports: config.ports.as_ref().map(|v| ex.ports(v)).unwrap_or_default(),
        environment: config
            .environment
            .as_ref()
            .map(|v| ex.environment(v))
            .unwrap_or_default(),
        volumes: config.volumes.as_ref().map(|v| ex.volumes(v)).unwrap_or_default(),
        networks: config.networks.as_ref().map(|v| ex.networks(v)).unwrap_or_default(),
        depends_on: config
            .depends_on
            .as_ref()
            .map(|v| ex.depends_on(v))
            .unwrap_or_default(),
    };
    (record, ex.warnings)
}

struct Extractor<'a> {
    service: &'a str,
    warnings: Vec<FieldWarning>,
}

impl Extractor<'_> {
    fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(FieldWarning {
            service: self.service.to_owned(),
            field: field.to_owned(),
            message: message.into(),
        });
    }

    fn image(&mut self, value: &Value) -> Option<ImageRef> {
        match scalar(value) {
            Some(reference) if !reference.trim().is_empty() => Some(ImageRef::parse(&reference)),
            Some(_) => {
                self.warn("image", "empty image reference");
                None
            }
            None if value.is_null() => None,
            None => {
                self.warn("image", "expected a string");
                None
            }
        }
    }

    fn ports(&mut self, value: &Value) -> Vec<PortMapping> {
        let Some(items) = self.sequence("ports", value) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let parsed = match item {
                Value::Mapping(_) => long_port(item),
                other => match scalar(other) {
                    Some(spec) => PortMapping::parse(&spec),
                    None => Err("expected a string, number or mapping".to_owned()),
                },
            };
            match parsed {
                Ok(port) => out.push(port),
                Err(e) => self.warn("ports", e),
            }
        }
        out
    }

    fn environment(&mut self, value: &Value) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        match value {
            Value::Null => {}
            Value::Sequence(items) => {
                for item in items {
                    let Some(entry) = scalar(item) else {
                        self.warn("environment", "expected a KEY=VALUE string");
                        continue;
                    };
                    match entry.split_once('=') {
                        Some((key, val)) => {
                            out.insert(key.to_owned(), val.to_owned());
                        }
                        None => self.warn("environment", format!("entry '{entry}' has no '='")),
                    }
                }
            }
            Value::Mapping(map) => {
                for (key, val) in map {
                    let Some(key) = scalar(key) else {
                        self.warn("environment", "mapping key is not a scalar");
                        continue;
                    };
                    if matches!(val, Value::Sequence(_) | Value::Mapping(_)) {
                        self.warn("environment", format!("value of '{key}' is not a scalar"));
                        continue;
                    }
                    out.insert(key, scalar(val).unwrap_or_default());
                }
            }
            _ => self.warn("environment", "expected a sequence or mapping"),
        }
        out
    }

    fn volumes(&mut self, value: &Value) -> Vec<VolumeMount> {
        let Some(items) = self.sequence("volumes", value) else {
            return Vec::new();
        };
        let mut out: Vec<VolumeMount> = Vec::with_capacity(items.len());
        for item in items {
            let parsed = match item {
                Value::Mapping(_) => long_volume(item),
                other => match scalar(other) {
                    Some(spec) => VolumeMount::parse(&spec),
                    None => Err("expected a string or mapping".to_owned()),
                },
            };
            match parsed {
                Ok(mount) => {
                    if let Some(existing) = out
                        .iter_mut()
                        .find(|m| m.container_path == mount.container_path)
                    {
                        *existing = mount;
                    } else {
                        out.push(mount);
                    }
                }
                Err(e) => self.warn("volumes", e),
            }
        }
        out
    }

    fn networks(&mut self, value: &Value) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        match value {
            Value::Null => {}
            Value::Sequence(items) => {
                for item in items {
                    if let Value::Mapping(map) = item {
                        if let Some(name) = map.get("name").and_then(scalar) {
                            out.insert(name);
                        } else {
                            let text = serde_yaml_ng::to_string(item).unwrap_or_default();
                            let text = text.trim().to_owned();
                            self.warn(
                                "networks",
                                format!("entry without a name field, using '{text}'"),
                            );
                            out.insert(text);
                        }
                    } else if let Some(name) = scalar(item) {
                        out.insert(name);
                    } else {
                        self.warn("networks", "expected a name or mapping");
                    }
                }
            }
            Value::Mapping(map) => out.extend(map.keys().filter_map(scalar)),
            _ => self.warn("networks", "expected a sequence or mapping"),
        }
        out
    }

    fn depends_on(&mut self, value: &Value) -> Vec<String> {
        let names: Vec<String> = match value {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
            Value::Mapping(map) => map.keys().filter_map(scalar).collect(),
            _ => {
                self.warn("depends_on", "expected a sequence or mapping");
                Vec::new()
            }
        };
        let mut out: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    fn sequence<'v>(&mut self, field: &str, value: &'v Value) -> Option<&'v Vec<Value>> {
        match value {
            Value::Sequence(items) => Some(items),
            Value::Null => None,
            _ => {
                self.warn(field, "expected a sequence");
                None
            }
        }
    }
}

/// Plain text of a scalar YAML value. `None` for null and collections.
pub(crate) fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn long_port(item: &Value) -> Result<PortMapping, String> {
    let target = item
        .get("target")
        .and_then(scalar)
        .ok_or_else(|| "port mapping without a target".to_owned())?;
    let published = item.get("published").and_then(scalar);
    let protocol = item
        .get("protocol")
        .and_then(scalar)
        .map_or_else(|| "tcp".to_owned(), |p| p.to_lowercase());
    let container_port = parse_port_number(&target, &target)?;
    let host_port = match published {
        Some(p) => parse_port_number(&p, &p)?,
        None => container_port,
    };
    Ok(PortMapping {
        host_port,
        container_port,
        protocol,
    })
}

fn long_volume(item: &Value) -> Result<VolumeMount, String> {
    let target = item
        .get("target")
        .and_then(scalar)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "volume mapping without a target".to_owned())?;
    let source = item
        .get("source")
        .and_then(scalar)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| target.clone());
    let read_only = matches!(item.get("read_only"), Some(Value::Bool(true)));
    Ok(VolumeMount {
        host_path: source,
        container_path: target,
        mode: read_only.then(|| "ro".to_owned()),
    })
}
