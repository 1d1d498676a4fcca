use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether service-owned identifiers include the source manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityScope {
    /// Services are unique per (source file, name). Dependencies resolve
    /// within their own manifest only.
    #[default]
    File,
    /// Services are unique per name across all manifests.
    Global,
}

impl fmt::Display for IdentityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityScope::File => write!(f, "file"),
            IdentityScope::Global => write!(f, "global"),
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// One identifier path segment. Lossy sanitization gets a short digest of
/// the raw text appended so distinct inputs never share a segment.
fn segment(raw: &str) -> String {
    let clean = sanitize(raw);
    if clean == raw && !clean.is_empty() {
        return clean;
    }
    let digest = blake3::hash(raw.as_bytes()).to_hex().to_string();
    format!("{clean}_{}", &digest[..8])
}

fn join(kind: &str, parts: &[&str]) -> EntityId {
    let mut id = kind.to_owned();
    for part in parts {
        id.push('/');
        id.push_str(&segment(part));
    }
    EntityId::new(id)
}

/// Derives canonical identifiers for every entity extracted from a manifest.
///
/// Shared entities (images, port mappings, networks) are keyed by their own
/// semantic key and unify across manifests. Service-owned entities are keyed
/// by source file, owning service and local name; the source file is left
/// out under [`IdentityScope::Global`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityScheme {
    scope: IdentityScope,
}

impl IdentityScheme {
    pub fn new(scope: IdentityScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> IdentityScope {
        self.scope
    }

    pub fn service(&self, source_file: &str, service: &str) -> EntityId {
        match self.scope {
            IdentityScope::File => join("service", &[source_file, service]),
            IdentityScope::Global => join("service", &[service]),
        }
    }

    pub fn environment_variable(&self, source_file: &str, service: &str, key: &str) -> EntityId {
        match self.scope {
            IdentityScope::File => join("env", &[source_file, service, key]),
            IdentityScope::Global => join("env", &[service, key]),
        }
    }

    pub fn volume(&self, source_file: &str, service: &str, container_path: &str) -> EntityId {
        match self.scope {
            IdentityScope::File => join("volume", &[source_file, service, container_path]),
            IdentityScope::Global => join("volume", &[service, container_path]),
        }
    }

    pub fn image(name: &str, tag: &str) -> EntityId {
        join("image", &[name, tag])
    }

    pub fn port(host_port: u16, protocol: &str) -> EntityId {
        join("port", &[&host_port.to_string(), protocol])
    }

    pub fn network(name: &str) -> EntityId {
        join("network", &[name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize("docker-compose.web.yml"), "docker_compose_web_yml");
        assert_eq!(sanitize("O'Brien path/x"), "O_Brien_path_x");
        assert_eq!(sanitize("plain_Name9"), "plain_Name9");
    }

    #[test]
    fn identifiers_are_deterministic() {
        let scheme = IdentityScheme::default();
        assert_eq!(scheme.service("a.yml", "web"), scheme.service("a.yml", "web"));
        assert_eq!(
            IdentityScheme::image("nginx", "1.25"),
            IdentityScheme::image("nginx", "1.25")
        );
    }

    #[test]
    fn services_are_file_scoped_by_default() {
        let scheme = IdentityScheme::default();
        assert_ne!(scheme.service("a.yml", "web"), scheme.service("b.yml", "web"));
    }

    #[test]
    fn global_scope_drops_source_file() {
        let scheme = IdentityScheme::new(IdentityScope::Global);
        assert_eq!(scheme.service("a.yml", "web"), scheme.service("b.yml", "web"));
        assert_eq!(
            scheme.environment_variable("a.yml", "web", "PORT"),
            scheme.environment_variable("b.yml", "web", "PORT")
        );
    }

    #[test]
    fn shared_identifiers_ignore_source() {
        assert_eq!(IdentityScheme::port(8080, "tcp"), "port/8080/tcp");
        assert_eq!(IdentityScheme::network("backend"), "network/backend");
        assert_ne!(IdentityScheme::port(53, "tcp"), IdentityScheme::port(53, "udp"));
    }

    #[test]
    fn lossy_sanitization_does_not_collide() {
        let scheme = IdentityScheme::default();
        let dashed = scheme.service("app.yml", "api-gateway");
        let underscored = scheme.service("app.yml", "api_gateway");
        assert_ne!(dashed, underscored);
    }

    #[test]
    fn segment_boundaries_do_not_collide() {
        let scheme = IdentityScheme::default();
        let a = scheme.environment_variable("a_b", "c", "K");
        let b = scheme.environment_variable("a", "b_c", "K");
        assert_ne!(a, b);
    }

    #[test]
    fn identifiers_contain_only_safe_segments() {
        let scheme = IdentityScheme::default();
        let id = scheme.volume("stack.yml", "db", "/var/lib/postgres's data");
        for part in id.split('/') {
            assert!(part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
        assert_eq!(id.kind(), "volume");
    }

    #[test]
    fn empty_segment_still_gets_a_name() {
        let id = IdentityScheme::network("");
        assert!(id.len() > "network/".len());
    }

    #[test]
    fn scope_serde_lowercase() {
        let s: IdentityScope = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(s, IdentityScope::Global);
        assert_eq!(IdentityScope::File.to_string(), "file");
    }
}
