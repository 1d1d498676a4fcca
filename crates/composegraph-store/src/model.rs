//! Graph vocabulary and the parameterized statements and read queries every
//! store backend executes.
//!
//! Labels and relationship types come from closed enums, so the Cypher text
//! of a statement is fixed per variant. Every value (identifiers, names,
//! paths, environment values) travels in the parameter map and is never
//! spliced into statement text.

use composegraph_schema::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// One result row: named fields as produced by a query's `RETURN` clause.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Service,
    Image,
    PortMapping,
    EnvironmentVariable,
    Volume,
    Network,
}

impl NodeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::Service => "Service",
            NodeLabel::Image => "Image",
            NodeLabel::PortMapping => "PortMapping",
            NodeLabel::EnvironmentVariable => "EnvironmentVariable",
            NodeLabel::Volume => "Volume",
            NodeLabel::Network => "Network",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    UsesImage,
    ExposesPort,
    HasEnvVar,
    MountsVolume,
    ConnectsTo,
    DependsOn,
}

impl Relation {
    /// Every relationship a service owns; all of them are reset before a
    /// service is rebuilt.
    pub const SERVICE_OWNED: [Relation; 6] = [
        Relation::ExposesPort,
        Relation::MountsVolume,
        Relation::HasEnvVar,
        Relation::UsesImage,
        Relation::ConnectsTo,
        Relation::DependsOn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Relation::UsesImage => "USES_IMAGE",
            Relation::ExposesPort => "EXPOSES_PORT",
            Relation::HasEnvVar => "HAS_ENV_VAR",
            Relation::MountsVolume => "MOUNTS_VOLUME",
            Relation::ConnectsTo => "CONNECTS_TO",
            Relation::DependsOn => "DEPENDS_ON",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graph mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Create the node if no node with this identifier exists, then overwrite
    /// the given properties. A `null` property value removes the property.
    MergeNode {
        label: NodeLabel,
        id: EntityId,
        properties: Map<String, Value>,
    },
    /// Delete the listed outgoing relationships of a service.
    ResetRelations {
        service: EntityId,
        relations: Vec<Relation>,
    },
    /// Create the relationship if absent. A no-op when either endpoint does
    /// not exist.
    MergeEdge {
        from_label: NodeLabel,
        from: EntityId,
        relation: Relation,
        to_label: NodeLabel,
        to: EntityId,
    },
}

impl Statement {
    pub fn cypher(&self) -> String {
        match self {
            Statement::MergeNode { label, .. } => {
                format!("MERGE (n:{label} {{uri: $uri}}) SET n += $props")
            }
            Statement::ResetRelations { .. } => "MATCH (s:Service {uri: $uri})-[r]->() \
                 WHERE type(r) IN $relations DELETE r"
                .to_owned(),
            Statement::MergeEdge {
                from_label,
                relation,
                to_label,
                ..
            } => format!(
                "MATCH (a:{from_label} {{uri: $from}}), (b:{to_label} {{uri: $to}}) \
                 MERGE (a)-[:{relation}]->(b)"
            ),
        }
    }

    pub fn parameters(&self) -> Map<String, Value> {
        let value = match self {
            Statement::MergeNode { id, properties, .. } => {
                json!({ "uri": id, "props": properties })
            }
            Statement::ResetRelations { service, relations } => json!({
                "uri": service,
                "relations": relations.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            }),
            Statement::MergeEdge { from, to, .. } => json!({ "from": from, "to": to }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Short human-readable description used in failure reports.
    pub fn describe(&self) -> String {
        match self {
            Statement::MergeNode { label, id, .. } => format!("merge {label} {id}"),
            Statement::ResetRelations { service, .. } => format!("reset relations of {service}"),
            Statement::MergeEdge {
                from, relation, to, ..
            } => format!("merge {from} -[{relation}]-> {to}"),
        }
    }
}

/// The fixed catalog of read-only traversals.
///
/// Row contracts (field names are shared by every backend):
/// - `ListServices`: `name`, `source_file`; ordered by source file, then name.
/// - `ServiceDetails`: `name`, `source_file`, `image` (`{name, tag}` or null),
///   `ports` (`[{host_port, container_port, protocol}]`), `environment`
///   (`[{key, value}]`), `volumes` (`[{host_path, container_path, mode}]`),
///   `networks` (`[name]`); one row per matching service.
/// - `PortConflicts`: `host_port`, `protocol`, `services` (`[{name, source_file}]`);
///   only port mappings exposed by more than one service.
/// - `ServiceDependencies`: `name`, `source_file`, `depends_on`, `required_by`
///   (both `[{name, source_file}]`); one row per matching service.
/// - `NetworkMembers`: `name`, `source_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadQuery {
    ListServices,
    ServiceDetails {
        service: String,
        source_file: Option<String>,
    },
    PortConflicts,
    ServiceDependencies {
        service: String,
        source_file: Option<String>,
    },
    NetworkMembers {
        network: String,
    },
}

impl ReadQuery {
    pub fn cypher(&self) -> &'static str {
        match self {
            ReadQuery::ListServices => {
                "MATCH (s:Service) \
                 RETURN s.name AS name, s.source_file AS source_file \
                 ORDER BY source_file, name"
            }
            ReadQuery::ServiceDetails { .. } => {
                "MATCH (s:Service {name: $service}) \
                 WHERE $source_file IS NULL OR s.source_file = $source_file \
                 RETURN s.name AS name, s.source_file AS source_file, \
                 head([(s)-[:USES_IMAGE]->(i:Image) | {name: i.name, tag: i.tag}]) AS image, \
                 [(s)-[:EXPOSES_PORT]->(p:PortMapping) | {host_port: p.host_port, \
                 container_port: p.container_port, protocol: p.protocol}] AS ports, \
                 [(s)-[:HAS_ENV_VAR]->(e:EnvironmentVariable) | {key: e.key, value: e.value}] AS environment, \
                 [(s)-[:MOUNTS_VOLUME]->(v:Volume) | {host_path: v.host_path, \
                 container_path: v.container_path, mode: v.mode}] AS volumes, \
                 [(s)-[:CONNECTS_TO]->(n:Network) | n.name] AS networks \
                 ORDER BY source_file"
            }
            ReadQuery::PortConflicts => {
                "MATCH (s:Service)-[:EXPOSES_PORT]->(p:PortMapping) \
                 WITH p, collect(DISTINCT {name: s.name, source_file: s.source_file}) AS services \
                 WHERE size(services) > 1 \
                 RETURN p.host_port AS host_port, p.protocol AS protocol, services \
                 ORDER BY host_port, protocol"
            }
            ReadQuery::ServiceDependencies { .. } => {
                "MATCH (s:Service {name: $service}) \
                 WHERE $source_file IS NULL OR s.source_file = $source_file \
                 RETURN s.name AS name, s.source_file AS source_file, \
                 [(s)-[:DEPENDS_ON]->(u:Service) | {name: u.name, source_file: u.source_file}] AS depends_on, \
                 [(d:Service)-[:DEPENDS_ON]->(s) | {name: d.name, source_file: d.source_file}] AS required_by \
                 ORDER BY source_file"
            }
            ReadQuery::NetworkMembers { .. } => {
                "MATCH (n:Network {name: $network})<-[:CONNECTS_TO]-(s:Service) \
                 RETURN DISTINCT s.name AS name, s.source_file AS source_file \
                 ORDER BY source_file, name"
            }
        }
    }

    pub fn parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            ReadQuery::ListServices | ReadQuery::PortConflicts => {}
            ReadQuery::ServiceDetails {
                service,
                source_file,
            }
            | ReadQuery::ServiceDependencies {
                service,
                source_file,
            } => {
                params.insert("service".to_owned(), json!(service));
                params.insert("source_file".to_owned(), json!(source_file));
            }
            ReadQuery::NetworkMembers { network } => {
                params.insert("network".to_owned(), json!(network));
            }
        }
        params
    }
}

/// Counters reported by a store after executing a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecSummary {
    pub nodes_created: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
}

impl std::ops::AddAssign for ExecSummary {
    fn add_assign(&mut self, other: Self) {
        self.nodes_created += other.nodes_created;
        self.relationships_created += other.relationships_created;
        self.relationships_deleted += other.relationships_deleted;
    }
}
