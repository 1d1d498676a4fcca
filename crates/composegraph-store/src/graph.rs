use crate::model::{ExecSummary, NodeLabel, ReadQuery, Relation, Row, Statement};
use crate::StoreError;
use composegraph_schema::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub label: NodeLabel,
    pub properties: Map<String, Value>,
}

impl Node {
    pub fn property(&self, key: &str) -> &Value {
        self.properties.get(key).unwrap_or(&Value::Null)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: EntityId,
    pub relation: Relation,
    pub to: EntityId,
}

/// An in-process property graph that executes [`Statement`]s and
/// [`ReadQuery`]s with the same semantics as the Cypher they render to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphSnapshot {
    nodes: BTreeMap<EntityId, Node>,
    edges: BTreeSet<Edge>,
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(&EntityId::from(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes_with_label(&self, label: NodeLabel) -> impl Iterator<Item = (&EntityId, &Node)> {
        self.nodes.iter().filter(move |(_, n)| n.label == label)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn has_edge(&self, from: &str, relation: Relation, to: &str) -> bool {
        self.edges.contains(&Edge {
            from: EntityId::from(from),
            relation,
            to: EntityId::from(to),
        })
    }

    pub fn apply(&mut self, statement: &Statement) -> Result<ExecSummary, StoreError> {
        let mut summary = ExecSummary::default();
        match statement {
            Statement::MergeNode {
                label,
                id,
                properties,
            } => {
                match self.nodes.get(id) {
                    Some(existing) if existing.label != *label => {
                        return Err(StoreError::Rejected(format!(
                            "identifier {id} already belongs to a {} node, cannot merge as {label}",
                            existing.label
                        )));
                    }
                    Some(_) => {}
                    None => summary.nodes_created = 1,
                }
                let node = self.nodes.entry(id.clone()).or_insert_with(|| {
                    let mut props = Map::new();
                    props.insert("uri".to_owned(), json!(id));
                    Node {
                        label: *label,
                        properties: props,
                    }
                });
                for (key, value) in properties {
                    if key == "uri" {
                        continue;
                    }
                    if value.is_null() {
                        node.properties.remove(key);
                    } else {
                        node.properties.insert(key.clone(), value.clone());
                    }
                }
            }
            Statement::ResetRelations { service, relations } => {
                let is_service = self
                    .nodes
                    .get(service)
                    .is_some_and(|n| n.label == NodeLabel::Service);
                if is_service {
                    let before = self.edges.len();
                    self.edges
                        .retain(|e| !(e.from == *service && relations.contains(&e.relation)));
                    summary.relationships_deleted = (before - self.edges.len()) as u64;
                }
            }
            Statement::MergeEdge {
                from_label,
                from,
                relation,
                to_label,
                to,
            } => {
                let endpoints_match = self.labelled(from, *from_label) && self.labelled(to, *to_label);
                if endpoints_match {
                    let inserted = self.edges.insert(Edge {
                        from: from.clone(),
                        relation: *relation,
                        to: to.clone(),
                    });
                    if inserted {
                        summary.relationships_created = 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    fn labelled(&self, id: &EntityId, label: NodeLabel) -> bool {
        self.nodes.get(id).is_some_and(|n| n.label == label)
    }

    fn targets(&self, from: &EntityId, relation: Relation) -> impl Iterator<Item = &Node> {
        let from = from.clone();
        self.edges
            .iter()
            .filter(move |e| e.from == from && e.relation == relation)
            .filter_map(move |e| self.nodes.get(&e.to))
    }

    fn sources(&self, to: &EntityId, relation: Relation) -> impl Iterator<Item = &Node> {
        let to = to.clone();
        self.edges
            .iter()
            .filter(move |e| e.to == to && e.relation == relation)
            .filter_map(move |e| self.nodes.get(&e.from))
    }

    fn matching_services<'a>(
        &'a self,
        service: &'a str,
        source_file: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a EntityId, &'a Node)> {
        self.nodes_with_label(NodeLabel::Service).filter(move |(_, n)| {
            n.text("name") == Some(service)
                && source_file.is_none_or(|sf| n.text("source_file") == Some(sf))
        })
    }

    pub fn query(&self, query: &ReadQuery) -> Vec<Row> {
        let mut rows = match query {
            ReadQuery::ListServices => self
                .nodes_with_label(NodeLabel::Service)
                .map(|(_, n)| service_ref(n))
                .collect(),
            ReadQuery::ServiceDetails {
                service,
                source_file,
            } => self
                .matching_services(service, source_file.as_deref())
                .map(|(id, n)| self.detail_row(id, n))
                .collect(),
            ReadQuery::PortConflicts => self.port_conflicts(),
            ReadQuery::ServiceDependencies {
                service,
                source_file,
            } => self
                .matching_services(service, source_file.as_deref())
                .map(|(id, n)| {
                    let mut row = service_ref(n);
                    row.insert(
                        "depends_on".to_owned(),
                        Value::Array(self.targets(id, Relation::DependsOn).map(ref_value).collect()),
                    );
                    row.insert(
                        "required_by".to_owned(),
                        Value::Array(self.sources(id, Relation::DependsOn).map(ref_value).collect()),
                    );
                    row
                })
                .collect(),
            ReadQuery::NetworkMembers { network } => {
                let mut members: Vec<Row> = self
                    .nodes_with_label(NodeLabel::Network)
                    .filter(|(_, n)| n.text("name") == Some(network.as_str()))
                    .flat_map(|(id, _)| self.sources(id, Relation::ConnectsTo))
                    .filter(|n| n.label == NodeLabel::Service)
                    .map(service_ref)
                    .collect();
                members.sort_by(compare_service_rows);
                members.dedup();
                members
            }
        };
        match query {
            ReadQuery::ListServices => rows.sort_by(compare_service_rows),
            ReadQuery::ServiceDetails { .. } | ReadQuery::ServiceDependencies { .. } => {
                rows.sort_by(|a, b| text_of(a, "source_file").cmp(text_of(b, "source_file")));
            }
            ReadQuery::PortConflicts | ReadQuery::NetworkMembers { .. } => {}
        }
        rows
    }

    fn detail_row(&self, id: &EntityId, service: &Node) -> Row {
        let mut row = service_ref(service);
        let image = self
            .targets(id, Relation::UsesImage)
            .next()
            .map_or(Value::Null, |i| {
                json!({ "name": i.property("name"), "tag": i.property("tag") })
            });
        let ports: Vec<Value> = self
            .targets(id, Relation::ExposesPort)
            .map(|p| {
                json!({
                    "host_port": p.property("host_port"),
                    "container_port": p.property("container_port"),
                    "protocol": p.property("protocol"),
                })
            })
            .collect();
        let environment: Vec<Value> = self
            .targets(id, Relation::HasEnvVar)
            .map(|e| json!({ "key": e.property("key"), "value": e.property("value") }))
            .collect();
        let volumes: Vec<Value> = self
            .targets(id, Relation::MountsVolume)
            .map(|v| {
                json!({
                    "host_path": v.property("host_path"),
                    "container_path": v.property("container_path"),
                    "mode": v.property("mode"),
                })
            })
            .collect();
        let networks: Vec<Value> = self
            .targets(id, Relation::ConnectsTo)
            .map(|n| n.property("name").clone())
            .collect();

        row.insert("image".to_owned(), image);
        row.insert("ports".to_owned(), Value::Array(ports));
        row.insert("environment".to_owned(), Value::Array(environment));
        row.insert("volumes".to_owned(), Value::Array(volumes));
        row.insert("networks".to_owned(), Value::Array(networks));
        row
    }

    fn port_conflicts(&self) -> Vec<Row> {
        let mut rows: Vec<(i64, String, Row)> = Vec::new();
        for (id, port) in self.nodes_with_label(NodeLabel::PortMapping) {
            let mut services: Vec<Row> = self
                .sources(id, Relation::ExposesPort)
                .filter(|n| n.label == NodeLabel::Service)
                .map(service_ref)
                .collect();
            services.sort_by(compare_service_rows);
            services.dedup();
            if services.len() < 2 {
                continue;
            }
            let host_port = port.property("host_port").as_i64().unwrap_or_default();
            let protocol = port.text("protocol").unwrap_or_default().to_owned();
            let mut row = Row::new();
            row.insert("host_port".to_owned(), port.property("host_port").clone());
            row.insert("protocol".to_owned(), port.property("protocol").clone());
            row.insert(
                "services".to_owned(),
                Value::Array(services.into_iter().map(Value::Object).collect()),
            );
            rows.push((host_port, protocol, row));
        }
        rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        rows.into_iter().map(|(_, _, row)| row).collect()
    }
}

fn service_ref(node: &Node) -> Row {
    let mut row = Row::new();
    row.insert("name".to_owned(), node.property("name").clone());
    row.insert("source_file".to_owned(), node.property("source_file").clone());
    row
}

fn ref_value(node: &Node) -> Value {
    Value::Object(service_ref(node))
}

fn text_of<'a>(row: &'a Row, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn compare_service_rows(a: &Row, b: &Row) -> Ordering {
    text_of(a, "source_file")
        .cmp(text_of(b, "source_file"))
        .then_with(|| text_of(a, "name").cmp(text_of(b, "name")))
}
