use composegraph_schema::{EntityId, IdentityScheme, NormalizedManifest, ServiceRecord};
use composegraph_store::{NodeLabel, Relation, Statement};
use serde_json::{json, Map, Value};

/// Turns normalized manifests into ordered graph statements.
///
/// A manifest compiles in two kinds of units: one base unit that upserts every
/// declared service, then one detail unit per service that resets the
/// service's outgoing relationships and rebuilds them. Dependency edges need
/// their target service to exist, so the base unit of a manifest always runs
/// before any of its detail units.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    scheme: IdentityScheme,
}

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl GraphBuilder {
    pub fn new(scheme: IdentityScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> IdentityScheme {
        self.scheme
    }

    pub fn service_id(&self, manifest: &NormalizedManifest, service: &str) -> EntityId {
        self.scheme.service(&manifest.source_file, service)
    }

    pub fn base_statements(&self, manifest: &NormalizedManifest) -> Vec<Statement> {
        manifest
            .services
            .iter()
            .map(|service| Statement::MergeNode {
                label: NodeLabel::Service,
                id: self.service_id(manifest, &service.name),
                properties: properties(json!({
                    "name": service.name,
                    "source_file": manifest.source_file,
                })),
            })
            .collect()
    }

    pub fn detail_statements(
        &self,
        manifest: &NormalizedManifest,
        service: &ServiceRecord,
    ) -> Vec<Statement> {
        let file = manifest.source_file.as_str();
        let svc = self.service_id(manifest, &service.name);
        let mut out = vec![Statement::ResetRelations {
            service: svc.clone(),
            relations: Relation::SERVICE_OWNED.to_vec(),
        }];

        let link = |out: &mut Vec<Statement>, relation, to_label, to: EntityId| {
            out.push(Statement::MergeEdge {
                from_label: NodeLabel::Service,
                from: svc.clone(),
                relation,
                to_label,
                to,
            });
        };

        if let Some(image) = &service.image {
            let id = IdentityScheme::image(&image.name, &image.tag);
            out.push(Statement::MergeNode {
                label: NodeLabel::Image,
                id: id.clone(),
                properties: properties(json!({
                    "name": image.name,
                    "tag": image.tag,
                    "reference": image.reference(),
                })),
            });
            link(&mut out, Relation::UsesImage, NodeLabel::Image, id);
        }

        for port in &service.ports {
            let id = IdentityScheme::port(port.host_port, &port.protocol);
            out.push(Statement::MergeNode {
                label: NodeLabel::PortMapping,
                id: id.clone(),
                properties: properties(json!({
                    "host_port": port.host_port,
                    "container_port": port.container_port,
                    "protocol": port.protocol,
                    "display": port.display(),
                })),
            });
            link(&mut out, Relation::ExposesPort, NodeLabel::PortMapping, id);
        }

        for (key, value) in &service.environment {
            let id = self.scheme.environment_variable(file, &service.name, key);
            out.push(Statement::MergeNode {
                label: NodeLabel::EnvironmentVariable,
                id: id.clone(),
                properties: properties(json!({ "key": key, "value": value })),
            });
            link(&mut out, Relation::HasEnvVar, NodeLabel::EnvironmentVariable, id);
        }

        for volume in &service.volumes {
            let id = self
                .scheme
                .volume(file, &service.name, &volume.container_path);
            out.push(Statement::MergeNode {
                label: NodeLabel::Volume,
                id: id.clone(),
                properties: properties(json!({
                    "host_path": volume.host_path,
                    "container_path": volume.container_path,
                    "mode": volume.mode,
                })),
            });
            link(&mut out, Relation::MountsVolume, NodeLabel::Volume, id);
        }

        for dependency in &service.depends_on {
            let id = self.service_id(manifest, dependency);
            link(&mut out, Relation::DependsOn, NodeLabel::Service, id);
        }

        for network in &service.networks {
            let id = IdentityScheme::network(network);
            out.push(Statement::MergeNode {
                label: NodeLabel::Network,
                id: id.clone(),
                properties: properties(json!({ "name": network })),
            });
            link(&mut out, Relation::ConnectsTo, NodeLabel::Network, id);
        }

        out
    }

    /// Dependencies naming services the manifest does not declare. Their
    /// edges are still issued; the store treats them as no-ops unless the
    /// target exists from another manifest under the global scope.
    pub fn undeclared_dependencies<'a>(
        manifest: &NormalizedManifest,
        service: &'a ServiceRecord,
    ) -> Vec<&'a str> {
        service
            .depends_on
            .iter()
            .filter(|dep| !manifest.declares(dep))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composegraph_schema::{parse_manifest_str, IdentityScope};

    fn manifest(yaml: &str) -> NormalizedManifest {
        parse_manifest_str(yaml).unwrap().normalize("stack.yml")
    }

    const STACK: &str = r#"
services:
  web:
    image: nginx:1.25
    ports: ["8080:80", "53:53/udp"]
    environment:
      MODE: prod
    volumes: ["./html:/usr/share/nginx/html:ro"]
    depends_on: [db]
    networks: [front]
  db:
    image: postgres
"#;

    #[test]
    fn base_pass_upserts_every_service() {
        let m = manifest(STACK);
        let stmts = GraphBuilder::default().base_statements(&m);
        assert_eq!(stmts.len(), 2);
        for stmt in &stmts {
            let Statement::MergeNode {
                label, properties, ..
            } = stmt
            else {
                panic!("expected node merge, got {stmt:?}");
            };
            assert_eq!(*label, NodeLabel::Service);
            assert_eq!(properties["source_file"], json!("stack.yml"));
        }
    }

    #[test]
    fn detail_pass_starts_with_reset() {
        let m = manifest(STACK);
        let web = m.service("web").unwrap();
        let stmts = GraphBuilder::default().detail_statements(&m, web);
        let Statement::ResetRelations { relations, .. } = &stmts[0] else {
            panic!("first statement must reset relations");
        };
        assert_eq!(relations.len(), 6);
        assert!(stmts[1..]
            .iter()
            .all(|s| !matches!(s, Statement::ResetRelations { .. })));
    }

    #[test]
    fn detail_pass_links_every_entity() {
        let m = manifest(STACK);
        let web = m.service("web").unwrap();
        let stmts = GraphBuilder::default().detail_statements(&m, web);
        let relations: Vec<Relation> = stmts
            .iter()
            .filter_map(|s| match s {
                Statement::MergeEdge { relation, .. } => Some(*relation),
                _ => None,
            })
            .collect();
        assert_eq!(
            relations,
            vec![
                Relation::UsesImage,
                Relation::ExposesPort,
                Relation::ExposesPort,
                Relation::HasEnvVar,
                Relation::MountsVolume,
                Relation::DependsOn,
                Relation::ConnectsTo,
            ]
        );
        assert!(stmts.iter().any(|s| matches!(
            s,
            Statement::MergeNode { id, .. } if id == "port/53/udp"
        )));
    }

    #[test]
    fn volume_mode_is_carried_as_property() {
        let m = manifest(STACK);
        let stmts = GraphBuilder::default().detail_statements(&m, m.service("web").unwrap());
        let volume = stmts
            .iter()
            .find_map(|s| match s {
                Statement::MergeNode {
                    label: NodeLabel::Volume,
                    properties,
                    ..
                } => Some(properties),
                _ => None,
            })
            .unwrap();
        assert_eq!(volume["mode"], json!("ro"));
        assert_eq!(volume["container_path"], json!("/usr/share/nginx/html"));
    }

    #[test]
    fn service_without_details_only_resets() {
        let m = manifest("services:\n  idle:\n");
        let stmts = GraphBuilder::default().detail_statements(&m, m.service("idle").unwrap());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn dependency_targets_follow_scope() {
        let m = manifest(STACK);
        let web = m.service("web").unwrap();
        let global = GraphBuilder::new(IdentityScheme::new(IdentityScope::Global));
        let target = global
            .detail_statements(&m, web)
            .into_iter()
            .find_map(|s| match s {
                Statement::MergeEdge {
                    relation: Relation::DependsOn,
                    to,
                    ..
                } => Some(to),
                _ => None,
            })
            .unwrap();
        assert_eq!(target, "service/db");
    }

    #[test]
    fn reports_undeclared_dependencies() {
        let m = manifest("services:\n  web:\n    depends_on: [db, cache]\n  db: {}\n");
        let web = m.service("web").unwrap();
        assert_eq!(GraphBuilder::undeclared_dependencies(&m, web), vec!["cache"]);
    }
}
