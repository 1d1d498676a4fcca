use crate::CoreError;
use composegraph_store::{GraphStore, ReadQuery, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceRef {
    pub name: String,
    pub source_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageInfo {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortInfo {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub name: String,
    pub source_file: String,
    pub image: Option<ImageInfo>,
    pub ports: Vec<PortInfo>,
    pub environment: Vec<EnvVar>,
    pub volumes: Vec<VolumeInfo>,
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConflict {
    pub host_port: u16,
    pub protocol: String,
    pub services: Vec<ServiceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub name: String,
    pub source_file: String,
    /// Services this one needs.
    pub depends_on: Vec<ServiceRef>,
    /// Services that need this one.
    pub required_by: Vec<ServiceRef>,
}

fn normalize<T: Ord>(items: &mut Vec<T>) {
    items.sort();
    items.dedup();
}

/// Read-only traversals over a compiled graph.
///
/// Every operation opens its own session, so one service can be shared by
/// concurrent callers. Unknown names yield empty results, never errors.
pub struct QueryService<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> QueryService<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    fn rows<T: DeserializeOwned>(&self, query: &ReadQuery) -> Result<Vec<T>, CoreError> {
        let mut session = self.store.open_session()?;
        let rows: Vec<Row> = session.query(query)?;
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(CoreError::Decode))
            .collect()
    }

    pub fn list_services(&self) -> Result<Vec<ServiceRef>, CoreError> {
        let mut services: Vec<ServiceRef> = self.rows(&ReadQuery::ListServices)?;
        services.sort_by(|a, b| (&a.source_file, &a.name).cmp(&(&b.source_file, &b.name)));
        services.dedup();
        Ok(services)
    }

    pub fn service_details(
        &self,
        service: &str,
        source_file: Option<&str>,
    ) -> Result<Vec<ServiceDetail>, CoreError> {
        let mut details: Vec<ServiceDetail> = self.rows(&ReadQuery::ServiceDetails {
            service: service.to_owned(),
            source_file: source_file.map(str::to_owned),
        })?;
        for detail in &mut details {
            normalize(&mut detail.ports);
            normalize(&mut detail.environment);
            normalize(&mut detail.volumes);
            normalize(&mut detail.networks);
        }
        details.sort_by(|a, b| a.source_file.cmp(&b.source_file));
        Ok(details)
    }

    pub fn port_conflicts(&self) -> Result<Vec<PortConflict>, CoreError> {
        let mut conflicts: Vec<PortConflict> = self.rows(&ReadQuery::PortConflicts)?;
        for conflict in &mut conflicts {
            conflict
                .services
                .sort_by(|a, b| (&a.source_file, &a.name).cmp(&(&b.source_file, &b.name)));
            conflict.services.dedup();
        }
        conflicts.retain(|c| c.services.len() > 1);
        conflicts.sort_by(|a, b| (a.host_port, &a.protocol).cmp(&(b.host_port, &b.protocol)));
        Ok(conflicts)
    }

    pub fn service_dependencies(
        &self,
        service: &str,
        source_file: Option<&str>,
    ) -> Result<Vec<DependencyReport>, CoreError> {
        let mut reports: Vec<DependencyReport> = self.rows(&ReadQuery::ServiceDependencies {
            service: service.to_owned(),
            source_file: source_file.map(str::to_owned),
        })?;
        for report in &mut reports {
            normalize(&mut report.depends_on);
            normalize(&mut report.required_by);
        }
        reports.sort_by(|a, b| a.source_file.cmp(&b.source_file));
        Ok(reports)
    }

    pub fn network_members(&self, network: &str) -> Result<Vec<ServiceRef>, CoreError> {
        let mut members: Vec<ServiceRef> = self.rows(&ReadQuery::NetworkMembers {
            network: network.to_owned(),
        })?;
        members.sort_by(|a, b| (&a.source_file, &a.name).cmp(&(&b.source_file, &b.name)));
        members.dedup();
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composegraph_store::{ExecSummary, GraphSession, Statement, StoreError};
    use serde_json::json;

    /// Store that answers every query with fixed rows.
    struct CannedStore(Vec<Row>);

    struct CannedSession<'a>(&'a [Row]);

    impl GraphStore for CannedStore {
        fn name(&self) -> &str {
            "canned"
        }

        fn open_session(&self) -> Result<Box<dyn GraphSession + '_>, StoreError> {
            Ok(Box::new(CannedSession(&self.0)))
        }
    }

    impl GraphSession for CannedSession<'_> {
        fn run(&mut self, _statement: &Statement) -> Result<ExecSummary, StoreError> {
            Ok(ExecSummary::default())
        }

        fn query(&mut self, _query: &ReadQuery) -> Result<Vec<Row>, StoreError> {
            Ok(self.0.to_vec())
        }
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn duplicate_rows_are_collapsed_and_sorted() {
        let store = CannedStore(vec![
            row(json!({"name": "web", "source_file": "b.yml"})),
            row(json!({"name": "api", "source_file": "a.yml"})),
            row(json!({"name": "web", "source_file": "b.yml"})),
        ]);
        let services = QueryService::new(&store).list_services().unwrap();
        assert_eq!(
            services,
            vec![
                ServiceRef {
                    name: "api".to_owned(),
                    source_file: "a.yml".to_owned()
                },
                ServiceRef {
                    name: "web".to_owned(),
                    source_file: "b.yml".to_owned()
                },
            ]
        );
    }

    #[test]
    fn detail_collections_are_deduplicated() {
        let store = CannedStore(vec![row(json!({
            "name": "web",
            "source_file": "a.yml",
            "image": {"name": "nginx", "tag": "1.25"},
            "ports": [
                {"host_port": 8080, "container_port": 80, "protocol": "tcp"},
                {"host_port": 443, "container_port": 443, "protocol": "tcp"},
                {"host_port": 8080, "container_port": 80, "protocol": "tcp"}
            ],
            "environment": [{"key": "B", "value": "2"}, {"key": "A", "value": "1"}],
            "volumes": [{"host_path": "./data", "container_path": "/data", "mode": null}],
            "networks": ["front", "back", "front"]
        }))]);
        let details = QueryService::new(&store).service_details("web", None).unwrap();
        let web = &details[0];
        assert_eq!(web.ports.len(), 2);
        assert_eq!(web.ports[0].host_port, 443);
        assert_eq!(web.environment[0].key, "A");
        assert_eq!(web.networks, vec!["back", "front"]);
        assert_eq!(web.image.as_ref().unwrap().tag, "1.25");
        assert!(web.volumes[0].mode.is_none());
    }

    #[test]
    fn single_service_groups_are_not_conflicts() {
        let store = CannedStore(vec![row(json!({
            "host_port": 8080,
            "protocol": "tcp",
            "services": [
                {"name": "a", "source_file": "x.yml"},
                {"name": "a", "source_file": "x.yml"}
            ]
        }))]);
        assert!(QueryService::new(&store).port_conflicts().unwrap().is_empty());
    }

    #[test]
    fn malformed_rows_are_decode_errors() {
        let store = CannedStore(vec![row(json!({"name": 42}))]);
        let err = QueryService::new(&store).list_services().unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
    }
}
