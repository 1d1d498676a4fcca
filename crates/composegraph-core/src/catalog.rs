//! The versioned operation catalog shared by every caller-facing surface.
//!
//! Callers name an operation and pass a JSON parameter object; the answer is
//! always an [`OperationResponse`], never an error.

use crate::query::QueryService;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("invalid parameters for {operation}: {reason}")]
    InvalidParameters { operation: String, reason: String },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParameterSpec],
}

const SERVICE_PARAMS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "service",
        required: true,
        description: "service name",
    },
    ParameterSpec {
        name: "source_file",
        required: false,
        description: "restrict to the service declared in this manifest",
    },
];

pub const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "list_all_services",
        description: "every service, ordered by source file then name",
        parameters: &[],
    },
    OperationSpec {
        name: "get_service_details",
        description: "image, ports, environment, volumes and networks of a service",
        parameters: SERVICE_PARAMS,
    },
    OperationSpec {
        name: "check_port_conflicts",
        description: "host port mappings claimed by more than one service",
        parameters: &[],
    },
    OperationSpec {
        name: "find_service_dependencies",
        description: "what a service depends on and what requires it",
        parameters: SERVICE_PARAMS,
    },
    OperationSpec {
        name: "inspect_network_members",
        description: "services attached to a network",
        parameters: &[ParameterSpec {
            name: "network",
            required: true,
            description: "network name",
        }],
    },
];

/// A parsed catalog request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ListAllServices,
    GetServiceDetails {
        service: String,
        source_file: Option<String>,
    },
    CheckPortConflicts,
    FindServiceDependencies {
        service: String,
        source_file: Option<String>,
    },
    InspectNetworkMembers {
        network: String,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceParams {
    service: String,
    #[serde(default)]
    source_file: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkParams {
    network: String,
}

fn decode<T: serde::de::DeserializeOwned>(operation: &str, params: &Value) -> Result<T, CatalogError> {
    let params = if params.is_null() {
        json!({})
    } else {
        params.clone()
    };
    if !params.is_object() {
        return Err(CatalogError::InvalidParameters {
            operation: operation.to_owned(),
            reason: "parameters must be a JSON object".to_owned(),
        });
    }
    serde_json::from_value(params).map_err(|e| CatalogError::InvalidParameters {
        operation: operation.to_owned(),
        reason: e.to_string(),
    })
}

impl Operation {
    pub fn parse(name: &str, params: &Value) -> Result<Self, CatalogError> {
        match name {
            "list_all_services" => {
                decode::<NoParams>(name, params)?;
                Ok(Operation::ListAllServices)
            }
            "get_service_details" => {
                let p: ServiceParams = decode(name, params)?;
                Ok(Operation::GetServiceDetails {
                    service: p.service,
                    source_file: p.source_file,
                })
            }
            "check_port_conflicts" => {
                decode::<NoParams>(name, params)?;
                Ok(Operation::CheckPortConflicts)
            }
            "find_service_dependencies" => {
                let p: ServiceParams = decode(name, params)?;
                Ok(Operation::FindServiceDependencies {
                    service: p.service,
                    source_file: p.source_file,
                })
            }
            "inspect_network_members" => {
                let p: NetworkParams = decode(name, params)?;
                Ok(Operation::InspectNetworkMembers { network: p.network })
            }
            other => Err(CatalogError::UnknownOperation(other.to_owned())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListAllServices => "list_all_services",
            Operation::GetServiceDetails { .. } => "get_service_details",
            Operation::CheckPortConflicts => "check_port_conflicts",
            Operation::FindServiceDependencies { .. } => "find_service_dependencies",
            Operation::InspectNetworkMembers { .. } => "inspect_network_members",
        }
    }

    pub fn execute(&self, queries: &QueryService<'_>) -> Result<Value, CoreError> {
        let value = match self {
            Operation::ListAllServices => serde_json::to_value(queries.list_services()?)?,
            Operation::GetServiceDetails {
                service,
                source_file,
            } => serde_json::to_value(queries.service_details(service, source_file.as_deref())?)?,
            Operation::CheckPortConflicts => serde_json::to_value(queries.port_conflicts()?)?,
            Operation::FindServiceDependencies {
                service,
                source_file,
            } => serde_json::to_value(
                queries.service_dependencies(service, source_file.as_deref())?,
            )?,
            Operation::InspectNetworkMembers { network } => {
                serde_json::to_value(queries.network_members(network)?)?
            }
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub version: u32,
    pub operation: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResponse {
    pub fn success(operation: &str, result: Value) -> Self {
        Self {
            version: CATALOG_VERSION,
            operation: operation.to_owned(),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(operation: &str, error: impl std::fmt::Display) -> Self {
        Self {
            version: CATALOG_VERSION,
            operation: operation.to_owned(),
            ok: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Run a parsed operation and wrap the outcome.
pub fn respond(queries: &QueryService<'_>, operation: &Operation) -> OperationResponse {
    match operation.execute(queries) {
        Ok(result) => OperationResponse::success(operation.name(), result),
        Err(e) => {
            tracing::error!("{} failed: {e}", operation.name());
            OperationResponse::failure(operation.name(), e)
        }
    }
}

/// Parse and run an operation by name.
pub fn dispatch(queries: &QueryService<'_>, name: &str, params: &Value) -> OperationResponse {
    match Operation::parse(name, params) {
        Ok(operation) => respond(queries, &operation),
        Err(e) => OperationResponse::failure(name, e),
    }
}

/// Machine-readable listing of the catalog.
pub fn listing() -> Value {
    json!({ "version": CATALOG_VERSION, "operations": OPERATIONS })
}

#[cfg(test)]
mod tests {
    use super::*;
    use composegraph_store::MemoryGraphStore;

    #[test]
    fn every_listed_operation_parses() {
        for spec in OPERATIONS {
            let params: serde_json::Map<String, Value> = spec
                .parameters
                .iter()
                .filter(|p| p.required)
                .map(|p| (p.name.to_owned(), json!("x")))
                .collect();
            let op = Operation::parse(spec.name, &Value::Object(params)).unwrap();
            assert_eq!(op.name(), spec.name);
        }
    }

    #[test]
    fn optional_source_file_is_accepted() {
        let op = Operation::parse(
            "find_service_dependencies",
            &json!({"service": "web", "source_file": "a.yml"}),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::FindServiceDependencies {
                service: "web".to_owned(),
                source_file: Some("a.yml".to_owned())
            }
        );
    }

    #[test]
    fn parse_errors_are_classified() {
        assert!(matches!(
            Operation::parse("drop_database", &Value::Null),
            Err(CatalogError::UnknownOperation(_))
        ));
        assert!(matches!(
            Operation::parse("get_service_details", &json!({})),
            Err(CatalogError::InvalidParameters { .. })
        ));
        assert!(matches!(
            Operation::parse("inspect_network_members", &json!(["front"])),
            Err(CatalogError::InvalidParameters { .. })
        ));
        assert!(matches!(
            Operation::parse("list_all_services", &json!({"limit": 3})),
            Err(CatalogError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn dispatch_never_fails() {
        let store = MemoryGraphStore::new();
        let queries = QueryService::new(&store);

        let resp = dispatch(&queries, "list_all_services", &Value::Null);
        assert!(resp.ok);
        assert_eq!(resp.result, Some(json!([])));
        assert_eq!(resp.version, CATALOG_VERSION);

        let resp = dispatch(&queries, "nope", &Value::Null);
        assert!(!resp.ok);
        assert!(resp.error.unwrap().contains("unknown operation"));

        let resp = dispatch(&queries, "inspect_network_members", &json!({"network": "ghost"}));
        assert!(resp.ok);
        assert_eq!(resp.result, Some(json!([])));
    }

    #[test]
    fn response_omits_absent_fields() {
        let json = serde_json::to_value(OperationResponse::failure("x", "boom")).unwrap();
        assert_eq!(
            json,
            json!({"version": 1, "operation": "x", "ok": false, "error": "boom"})
        );
    }

    #[test]
    fn listing_names_all_operations() {
        let listing = listing();
        assert_eq!(listing["version"], json!(1));
        assert_eq!(listing["operations"].as_array().unwrap().len(), 5);
        assert_eq!(
            listing["operations"][4]["parameters"][0]["name"],
            json!("network")
        );
    }
}
