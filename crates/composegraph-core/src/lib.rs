//! Core of composegraph: compiling manifests into a graph and querying it.
//!
//! `GraphBuilder` turns normalized manifests into parameterized statements,
//! `Compiler` discovers manifests and executes those statements unit by unit
//! against a `GraphStore`, and `QueryService` runs the read-only traversals
//! exposed to callers through the versioned operation `catalog`. `Config`
//! carries every setting explicitly; nothing here reads the environment.

pub mod builder;
pub mod catalog;
pub mod compiler;
pub mod concurrency;
pub mod config;
pub mod query;

pub use builder::GraphBuilder;
pub use catalog::{dispatch, CatalogError, Operation, OperationResponse, CATALOG_VERSION};
pub use compiler::{CompileReport, Compiler, ManifestOutcome, ManifestReport, Unit, UnitReport};
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use config::{Config, ConfigError};
pub use query::{
    DependencyReport, EnvVar, ImageInfo, PortConflict, PortInfo, QueryService, ServiceDetail,
    ServiceRef, VolumeInfo,
};

use composegraph_remote::Neo4jHttpStore;
use composegraph_store::{
    Endpoint, FileGraphStore, GraphStore, MemoryGraphStore, StoreConfig, StoreError,
};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] composegraph_schema::ManifestError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("cannot read manifest directory {dir}: {source}")]
    Discovery {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed query result: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Open the store an endpoint names.
pub fn connect(config: &StoreConfig) -> Result<Box<dyn GraphStore>, StoreError> {
    let store: Box<dyn GraphStore> = match config.endpoint()? {
        Endpoint::Memory => Box::new(MemoryGraphStore::new()),
        Endpoint::File(path) => Box::new(FileGraphStore::new(path)),
        Endpoint::Http(_) => Box::new(Neo4jHttpStore::new(config)),
    };
    tracing::debug!("using {} store at {}", store.name(), config.endpoint);
    Ok(store)
}
