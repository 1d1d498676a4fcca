//! Graph storage for composegraph.
//!
//! This crate defines the graph vocabulary (`NodeLabel`, `Relation`), the
//! parameterized `Statement`s and `ReadQuery`s every backend executes, and the
//! `GraphStore`/`GraphSession` traits backends implement. Two backends live
//! here: `MemoryGraphStore` for a process-local graph and `FileGraphStore`
//! for a JSON snapshot on disk. Both evaluate statements through
//! `GraphSnapshot`, which mirrors the semantics of the Cypher each statement
//! renders to.

pub mod config;
pub mod file;
pub mod graph;
pub mod memory;
pub mod model;

pub use config::{Endpoint, StoreConfig};
pub use file::FileGraphStore;
pub use graph::{Edge, GraphSnapshot, Node};
pub use memory::MemoryGraphStore;
pub use model::{ExecSummary, NodeLabel, ReadQuery, Relation, Row, Statement};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("graph store at {endpoint} is unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("statement rejected: {0}")]
    Rejected(String),
    #[error("unexpected response from graph store: {0}")]
    Protocol(String),
    #[error("unsupported store endpoint: {0}")]
    UnsupportedEndpoint(String),
    #[error("graph store lock poisoned")]
    Poisoned,
}

/// A graph database that hands out sessions.
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Open a session. Remote backends verify connectivity here.
    fn open_session(&self) -> Result<Box<dyn GraphSession + '_>, StoreError>;
}

/// A unit of interaction with a store.
///
/// Writers call [`GraphSession::close`] so a failed commit surfaces as an
/// error. Dropping an unclosed session still commits, but can only log a
/// failure.
pub trait GraphSession {
    fn run(&mut self, statement: &Statement) -> Result<ExecSummary, StoreError>;

    fn query(&mut self, query: &ReadQuery) -> Result<Vec<Row>, StoreError>;

    /// Commit pending writes and release the session. Backends where every
    /// `run` commits on its own have nothing left to do.
    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_unreachable() {
        let e = StoreError::Unreachable {
            endpoint: "http://db:7474".to_owned(),
            reason: "connection refused".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("http://db:7474"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn store_error_display_rejected() {
        let e = StoreError::Rejected("Neo.ClientError.Statement.SyntaxError".to_owned());
        assert!(e.to_string().contains("SyntaxError"));
    }

    #[test]
    fn store_error_display_unsupported_endpoint() {
        let e = StoreError::UnsupportedEndpoint("bolt://x".to_owned());
        assert!(e.to_string().contains("bolt://x"));
    }

    #[test]
    fn stores_are_usable_as_trait_objects() {
        let stores: Vec<Box<dyn GraphStore>> = vec![
            Box::new(MemoryGraphStore::new()),
            Box::new(FileGraphStore::new("unused.json")),
        ];
        let names: Vec<&str> = stores.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["memory", "file"]);
    }
}
