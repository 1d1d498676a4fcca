use crate::graph::GraphSnapshot;
use crate::model::{ExecSummary, ReadQuery, Row, Statement};
use crate::{GraphSession, GraphStore, StoreError};
use std::sync::RwLock;

/// A process-local graph. Every session shares the same snapshot; statements
/// take the write lock one at a time, so concurrent sessions interleave at
/// statement granularity just as they would against a server.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graph: RwLock<GraphSnapshot>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            graph: RwLock::new(snapshot),
        }
    }

    /// A copy of the current graph contents.
    pub fn snapshot(&self) -> Result<GraphSnapshot, StoreError> {
        let graph = self.graph.read().map_err(|_| StoreError::Poisoned)?;
        Ok(graph.clone())
    }
}

impl GraphStore for MemoryGraphStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn open_session(&self) -> Result<Box<dyn GraphSession + '_>, StoreError> {
        Ok(Box::new(MemorySession { store: self }))
    }
}

struct MemorySession<'a> {
    store: &'a MemoryGraphStore,
}

impl GraphSession for MemorySession<'_> {
    fn run(&mut self, statement: &Statement) -> Result<ExecSummary, StoreError> {
        let mut graph = self.store.graph.write().map_err(|_| StoreError::Poisoned)?;
        graph.apply(statement)
    }

    fn query(&mut self, query: &ReadQuery) -> Result<Vec<Row>, StoreError> {
        let graph = self.store.graph.read().map_err(|_| StoreError::Poisoned)?;
        Ok(graph.query(query))
    }
}
