use crate::graph::GraphSnapshot;
use crate::model::{ExecSummary, ReadQuery, Row, Statement};
use crate::{GraphSession, GraphStore, StoreError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// A graph persisted as one JSON snapshot file.
///
/// A session loads the snapshot when it opens and writes it back atomically
/// when it closes, if any statement ran. Only [`GraphSession::close`]
/// reports a failed write; a dropped session logs it. Sessions opened through one store
/// are serialized; separate processes writing the same file are last-writer-wins.
#[derive(Debug)]
pub struct FileGraphStore {
    path: PathBuf,
    gate: Mutex<()>,
}

impl FileGraphStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot from disk. A missing file is an empty graph.
    pub fn load(&self) -> Result<GraphSnapshot, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GraphSnapshot::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, graph: &GraphSnapshot) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(graph)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl GraphStore for FileGraphStore {
    fn name(&self) -> &str {
        "file"
    }

    fn open_session(&self) -> Result<Box<dyn GraphSession + '_>, StoreError> {
        let guard = self.gate.lock().map_err(|_| StoreError::Poisoned)?;
        let graph = self.load()?;
        Ok(Box::new(FileSession {
            store: self,
            graph,
            dirty: false,
            _guard: guard,
        }))
    }
}

struct FileSession<'a> {
    store: &'a FileGraphStore,
    graph: GraphSnapshot,
    dirty: bool,
    _guard: std::sync::MutexGuard<'a, ()>,
}

impl GraphSession for FileSession<'_> {
    fn run(&mut self, statement: &Statement) -> Result<ExecSummary, StoreError> {
        let summary = self.graph.apply(statement)?;
        self.dirty = true;
        Ok(summary)
    }

    fn query(&mut self, query: &ReadQuery) -> Result<Vec<Row>, StoreError> {
        Ok(self.graph.query(query))
    }

    fn close(mut self: Box<Self>) -> Result<(), StoreError> {
        self.persist()
    }
}

impl FileSession<'_> {
    fn persist(&mut self) -> Result<(), StoreError> {
        if !std::mem::take(&mut self.dirty) {
            return Ok(());
        }
        self.store.save(&self.graph)
    }
}

impl Drop for FileSession<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.persist() {
            tracing::warn!(
                "failed to persist graph snapshot to {}: {e}",
                self.store.path.display()
            );
        }
    }
}
