//! Neo4j backend for composegraph.
//!
//! `Neo4jHttpStore` implements `GraphStore` on top of the Neo4j HTTP
//! transactional API: every statement is sent as its own auto-commit
//! transaction to `POST /db/<database>/tx/commit`, with Cypher text and a
//! separate parameter map. No Cypher driver or Bolt client is needed.

pub mod http;
pub mod protocol;

pub use http::Neo4jHttpStore;
pub use protocol::{CommitRequest, CommitResponse, ServerError, StatementResult};
