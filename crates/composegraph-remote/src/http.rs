use crate::protocol::{CommitRequest, CommitResponse, StatementResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use composegraph_store::{
    ExecSummary, GraphSession, GraphStore, ReadQuery, Row, Statement, StoreConfig, StoreError,
};
use serde_json::{Map, Value};
use std::io::Read;

/// Graph store backed by a Neo4j server's HTTP API.
///
/// - `GET  /`                     connectivity check when a session opens
/// - `POST /db/<db>/tx/commit`    one auto-commit transaction per statement
pub struct Neo4jHttpStore {
    url: String,
    database: String,
    authorization: Option<String>,
    agent: ureq::Agent,
}

impl Neo4jHttpStore {
    pub fn new(config: &StoreConfig) -> Self {
        let authorization = config.password.as_ref().map(|password| {
            let token = STANDARD.encode(format!("{}:{password}", config.user));
            format!("Basic {token}")
        });
        Self {
            url: config.endpoint.trim_end_matches('/').to_owned(),
            database: config.database.clone(),
            authorization,
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.url, self.database)
    }

    fn unreachable(&self, reason: impl ToString) -> StoreError {
        StoreError::Unreachable {
            endpoint: self.url.clone(),
            reason: reason.to_string(),
        }
    }

    fn ping(&self) -> Result<(), StoreError> {
        let url = format!("{}/", self.url);
        tracing::debug!("GET {url}");
        match self.agent.get(&url).header("Accept", "application/json").call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => {
                Err(self.unreachable(format!("HTTP {code} from {url}")))
            }
            Err(e) => Err(self.unreachable(e)),
        }
    }

    fn commit(&self, cypher: &str, parameters: &Map<String, Value>) -> Result<StatementResult, StoreError> {
        let url = self.commit_url();
        let body = serde_json::to_vec(&CommitRequest::single(cypher, parameters))?;
        tracing::debug!("POST {url} ({} bytes)", body.len());
        tracing::trace!("statement: {cypher}");

        let mut req = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(ref auth) = self.authorization {
            req = req.header("Authorization", auth);
        }
        let resp = match req.send(&body[..]) {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code @ (401 | 403))) => {
                return Err(StoreError::Rejected(format!(
                    "authentication failed (HTTP {code})"
                )));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(StoreError::Protocol(format!("HTTP {code} for {url}")));
            }
            Err(e) => return Err(self.unreachable(e)),
        };

        let mut reader = resp.into_body().into_reader();
        let mut payload = Vec::new();
        reader
            .read_to_end(&mut payload)
            .map_err(|e| self.unreachable(e))?;
        CommitResponse::parse(&payload)?.into_result()
    }
}

impl GraphStore for Neo4jHttpStore {
    fn name(&self) -> &str {
        "neo4j"
    }

    fn open_session(&self) -> Result<Box<dyn GraphSession + '_>, StoreError> {
        self.ping()?;
        Ok(Box::new(Neo4jSession { store: self }))
    }
}

struct Neo4jSession<'a> {
    store: &'a Neo4jHttpStore,
}

impl GraphSession for Neo4jSession<'_> {
    fn run(&mut self, statement: &Statement) -> Result<ExecSummary, StoreError> {
        let result = self
            .store
            .commit(&statement.cypher(), &statement.parameters())?;
        Ok(result.summary())
    }

    fn query(&mut self, query: &ReadQuery) -> Result<Vec<Row>, StoreError> {
        let result = self.store.commit(query.cypher(), &query.parameters())?;
        result.into_rows()
    }
}
