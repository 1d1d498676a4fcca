use composegraph_store::{ExecSummary, Row, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a `tx/commit` request.
#[derive(Debug, Serialize)]
pub struct CommitRequest<'a> {
    pub statements: Vec<StatementRequest<'a>>,
}

#[derive(Debug, Serialize)]
pub struct StatementRequest<'a> {
    pub statement: &'a str,
    pub parameters: &'a Map<String, Value>,
    #[serde(rename = "includeStats")]
    pub include_stats: bool,
}

impl<'a> CommitRequest<'a> {
    pub fn single(statement: &'a str, parameters: &'a Map<String, Value>) -> Self {
        Self {
            statements: vec![StatementRequest {
                statement,
                parameters,
                include_stats: true,
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub errors: Vec<ServerError>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<DataRow>,
    #[serde(default)]
    pub stats: Option<Stats>,
}

#[derive(Debug, Deserialize)]
pub struct DataRow {
    pub row: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub nodes_created: u64,
    #[serde(default)]
    pub relationships_created: u64,
    #[serde(default)]
    pub relationships_deleted: u64,
}

impl CommitResponse {
    pub fn parse(body: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(body)
            .map_err(|e| StoreError::Protocol(format!("malformed commit response: {e}")))
    }

    /// The single statement result, or the server's errors as a rejection.
    pub fn into_result(self) -> Result<StatementResult, StoreError> {
        if !self.errors.is_empty() {
            let joined = self
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StoreError::Rejected(joined));
        }
        self.results
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Protocol("commit response has no results".to_owned()))
    }
}

impl StatementResult {
    pub fn summary(&self) -> ExecSummary {
        self.stats.as_ref().map_or_else(ExecSummary::default, |s| ExecSummary {
            nodes_created: s.nodes_created,
            relationships_created: s.relationships_created,
            relationships_deleted: s.relationships_deleted,
        })
    }

    /// Pair each row's values with the column names.
    pub fn into_rows(self) -> Result<Vec<Row>, StoreError> {
        let columns = self.columns;
        self.data
            .into_iter()
            .map(|data| {
                if data.row.len() != columns.len() {
                    return Err(StoreError::Protocol(format!(
                        "row has {} values for {} columns",
                        data.row.len(),
                        columns.len()
                    )));
                }
                Ok(columns.iter().cloned().zip(data.row).collect())
            })
            .collect()
    }
}
