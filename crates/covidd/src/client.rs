//! Dataset client abstraction.
//!
//! The query helper talks to the remote dataset through `DatasetClient` so it
//! can run against BigQuery in production and against `FakeDatasetClient` in
//! tests, without any network access.

use async_trait::async_trait;
use covid_shared::{FulfillmentError, StatsTable};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Query types
// ============================================================================

/// Named `STRING` query parameter, bound by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    pub name: String,
    pub value: String,
}

/// A fully built query, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: StatsTable,
    pub sql: String,
    pub parameters: Vec<QueryParameter>,
    pub location: String,
    pub timeout_ms: u64,
}

impl QueryRequest {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// One result row, columns kept in the order the dataset returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Name of the last column
    pub fn last_column(&self) -> Option<&str> {
        self.columns.last().map(|(name, _)| name.as_str())
    }

    /// Value of the last column, looked up by its name
    pub fn last_value(&self) -> Option<&Value> {
        self.last_column().and_then(|name| self.get(name))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// Client trait
// ============================================================================

#[async_trait]
pub trait DatasetClient: Send + Sync {
    /// Execute a query and return every row in the order the backend produced
    /// them. Timeouts and backend failures are errors; no retry is attempted.
    async fn run_query(&self, request: &QueryRequest) -> Result<Vec<Row>, FulfillmentError>;
}

// ============================================================================
// Fake Dataset Client (Testing)
// ============================================================================

/// Pre-configured response for one table
#[derive(Debug, Clone)]
pub enum FakeQueryResponse {
    Rows(Vec<Row>),
    Timeout,
    Backend(String),
}

impl FakeQueryResponse {
    /// Rows shaped like the JHU tables: location columns first, one
    /// cumulative column per date, most recent date last.
    pub fn counts(country: &str, latest: &[i64]) -> Self {
        let rows = latest
            .iter()
            .map(|total| {
                Row::new(vec![
                    ("province_state".to_string(), Value::Null),
                    ("country_region".to_string(), Value::String(country.to_string())),
                    ("latitude".to_string(), Value::String("0.0".to_string())),
                    ("longitude".to_string(), Value::String("0.0".to_string())),
                    ("location_geom".to_string(), Value::Null),
                    ("_3_21_20".to_string(), Value::String((total / 2).to_string())),
                    ("_3_22_20".to_string(), Value::String(total.to_string())),
                ])
            })
            .collect();
        FakeQueryResponse::Rows(rows)
    }

    /// Single row with the given latest count
    pub fn count(total: i64) -> Self {
        Self::counts("Test", &[total])
    }

    pub fn empty() -> Self {
        FakeQueryResponse::Rows(Vec::new())
    }
}

/// Fake dataset client for deterministic testing
///
/// Answers per table and records every query it receives.
///
/// ## Example
///
/// ```rust,ignore
/// let fake = FakeDatasetClient::new()
///     .with_response(StatsTable::Deaths, FakeQueryResponse::count(100))
///     .with_response(StatsTable::ConfirmedCases, FakeQueryResponse::count(1000));
/// ```
pub struct FakeDatasetClient {
    responses: HashMap<StatsTable, FakeQueryResponse>,
    requests: Arc<Mutex<Vec<QueryRequest>>>,
}

impl FakeDatasetClient {
    /// A client where every table is empty
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(mut self, table: StatsTable, response: FakeQueryResponse) -> Self {
        self.responses.insert(table, response);
        self
    }

    /// Every query received so far, in order
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for FakeDatasetClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetClient for FakeDatasetClient {
    async fn run_query(&self, request: &QueryRequest) -> Result<Vec<Row>, FulfillmentError> {
        self.requests.lock().unwrap().push(request.clone());

        match self.responses.get(&request.table) {
            None => Ok(Vec::new()),
            Some(FakeQueryResponse::Rows(rows)) => Ok(rows.clone()),
            Some(FakeQueryResponse::Timeout) => Err(FulfillmentError::Timeout(request.timeout_ms)),
            Some(FakeQueryResponse::Backend(msg)) => Err(FulfillmentError::Backend(msg.clone())),
        }
    }
}
