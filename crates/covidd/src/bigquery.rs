//! BigQuery REST client.
//!
//! Runs parameterized standard-SQL queries through the `jobs.query` endpoint
//! and follows `getQueryResults` pages until the whole result set is read.

use crate::client::{DatasetClient, QueryRequest, Row};
use crate::config::BigQueryConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use covid_shared::FulfillmentError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Extra time the HTTP call gets on top of the query's own timeout
const HTTP_MARGIN_MS: u64 = 2_000;

/// BigQuery client authenticated with a bearer token
pub struct BigQueryClient {
    config: BigQueryConfig,
    http: reqwest::Client,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
    #[serde(default)]
    job_reference: Option<JobReference>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<TableField>,
}

#[derive(Debug, Deserialize)]
struct TableField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

// ============================================================================
// Client
// ============================================================================

impl BigQueryClient {
    pub fn new(config: BigQueryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("covidd/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { config, http })
    }

    fn query_url(&self) -> String {
        format!(
            "{}/projects/{}/queries",
            self.config.api_base.trim_end_matches('/'),
            self.config.project_id
        )
    }

    fn results_url(&self, job: &JobReference) -> String {
        format!(
            "{}/projects/{}/queries/{}",
            self.config.api_base.trim_end_matches('/'),
            job.project_id,
            job.job_id
        )
    }

    /// Configured token, or one minted by the metadata server
    async fn access_token(&self) -> Result<String, FulfillmentError> {
        if !self.config.access_token.is_empty() {
            return Ok(self.config.access_token.clone());
        }

        let url = format!(
            "{}/instance/service-accounts/default/token",
            self.config.metadata_base.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_millis(HTTP_MARGIN_MS))
            .send()
            .await
            .map_err(|e| FulfillmentError::Auth(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(FulfillmentError::Auth(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| FulfillmentError::Auth(format!("bad token response: {}", e)))?;
        Ok(token.access_token)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        timeout_ms: u64,
    ) -> Result<QueryResponse, FulfillmentError> {
        let token = self.access_token().await?;
        let response = builder
            .bearer_auth(token)
            .timeout(Duration::from_millis(timeout_ms + HTTP_MARGIN_MS))
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout_ms))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, timeout_ms))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: QueryResponse = serde_json::from_str(&body)?;
        if !parsed.job_complete {
            return Err(FulfillmentError::Timeout(timeout_ms));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl DatasetClient for BigQueryClient {
    async fn run_query(&self, request: &QueryRequest) -> Result<Vec<Row>, FulfillmentError> {
        debug!("BigQuery query on {}: {}", request.table, request.sql);

        let first = self
            .send(
                self.http.post(self.query_url()).json(&query_body(request)),
                request.timeout_ms,
            )
            .await?;

        let columns = column_names(&first)?;
        let mut rows = to_rows(&columns, first.rows)?;
        let mut page_token = first.page_token;
        let job = first.job_reference;
        let timeout = request.timeout_ms.to_string();

        while let Some(token) = page_token.take() {
            let job = job.as_ref().ok_or_else(|| {
                FulfillmentError::Malformed("paged result without job reference".to_string())
            })?;
            let location = job.location.as_deref().unwrap_or(&request.location);
            let page = self
                .send(
                    self.http.get(self.results_url(job)).query(&[
                        ("pageToken", token.as_str()),
                        ("location", location),
                        ("timeoutMs", timeout.as_str()),
                    ]),
                    request.timeout_ms,
                )
                .await?;
            debug!("Fetched result page with {} rows", page.rows.len());
            rows.extend(to_rows(&columns, page.rows)?);
            page_token = page.page_token;
        }

        Ok(rows)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `jobs.query` request body
fn query_body(request: &QueryRequest) -> Value {
    let parameters: Vec<Value> = request
        .parameters
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "parameterType": { "type": "STRING" },
                "parameterValue": { "value": p.value },
            })
        })
        .collect();

    json!({
        "query": request.sql,
        "useLegacySql": false,
        "parameterMode": "NAMED",
        "queryParameters": parameters,
        "location": request.location,
        "timeoutMs": request.timeout_ms,
    })
}

fn column_names(response: &QueryResponse) -> Result<Vec<String>, FulfillmentError> {
    match &response.schema {
        Some(schema) => Ok(schema.fields.iter().map(|f| f.name.clone()).collect()),
        None if response.rows.is_empty() => Ok(Vec::new()),
        None => Err(FulfillmentError::Malformed(
            "rows returned without a schema".to_string(),
        )),
    }
}

fn to_rows(columns: &[String], rows: Vec<TableRow>) -> Result<Vec<Row>, FulfillmentError> {
    rows.into_iter()
        .map(|row| {
            if row.f.len() != columns.len() {
                return Err(FulfillmentError::Malformed(format!(
                    "row has {} cells, schema has {} fields",
                    row.f.len(),
                    columns.len()
                )));
            }
            Ok(Row::new(
                columns.iter().cloned().zip(row.f.into_iter().map(|c| c.v)).collect(),
            ))
        })
        .collect()
}

fn api_error(status: u16, body: &str) -> FulfillmentError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    FulfillmentError::Backend(format!("HTTP {}: {}", status, message))
}

fn map_transport_error(e: reqwest::Error, timeout_ms: u64) -> FulfillmentError {
    if e.is_timeout() {
        FulfillmentError::Timeout(timeout_ms)
    } else {
        FulfillmentError::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QueryParameter;
    use covid_shared::StatsTable;

    fn sample_request() -> QueryRequest {
        QueryRequest {
            table: StatsTable::Deaths,
            sql: "SELECT * FROM t WHERE country_region = @country".to_string(),
            parameters: vec![QueryParameter {
                name: "country".to_string(),
                value: "Korea, South".to_string(),
            }],
            location: "US".to_string(),
            timeout_ms: 5000,
        }
    }

    #[test]
    fn test_query_body_binds_parameters() {
        let body = query_body(&sample_request());
        assert_eq!(body["useLegacySql"], json!(false));
        assert_eq!(body["parameterMode"], json!("NAMED"));
        assert_eq!(body["location"], json!("US"));
        assert_eq!(body["timeoutMs"], json!(5000));
        assert_eq!(
            body["queryParameters"][0],
            json!({
                "name": "country",
                "parameterType": { "type": "STRING" },
                "parameterValue": { "value": "Korea, South" }
            })
        );
        assert!(!body["query"].as_str().unwrap().contains("Korea"));
    }

    #[test]
    fn test_parse_query_response() {
        let body = json!({
            "kind": "bigquery#queryResponse",
            "schema": { "fields": [
                { "name": "country_region", "type": "STRING" },
                { "name": "_3_22_20", "type": "INTEGER" }
            ]},
            "jobReference": { "projectId": "p", "jobId": "job_1", "location": "US" },
            "totalRows": "2",
            "rows": [
                { "f": [{ "v": "Italy" }, { "v": "59138" }] },
                { "f": [{ "v": "Spain" }, { "v": "28603" }] }
            ],
            "jobComplete": true
        });
        let response: QueryResponse = serde_json::from_value(body).unwrap();
        let columns = column_names(&response).unwrap();
        let rows = to_rows(&columns, response.rows).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("country_region"), Some(&json!("Spain")));
        assert_eq!(rows[1].last_value(), Some(&json!("28603")));
    }

    #[test]
    fn test_empty_result_has_no_rows() {
        let body = json!({
            "schema": { "fields": [{ "name": "country_region" }] },
            "totalRows": "0",
            "jobComplete": true
        });
        let response: QueryResponse = serde_json::from_value(body).unwrap();
        let columns = column_names(&response).unwrap();
        assert!(to_rows(&columns, response.rows).unwrap().is_empty());
    }

    #[test]
    fn test_incomplete_job_is_detected() {
        let response: QueryResponse =
            serde_json::from_value(json!({ "jobComplete": false })).unwrap();
        assert!(!response.job_complete);
    }

    #[test]
    fn test_mismatched_row_is_malformed() {
        let rows = vec![TableRow {
            f: vec![TableCell { v: json!("x") }],
        }];
        let err = to_rows(&["a".to_string(), "b".to_string()], rows).unwrap_err();
        assert_eq!(err.code(), "malformed");
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":400,"message":"Unrecognized name: foo","status":"INVALID_ARGUMENT"}}"#;
        let err = api_error(400, body);
        assert_eq!(
            err.to_string(),
            "Dataset backend error: HTTP 400: Unrecognized name: foo"
        );

        let err = api_error(502, "Bad Gateway");
        assert_eq!(err.to_string(), "Dataset backend error: HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_urls() {
        let client = BigQueryClient::new(BigQueryConfig {
            project_id: "proj".to_string(),
            api_base: "https://bq.example/v2/".to_string(),
            ..BigQueryConfig::default()
        })
        .unwrap();
        assert_eq!(client.query_url(), "https://bq.example/v2/projects/proj/queries");
        let job = JobReference {
            project_id: "proj".to_string(),
            job_id: "job_9".to_string(),
            location: None,
        };
        assert_eq!(
            client.results_url(&job),
            "https://bq.example/v2/projects/proj/queries/job_9"
        );
    }

    // ========================================================================
    // Against a local stub of the REST API
    // ========================================================================

    use crate::query::build_query;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn stub_client(base: &str, access_token: &str) -> BigQueryClient {
        BigQueryClient::new(BigQueryConfig {
            project_id: "proj".to_string(),
            api_base: base.to_string(),
            metadata_base: base.to_string(),
            access_token: access_token.to_string(),
        })
        .unwrap()
    }

    fn bearer(headers: &HeaderMap) -> Option<&str> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    fn counts(rows: &[Row]) -> Vec<Value> {
        rows.iter().filter_map(|r| r.last_value().cloned()).collect()
    }

    /// First page answers `jobs.query`, second page answers `getQueryResults`
    fn paged_router(token: &'static str) -> Router {
        Router::new()
            .route(
                "/projects/:project/queries",
                post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                    if bearer(&headers) != Some(token) {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    if body["queryParameters"][0]["parameterValue"]["value"] != json!("Italy") {
                        return StatusCode::BAD_REQUEST.into_response();
                    }
                    Json(json!({
                        "jobComplete": true,
                        "jobReference": { "projectId": "proj", "jobId": "job_1", "location": "US" },
                        "schema": { "fields": [{ "name": "country_region" }, { "name": "_3_22_20" }] },
                        "rows": [
                            { "f": [{ "v": "Italy" }, { "v": "10" }] },
                            { "f": [{ "v": "Italy" }, { "v": "20" }] }
                        ],
                        "pageToken": "page-2"
                    }))
                    .into_response()
                }),
            )
            .route(
                "/projects/:project/queries/:job",
                get(
                    move |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                        if bearer(&headers) != Some(token) {
                            return StatusCode::UNAUTHORIZED.into_response();
                        }
                        if params.get("pageToken").map(String::as_str) != Some("page-2")
                            || params.get("location").map(String::as_str) != Some("US")
                        {
                            return StatusCode::BAD_REQUEST.into_response();
                        }
                        Json(json!({
                            "jobComplete": true,
                            "schema": { "fields": [{ "name": "country_region" }, { "name": "_3_22_20" }] },
                            "rows": [{ "f": [{ "v": "Italy" }, { "v": "30" }] }]
                        }))
                        .into_response()
                    },
                ),
            )
    }

    #[tokio::test]
    async fn test_run_query_follows_pages_in_order() {
        let base = spawn_stub(paged_router("test-token")).await;
        let client = stub_client(&base, "test-token");

        let rows = client
            .run_query(&build_query(StatsTable::ConfirmedCases, Some("Italy")))
            .await
            .unwrap();

        assert_eq!(counts(&rows), vec![json!("10"), json!("20"), json!("30")]);
    }

    #[tokio::test]
    async fn test_run_query_fetches_token_from_metadata_server() {
        let router = paged_router("meta-token").route(
            "/instance/service-accounts/default/token",
            get(|headers: HeaderMap| async move {
                if headers.get("metadata-flavor").and_then(|v| v.to_str().ok()) != Some("Google") {
                    return StatusCode::FORBIDDEN.into_response();
                }
                Json(json!({
                    "access_token": "meta-token",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }))
                .into_response()
            }),
        );
        let base = spawn_stub(router).await;
        let client = stub_client(&base, "");

        let rows = client
            .run_query(&build_query(StatsTable::ConfirmedCases, Some("Italy")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_run_query_metadata_failure_is_auth_error() {
        // No token route: the stub answers 404
        let base = spawn_stub(paged_router("meta-token")).await;
        let client = stub_client(&base, "");

        let err = client
            .run_query(&build_query(StatsTable::Deaths, None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "auth");
    }

    #[tokio::test]
    async fn test_run_query_incomplete_job_is_timeout() {
        let router = Router::new().route(
            "/projects/:project/queries",
            post(|| async {
                Json(json!({
                    "jobComplete": false,
                    "jobReference": { "projectId": "proj", "jobId": "job_2", "location": "US" }
                }))
            }),
        );
        let base = spawn_stub(router).await;
        let client = stub_client(&base, "test-token");

        let err = client
            .run_query(&build_query(StatsTable::Deaths, Some("Italy")))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Timeout(5000)));
    }

    #[tokio::test]
    async fn test_run_query_http_error_is_backend() {
        let router = Router::new().route(
            "/projects/:project/queries",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": {
                            "code": 400,
                            "message": "Unrecognized name: country_region",
                            "status": "INVALID_ARGUMENT"
                        }
                    })),
                )
            }),
        );
        let base = spawn_stub(router).await;
        let client = stub_client(&base, "test-token");

        let err = client
            .run_query(&build_query(StatsTable::RecoveredCases, None))
            .await
            .unwrap_err();
        assert!(
            matches!(err, FulfillmentError::Backend(ref msg) if msg == "HTTP 400: Unrecognized name: country_region"),
            "{:?}",
            err
        );
    }
}
