//! Dataset query helper.
//!
//! Builds the parameterized query for one of the three JHU CSSE tables and
//! reduces the result to the latest cumulative count.

use crate::client::{DatasetClient, QueryParameter, QueryRequest, Row};
use covid_shared::{normalize_country, FulfillmentError, StatsTable};
use serde_json::Value;
use tracing::debug;

/// Public dataset holding the JHU CSSE time series
pub const DATASET: &str = "bigquery-public-data.covid19_jhu_csse";

/// Execution location of the dataset
pub const QUERY_LOCATION: &str = "US";

/// Per-query timeout
pub const QUERY_TIMEOUT_MS: u64 = 5_000;

/// Name of the bound country parameter
pub const COUNTRY_PARAM: &str = "country";

/// Build the query for `table`, filtered on `country` when one is given.
///
/// The country is normalized and bound as a parameter, never spliced into the
/// SQL text.
pub fn build_query(table: StatsTable, country: Option<&str>) -> QueryRequest {
    let mut sql = format!("SELECT *\nFROM `{}.{}`", DATASET, table.as_str());
    let mut parameters = Vec::new();

    if let Some(country) = country.filter(|c| !c.is_empty()) {
        sql.push_str("\nWHERE country_region = @country");
        parameters.push(QueryParameter {
            name: COUNTRY_PARAM.to_string(),
            value: normalize_country(country).to_string(),
        });
    }

    QueryRequest {
        table,
        sql,
        parameters,
        location: QUERY_LOCATION.to_string(),
        timeout_ms: QUERY_TIMEOUT_MS,
    }
}

/// Latest cumulative count for `table_name`, optionally for one country.
///
/// `Ok(None)` means the dataset had no rows. An unknown table name is rejected
/// before anything is sent to the backend.
pub async fn query_covid19_dataset(
    client: &dyn DatasetClient,
    table_name: &str,
    country: Option<&str>,
) -> Result<Option<i64>, FulfillmentError> {
    let table: StatsTable = table_name.parse()?;
    let request = build_query(table, country);
    debug!(
        "Querying {} (country={:?})",
        table,
        request.parameter(COUNTRY_PARAM)
    );

    let rows = client.run_query(&request).await?;
    debug!("{} returned {} rows", table, rows.len());
    latest_cumulative(&rows)
}

/// Last column of the last row, as an integer count.
///
/// The JHU tables keep one cumulative column per date with the most recent
/// date last, and the backend returns rows in table order; this depends on
/// both. A NULL cell counts as no data.
pub fn latest_cumulative(rows: &[Row]) -> Result<Option<i64>, FulfillmentError> {
    let Some(last_row) = rows.last() else {
        return Ok(None);
    };

    match last_row.last_value() {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_count(value).map(Some),
    }
}

/// INT64 arrives as a JSON string; plain numbers are accepted too. Values
/// with a fractional part are not counts.
fn parse_count(value: &Value) -> Result<i64, FulfillmentError> {
    let parsed = match value {
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().and_then(integral)),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        _ => None,
    };
    parsed.ok_or_else(|| FulfillmentError::Malformed(format!("non-integer count {}", value)))
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}
