//! Intent handlers: confirmed cases and deaths.
//!
//! Both resolve a display location, query the dataset and word the result.
//! Every failure ends in an apology for the user; nothing propagates.

use crate::agent::{IntentOutcome, WebhookAgent};
use crate::client::DatasetClient;
use crate::query::query_covid19_dataset;
use covid_shared::{death_rate, number_with_commas, result_location, FulfillmentError};
use serde_json::Value;
use tracing::info;

/// Parameter carrying the country the user asked about
pub const GEO_COUNTRY: &str = "geo-country";

/// Confirmed cases below this are "safe to travel", above it "unsafe"
pub const TRAVEL_ADVISORY_THRESHOLD: i64 = 5_000;

/// `coronavirus.confirmed_cases`
pub async fn confirmed_cases(agent: &WebhookAgent, client: &dyn DatasetClient) -> IntentOutcome {
    let params = Value::Object(agent.parameters().clone());
    info!("confirmedCases: parameters = {}", params);

    let country = agent.parameter(GEO_COUNTRY);
    let location = result_location(country);

    let total = query_covid19_dataset(client, "confirmed_cases", country)
        .await
        .and_then(|total| {
            total.ok_or_else(|| FulfillmentError::NoData(format!("confirmed cases {}", location)))
        });

    match total {
        Ok(total) => match travel_advisory(total, &location) {
            Some(message) => IntentOutcome::Reply(message),
            None => IntentOutcome::Silent,
        },
        Err(e) => IntentOutcome::apology(
            format!(
                "I'm sorry, I can't find statistics for confirmed cases {}",
                location
            ),
            e,
        ),
    }
}

/// Travel advisory for a confirmed-case count.
///
/// Exactly at the threshold neither advisory applies and `None` is returned.
pub fn travel_advisory(total: i64, location: &str) -> Option<String> {
    let verdict = if total < TRAVEL_ADVISORY_THRESHOLD {
        "safe"
    } else if total > TRAVEL_ADVISORY_THRESHOLD {
        "unsafe"
    } else {
        return None;
    };

    Some(format!(
        "There are approximately {} confirmed cases of coronavirus {}. Hence it is {} to travel",
        number_with_commas(total),
        location,
        verdict
    ))
}

/// `coronavirus.death`
pub async fn death(agent: &WebhookAgent, client: &dyn DatasetClient) -> IntentOutcome {
    let params = Value::Object(agent.parameters().clone());
    info!("death: parameters = {}", params);

    let country = agent.parameter(GEO_COUNTRY);
    let location = result_location(country);

    match death_message(client, country, &location).await {
        Ok(message) => IntentOutcome::Reply(message),
        Err(e) => IntentOutcome::apology(
            format!("I'm sorry, I can't find statistics for deaths {}", location),
            e,
        ),
    }
}

async fn death_message(
    client: &dyn DatasetClient,
    country: Option<&str>,
    location: &str,
) -> Result<String, FulfillmentError> {
    let total_deaths = query_covid19_dataset(client, "deaths", country)
        .await?
        .ok_or_else(|| FulfillmentError::NoData(format!("deaths {}", location)))?;

    let mut message = format!(
        "According to Johns Hopkins University, as of today, approximately {} people have died from coronavirus {}.",
        number_with_commas(total_deaths),
        location
    );

    // Missing or zero confirmed cases only drops the rate
    let total_confirmed = query_covid19_dataset(client, "confirmed_cases", country).await?;
    if let Some(confirmed) = total_confirmed.filter(|c| *c != 0) {
        message.push_str(&format!(
            " The death rate {} is {}%",
            location,
            death_rate(total_deaths, confirmed)
        ));
    }

    Ok(message)
}
