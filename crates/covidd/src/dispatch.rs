//! Request dispatcher: routes a webhook event to its intent handler.

use crate::agent::WebhookAgent;
use crate::client::DatasetClient;
use crate::handlers;
use covid_shared::{WebhookRequest, WebhookResponse};
use tracing::{debug, warn};

/// Intents this service fulfills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentRoute {
    ConfirmedCases,
    Death,
}

/// Intent display name -> handler
pub const INTENT_ROUTES: &[(&str, IntentRoute)] = &[
    ("coronavirus.confirmed_cases", IntentRoute::ConfirmedCases),
    ("coronavirus.death", IntentRoute::Death),
];

/// Look up the handler for an intent display name (exact match)
pub fn route(intent: &str) -> Option<IntentRoute> {
    INTENT_ROUTES
        .iter()
        .find(|(name, _)| *name == intent)
        .map(|(_, route)| *route)
}

/// Handle one webhook event end to end.
///
/// Handler failures are already turned into apologies, so this never fails.
/// An intent without a handler yields an empty response, leaving the reply to
/// the agent's own configuration.
pub async fn dispatch(request: WebhookRequest, client: &dyn DatasetClient) -> WebhookResponse {
    let mut agent = WebhookAgent::new(request);
    debug!(
        "Intent {} (session {}) with {} configured fulfillment messages",
        agent.intent(),
        agent.session().unwrap_or("-"),
        agent.console_messages().len()
    );

    let Some(intent_route) = route(agent.intent()) else {
        warn!("No handler for requested intent '{}'", agent.intent());
        return WebhookResponse::default();
    };

    let outcome = match intent_route {
        IntentRoute::ConfirmedCases => handlers::confirmed_cases(&agent, client).await,
        IntentRoute::Death => handlers::death(&agent, client).await,
    };
    outcome.apply(&mut agent);

    agent.into_response()
}
