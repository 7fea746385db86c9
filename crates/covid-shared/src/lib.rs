//! Shared types for the COVID-19 statistics fulfillment webhook.
//!
//! Wire types for the conversational agent's webhook format, the error
//! taxonomy, the dataset table selector and country name normalization.

pub mod country;
pub mod error;
pub mod format;
pub mod table;
pub mod webhook;

pub use country::{normalize_country, COUNTRY_ALIASES};
pub use error::FulfillmentError;
pub use format::{death_rate, number_with_commas, result_location};
pub use table::StatsTable;
pub use webhook::{Intent, QueryResult, TextMessage, WebhookRequest, WebhookResponse};
