//! covidd library - exposes modules for testing.

pub mod agent;
pub mod bigquery;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod query;
pub mod routes;
pub mod server;

pub use agent::{IntentOutcome, WebhookAgent};
pub use client::{DatasetClient, FakeDatasetClient, FakeQueryResponse, QueryRequest, Row};
