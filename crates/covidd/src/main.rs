//! covidd - COVID-19 statistics fulfillment webhook
//!
//! Answers conversational agent intents with figures from the JHU CSSE
//! dataset on BigQuery.

use anyhow::{bail, Context, Result};
use clap::Parser;
use covidd::bigquery::BigQueryClient;
use covidd::config::{Config, CONFIG_PATH};
use covidd::server::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "covidd", version, about = "COVID-19 statistics fulfillment webhook")]
struct Args {
    /// Config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Listen address, overrides the config file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("covidd v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(&args.config);
    config.apply_env();
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    if config.bigquery.project_id.is_empty() {
        bail!("No BigQuery project configured (set bigquery.project_id or GOOGLE_CLOUD_PROJECT)");
    }
    info!("Billing queries to project {}", config.bigquery.project_id);

    let client = BigQueryClient::new(config.bigquery.clone())
        .context("Failed to create BigQuery client")?;
    let state = AppState::new(Arc::new(client));

    server::run(state, &config.server).await
}
