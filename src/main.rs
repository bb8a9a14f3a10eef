mod assistant;
mod config;
mod duffel;
mod error;
mod flights;
mod metrics;
mod otel;
mod render;
mod server;
#[cfg(test)]
mod test_support;
mod tools;

use assistant::FlightAssistant;
use config::Config;
use dotenv::dotenv;
use duffel::DuffelClient;
use server::AppState;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    // OTEL graceful shutdown on success or error exit
    let _otel_guard = otel::init_otel()?;

    let config = Config::from_env()?;
    info!(
        model = %config.model,
        duffel = %config.duffel_base_url,
        "Starting flight booking assistant"
    );

    let duffel = DuffelClient::new(&config.duffel_base_url, &config.duffel_api_key)?;
    let state = Arc::new(AppState {
        assistant: FlightAssistant::new(&config, duffel),
        auth_token: config.auth_token.clone(),
    });

    server::serve(&config.bind_addr, state).await
}
