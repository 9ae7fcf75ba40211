//! mergecal server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::info;

use mergecal_core::{TracingConfig, init_tracing};
use mergecal_feed::{Aggregator, HttpFetcher, HttpFetcherConfig};
use mergecal_server::{AppState, ServerConfig, router};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(TracingConfig::server()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    let fetcher = HttpFetcher::new(HttpFetcherConfig::default())?;
    let aggregator = Aggregator::new(Arc::new(fetcher));
    let state = Arc::new(AppState::new(aggregator, config.clone()));

    let app = router(state);
    info!(addr = %config.bind_addr, sources = config.sources.len(), "listening");
    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
