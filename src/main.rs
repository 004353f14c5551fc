//! Tapestry server entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at configured level
//!   4. Build the LLM provider and probe it
//!   5. Open the project store
//!   6. Serve HTTP until Ctrl-C

use tapestry::{config, error::AppError, extraction::Extractor, llm::providers, logger, server};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        name = %config.name,
        work_dir = %config.work_dir.display(),
        log_level = %config.log_level,
        "config loaded"
    );

    let provider = providers::build(&config.llm, config.llm_api_key.clone())?;
    match provider.ping().await {
        Ok(()) => info!(provider = provider.name(), "llm provider reachable"),
        Err(e) => warn!(provider = provider.name(), error = %e, "llm provider ping failed; continuing"),
    }
    let extractor = Extractor::new(provider, config.prompts_dir.clone());

    #[cfg(feature = "isqlite")]
    let state = {
        let store = tapestry::store::ProjectStore::open(&config.db_path)?;
        info!(db = %store.path().display(), "project store ready");
        server::ApiState::new(extractor, store)
    };
    #[cfg(not(feature = "isqlite"))]
    let state = server::ApiState::new(extractor);

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, shutting down");
                ctrl_c.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    server::serve(&config.http.bind, state, shutdown).await
}
