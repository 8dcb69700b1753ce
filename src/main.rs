use std::sync::Arc;

use sysscope::api::{ApiServer, ApiServerConfig, AppState};
use sysscope::config::EngineConfig;
use sysscope::engine::TierScheduler;
use sysscope::logging;
use sysscope::providers::SystemProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging; the guard must outlive the process body.
    let (logging_config, _guard) = logging::init()?;

    let engine_config = EngineConfig::from_env_or_default();
    let provider = Arc::new(SystemProvider::new());
    let scheduler = Arc::new(TierScheduler::new(provider, engine_config));

    let loop_handle = tokio::spawn(scheduler.clone().run());

    let state =
        AppState::new(scheduler.clone()).with_logging_config(Arc::new(logging_config));
    let server = ApiServer::with_state(ApiServerConfig::from_env_or_default(), state);

    // Ctrl-C cancels the API server and the collection loop; in-flight
    // provider calls complete and their results are discarded.
    let server_cancel = server.cancel_token();
    let shutdown_scheduler = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            server_cancel.cancel();
            shutdown_scheduler.shutdown();
        }
    });

    server.run().await?;
    scheduler.shutdown();
    loop_handle.await?;

    tracing::info!("sysscope stopped");
    Ok(())
}
