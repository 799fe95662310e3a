//! Garden Server Binary
//!
//! Serves the item feed API over HTTP. Configured through `GARDEN_*`
//! environment variables (see `garden_server::config`).

use std::sync::Arc;

use garden_core::init_logging;
use garden_server::config::ServerConfig;
use garden_server::{serve, AppState};
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    init_logging(&config.log_level, config.log_dir.as_deref())?;
    info!(
        "event=server_start module=server status=start db_path={} version={}",
        config.db_path.display(),
        garden_core::core_version()
    );

    let state = Arc::new(AppState::open(&config)?);
    serve(config.addr, state).await
}
