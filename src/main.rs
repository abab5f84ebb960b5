//! HarborDB server entrypoint.
//!
//! The heavy lifting (initialization, server wiring, graceful shutdown)
//! lives in dedicated modules so this file remains a thin orchestrator.

mod lifecycle;
mod logging;

use anyhow::Result;
use harbordb_commons::ServerConfig;
use lifecycle::{bootstrap, run};
use log::info;

#[actix_web::main]
async fn main() -> Result<()> {
    // Load configuration (fall back to defaults when config file missing)
    let config_path = "config.toml";
    let config = match ServerConfig::from_file_or_default(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: Failed to load {}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    // Logging before any other side effects
    let server_log_path = format!("{}/server.log", config.logging.logs_path);
    logging::init_logging(
        &config.logging.level,
        &server_log_path,
        config.logging.log_to_console,
        Some(&config.logging.targets),
        &config.logging.format,
    )?;

    info!("HarborDB Server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Host: {}  Port: {}  Tenant data: {}",
        config.server.host, config.server.port, config.tenants.data_root
    );

    let context = bootstrap(&config)?;
    run(config, context).await
}
