//! Server lifecycle management helpers.
//!
//! Encapsulates the heavy lifting so `main.rs` stays a thin orchestrator:
//! bootstrapping the application context, wiring the HTTP server, and
//! coordinating graceful shutdown.

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use harbordb_api::routes;
use harbordb_commons::ServerConfig;
use harbordb_core::AppContext;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// How often the idle-pool sweep runs.
const POOL_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the application context and install it process-wide.
pub fn bootstrap(config: &ServerConfig) -> Result<Arc<AppContext>> {
    std::fs::create_dir_all(&config.tenants.data_root)?;

    let context = AppContext::build(config.clone());
    if !AppContext::install(Arc::clone(&context)) {
        return Err(anyhow::anyhow!("AppContext was already initialized"));
    }
    debug!("AppContext initialized");
    Ok(context)
}

/// Serve HTTP until shutdown, then tear down pools and tenant instances.
pub async fn run(config: ServerConfig, context: Arc<AppContext>) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let data = web::Data::from(Arc::clone(&context));

    // Periodic idle-pool eviction.
    let sweep_registry = context.registry();
    let sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POOL_SWEEP_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            let evicted = sweep_registry.evict_idle();
            if evicted > 0 {
                info!("Evicted {} idle tenant pool(s)", evicted);
            }
        }
    });

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes::configure_routes)
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    info!("Listening on {}", bind_addr);
    server.bind(&bind_addr)?.run().await?;

    // actix returned: SIGINT/SIGTERM already drained in-flight requests.
    sweep.abort();
    info!("Shutting down: closing pools and stopping tenant instances");
    context.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}
