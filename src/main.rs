use std::sync::Arc;

use tracing::{error, info};

use udpsub::BrokerServer;
use udpsub::config::load_config;
use udpsub::utils::logging;
use udpsub::utils::signal::stop_channel;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.log.level);

    let server = match BrokerServer::from_settings(&config).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!(error = %e, "server error");
            std::process::exit(1);
        }
    };
    info!(addr = %server.local_addr(), "server starting");

    let (stop, rx) = stop_channel();
    let dispatcher = tokio::spawn(Arc::clone(&server).dispatch_event_publisher(rx.clone()));
    let listener = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.start(rx).await }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "unable to listen for shutdown signal");
    }
    info!("shutting down");
    let _ = stop.send(true);

    match listener.await {
        Ok(Err(e)) => error!(error = %e, "listener failed"),
        Err(e) => error!(error = %e, "listener panicked"),
        Ok(Ok(())) => {}
    }
    if let Err(e) = dispatcher.await {
        error!(error = %e, "dispatcher panicked");
    }
}
