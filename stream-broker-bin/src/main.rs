//! StreamBroker binary entrypoint: bind the HTTP router, run the background
//! reaper, serve until shutdown.

use std::time::Duration;

use sandbox_runtime::OrchestratorConfig;

fn setup_log() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};
    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {}
}

fn reaper_interval_secs() -> u64 {
    std::env::var("REAPER_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}

#[tokio::main]
async fn main() {
    setup_log();

    let config = OrchestratorConfig::load();
    let bind_addr = config.bind_addr.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(reaper_interval_secs()));
        loop {
            interval.tick().await;
            sandbox_runtime::reaper::reaper_tick().await;
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {bind_addr}: {err}"));
    tracing::info!(addr = %bind_addr, "stream-broker listening");

    let app = stream_broker::build_router();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("stream-broker server crashed");
}
