// SOI Propagator - stdio host
// Logs go to stderr (RUST_LOG, default "info"); stdout carries only protocol lines

use soi_propagator_lib::EngineConfig;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EngineConfig::from_env();
    log::info!(
        "Starting: {} points/chunk, {} max steps, catalog {}",
        config.default_points_per_chunk,
        config.max_steps,
        if config.preload_catalog { "preloaded" } else { "off" }
    );

    if let Err(e) = soi_propagator_lib::run(config).await {
        log::error!("Host failed: {}", e);
        std::process::exit(1);
    }
}
