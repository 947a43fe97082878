// demos/ingest_server.rs
//! Runs an ingestion engine for a while and prints everything it receives
//!
//! ```text
//! RUST_LOG=info cargo run --example ingest_server -- demos/config.json 30
//! ```

use std::time::Duration;
use udpring::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "config.json".to_string());
    let run_for = args
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(30));

    let mut engine = Engine::init_from_file(&config_path)?;
    engine.set_data_callback(|data: &[u8]| {
        println!("Received data: {}", String::from_utf8_lossy(data));
    })?;

    if let Err(e) = engine.start() {
        log::error!("Failed to start engine: {}", e);
        engine.destroy();
        return Err(e.into());
    }

    log::info!(
        "Server started, listening on {} for {:?}",
        engine.local_addr(),
        run_for
    );
    std::thread::sleep(run_for);

    engine.stop();
    let stats = engine.stats();
    log::info!(
        "Received {} datagrams ({} bytes), dropped {} bytes ({:.1}%)",
        stats.datagrams_received,
        stats.bytes_received,
        stats.bytes_dropped,
        stats.drop_rate()
    );
    engine.destroy();

    log::info!("Server stopped");
    Ok(())
}
