//! Demo host for the aquifer subsystem.
//!
//! Generates a synthetic world, runs the aquifer service on it until every
//! cell is settled (or ctrl-c), then prints ratings and wellspring output.

mod config;
mod demo;
mod logger;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use wellspring_core::AquiferService;

use config::HostConfig;
use demo::DemoWorld;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init()?;

    let path = env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(config::DEFAULT_PATH), PathBuf::from);
    let config = HostConfig::load(&path)?;
    let seed = config.world_seed();
    log::info!("World seed {seed}");

    let start = Instant::now();
    let world = DemoWorld::generate(seed, &config.demo);
    log::info!("Demo world generated in {:?}", start.elapsed());

    let service = Arc::new(
        AquiferService::with_memory_store(config.aquifer.clone())
            .context("failed to start aquifer service")?,
    );
    world.load_into(&service);

    let cancel_token = CancellationToken::new();
    let runner = tokio::spawn(service.clone().run(cancel_token.clone()));

    let limit = Duration::from_secs(config.max_run_seconds);
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            log::info!("Interrupted, shutting down");
        }
        () = settle(&service, limit) => {}
    }

    cancel_token.cancel();
    runner.await.context("aquifer service task failed")?;

    world.report(&service);
    Ok(())
}

/// Waits until nothing is queued or failing, or `limit` has passed.
async fn settle(service: &AquiferService, limit: Duration) {
    let start = Instant::now();
    let poll = Duration::from_millis(service.config().scheduler.drain_interval_ms);
    loop {
        sleep(poll).await;
        if service.pending_len() == 0 && service.failures_len() == 0 {
            log::info!("Aquifer ratings settled after {:?}", start.elapsed());
            return;
        }
        if start.elapsed() >= limit {
            log::warn!(
                "Stopped waiting after {limit:?} with {} queued and {} failing cells",
                service.pending_len(),
                service.failures_len()
            );
            return;
        }
    }
}
