//! Steam Deck motion UDP service entry point.
//!
//! Process-level concerns only: logging setup, environment configuration,
//! device acquisition, signal handling, and wiring the pieces from
//! `sdmotion-core`/`sdmotion-hid` together. The protocol itself lives in
//! `sdmotion_service::UdpBroadcaster`.

use anyhow::{Context, Result};
use sdmotion_core::MotionAdapter;
use sdmotion_service::{ServiceConfig, UdpBroadcaster};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sdmotion=info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting sdmotion-service");

    let config = ServiceConfig::from_env();

    let producer = open_producer(&config)?;
    // Fail fast if the device isn't present rather than discovering it only
    // once the first subscriber shows up and the send loop calls start().
    producer.start().context("failed to open HID motion device")?;
    producer.stop();
    let adapter = MotionAdapter::new(producer);

    let broadcaster = UdpBroadcaster::bind(config.port).context("failed to bind UDP socket")?;
    let bound_addr = broadcaster.local_addr().context("failed to read bound socket address")?;
    info!(addr = %bound_addr, "listening for subscriber registrations");

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        stop_for_handler.store(true, Ordering::SeqCst);
    })
    .context("failed to install SIGINT/SIGTERM handler")?;

    broadcaster.run(adapter, &stop);

    info!("sdmotion-service stopped");
    Ok(())
}

#[cfg(feature = "device")]
fn open_producer(config: &ServiceConfig) -> Result<Arc<dyn sdmotion_hid::FrameProducer>> {
    let producer = sdmotion_hid::device::HidApiFrameProducer::new(
        config.hid.vendor_id,
        config.hid.product_id,
        config.hid.interface_number,
    );
    Ok(Arc::new(producer))
}

#[cfg(not(feature = "device"))]
fn open_producer(_config: &ServiceConfig) -> Result<Arc<dyn sdmotion_hid::FrameProducer>> {
    anyhow::bail!(
        "sdmotion-service was built without the `device` feature; no HID frame producer is available"
    )
}
