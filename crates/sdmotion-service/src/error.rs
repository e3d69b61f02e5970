//! Startup-fatal error type for the motion service binary.
//!
//! Everything downstream of `UdpBroadcaster::run` swallows or recovers from
//! its own errors (see `sdmotion-core`'s transient-producer handling); the
//! only errors that ever reach `main` are the ones that prevent the server
//! from starting at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    SocketBind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HID motion device error: {0}")]
    Device(#[from] sdmotion_hid::HidError),

    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
