//! UDP broadcaster and process glue for the Steam Deck motion service.
//!
//! Everything that actually implements the streaming protocol lives in
//! `sdmotion-core`/`sdmotion-types`; this crate binds a socket, wires a
//! `FrameProducer` to a `MotionAdapter`, and runs the two network loops.

mod broadcaster;
mod config;
mod error;

pub use broadcaster::UdpBroadcaster;
pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
