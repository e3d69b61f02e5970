//! HID transport for Steam Deck Controls' motion sensors.
//!
//! This crate owns exactly the part of the pipeline that talks to the
//! kernel HID layer: parsing raw reports into [`RawFrame`] values and
//! exposing them through the [`FrameProducer`]/[`FrameServe`] contract
//! that `sdmotion-core` consumes. It deliberately knows nothing about
//! smoothing, sequencing, or the network — those live downstream.

mod error;
mod frame;
mod producer;
mod report;

pub mod mock;

#[cfg(feature = "device")]
pub mod device;

pub use error::{HidError, HidResult};
pub use frame::RawFrame;
pub use producer::{FrameProducer, FrameServe};
