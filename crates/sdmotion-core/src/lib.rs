//! The motion sample pipeline: raw-frame conversion, sequence-gap
//! handling, dead-gyro detection, and subscriber bookkeeping.
//!
//! This crate is deliberately transport-agnostic: it depends on
//! `sdmotion-hid` only through the [`sdmotion_hid::FrameProducer`]
//! contract, and knows nothing about UDP sockets — that's
//! `sdmotion-service`'s job.

mod adapter;
mod converter;
mod registry;

pub use adapter::{MotionAdapter, PersistenceMode, SCAN_PERIOD_US};
pub use converter::FrameConverter;
pub use registry::{SubscriberRegistry, SUBSCRIBER_TTL};
