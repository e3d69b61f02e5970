use crate::error::HidResult;
use crate::frame::RawFrame;
use std::sync::Arc;

/// External HID frame source contract.
///
/// `sdmotion-core` depends only on this trait, never on a concrete
/// device backend — the USB transport is explicitly out of the motion
/// pipeline's core (see the crate-level docs for the rationale). A
/// producer nominally yields one [`RawFrame`] every ~4000µs (250Hz).
pub trait FrameProducer: Send + Sync {
    /// Begin producing frames. Idempotent after a matching `stop()`.
    fn start(&self) -> HidResult<()>;

    /// Stop producing frames and release any device handle.
    fn stop(&self);

    /// Obtain a handle for pulling frames one at a time.
    ///
    /// Must only be called while the producer is running (i.e. between
    /// `start()` and `stop()`).
    fn serve(&self) -> Arc<dyn FrameServe>;
}

/// A consume handle obtained from a running [`FrameProducer`].
///
/// Stands in for the original "consume lock" contract: each `consume()`
/// call takes exclusive access to the next available frame and hands
/// back an owned copy, which is the Rust-idiomatic equivalent of
/// lock-guard-then-copy for a fixed-size `Copy` payload.
pub trait FrameServe: Send + Sync {
    /// Block until the next frame is available and return it.
    ///
    /// Returns [`crate::error::HidError::NotRunning`] if the producer was
    /// stopped while a caller was waiting.
    fn consume(&self) -> HidResult<RawFrame>;
}
