//! An in-memory [`FrameProducer`] for tests: frames are queued up front
//! and served back in order; once the queue drains, the producer keeps
//! re-serving its last frame, modeling a stuck/frozen device so callers
//! can exercise `MotionAdapter`'s duplicate-storm handling without a
//! background thread.

use crate::error::{HidError, HidResult};
use crate::frame::RawFrame;
use crate::producer::{FrameProducer, FrameServe};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct Shared {
    queue: Mutex<VecDeque<RawFrame>>,
    last: Mutex<Option<RawFrame>>,
    running: AtomicBool,
}

/// A scriptable [`FrameProducer`] backed by a preloaded queue of frames.
pub struct MockFrameProducer {
    shared: Arc<Shared>,
}

impl MockFrameProducer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                last: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Queue one frame to be returned by the next `consume()` call.
    pub fn push_frame(&self, frame: RawFrame) {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(frame);
    }

    /// Queue several frames in order.
    pub fn push_frames(&self, frames: impl IntoIterator<Item = RawFrame>) {
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.extend(frames);
    }

    /// Number of frames still queued (not counting the repeatable last one).
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for MockFrameProducer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProducer for MockFrameProducer {
    fn start(&self) -> HidResult<()> {
        self.shared.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }

    fn serve(&self) -> Arc<dyn FrameServe> {
        Arc::new(MockServe {
            shared: Arc::clone(&self.shared),
        })
    }
}

struct MockServe {
    shared: Arc<Shared>,
}

impl FrameServe for MockServe {
    fn consume(&self) -> HidResult<RawFrame> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(HidError::NotRunning);
        }
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        let frame = match queue.pop_front() {
            Some(frame) => {
                *self.shared.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
                frame
            }
            None => {
                let last = self.shared.last.lock().unwrap_or_else(|e| e.into_inner());
                last.ok_or(HidError::NotRunning)?
            }
        };
        Ok(frame)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn frame(increment: u32) -> RawFrame {
        RawFrame {
            header: 0,
            increment,
            accel_rtl: 0,
            accel_ftb: 0,
            accel_ttb: 0,
            gyro_rtl: 0,
            gyro_ftb: 0,
            gyro_ttb: 0,
        }
    }

    #[test]
    fn serves_frames_in_order() {
        let producer = MockFrameProducer::new();
        producer.push_frames([frame(1), frame(2), frame(3)]);
        producer.start().expect("start succeeds");
        let serve = producer.serve();
        assert_eq!(serve.consume().expect("consume").increment, 1);
        assert_eq!(serve.consume().expect("consume").increment, 2);
        assert_eq!(serve.consume().expect("consume").increment, 3);
    }

    #[test]
    fn repeats_last_frame_once_queue_drains() {
        let producer = MockFrameProducer::new();
        producer.push_frame(frame(42));
        producer.start().expect("start succeeds");
        let serve = producer.serve();
        for _ in 0..1000 {
            assert_eq!(serve.consume().expect("consume").increment, 42);
        }
    }

    #[test]
    fn consume_before_start_errors() {
        let producer = MockFrameProducer::new();
        let serve = producer.serve();
        assert!(matches!(serve.consume(), Err(HidError::NotRunning)));
    }

    #[test]
    fn consume_after_stop_errors() {
        let producer = MockFrameProducer::new();
        producer.push_frame(frame(1));
        producer.start().expect("start succeeds");
        let serve = producer.serve();
        serve.consume().expect("consume");
        producer.stop();
        assert!(matches!(serve.consume(), Err(HidError::NotRunning)));
    }
}
