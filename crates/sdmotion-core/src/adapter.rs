//! `MotionAdapter`: sits between a raw [`FrameProducer`] and the send loop,
//! hiding producer noise (duplicate frames, dropped frames, stalls) behind
//! a simple pull API.

use crate::converter::FrameConverter;
use sdmotion_hid::{FrameProducer, FrameServe, RawFrame};
use sdmotion_types::MotionSample;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Device-reported frames arrive roughly every 4000µs (250Hz); replicated
/// samples tile forward at this same period.
pub const SCAN_PERIOD_US: u64 = 4_000;

const NO_GYRO_COOLDOWN_FRAMES: u32 = 1_000;
const MAX_REPEATED_LOOP: u32 = 1_000;
const MAX_DIFF_REPLICATE: i64 = 100;

/// Whether replicated samples reuse the caller's buffer in place
/// (`Persistent`) or are served from an adapter-owned cache
/// (`NonPersistent`). See the module docs on [`MotionAdapter::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    #[default]
    Persistent,
    NonPersistent,
}

/// Sits between a [`FrameProducer`] and a single consumer, replaying
/// lock-step raw frames as down-rate-ready [`MotionSample`]s with gap
/// replication and dead-gyro detection.
pub struct MotionAdapter {
    producer: Arc<dyn FrameProducer>,
    serve: Option<Arc<dyn FrameServe>>,
    converter: FrameConverter,
    mode: PersistenceMode,

    last_increment: u32,
    frame_counter: u32,
    replicate_remaining: u32,
    last_timestamp_us: u64,
    no_gyro_cooldown: u32,
    ignore_first: bool,
    cached_sample: Option<MotionSample>,

    /// Set once when the dead-gyro pattern is detected; cleared by
    /// [`MotionAdapter::take_no_gyro_signal`]. A one-shot, coalescing
    /// notifier rather than a queue — callers only care whether it fired
    /// since they last checked.
    no_gyro_signal: bool,
}

impl MotionAdapter {
    /// Build an adapter over `producer`, defaulting to persistent mode
    /// (see [`PersistenceMode`]).
    pub fn new(producer: Arc<dyn FrameProducer>) -> Self {
        Self::with_mode(producer, PersistenceMode::Persistent)
    }

    pub fn with_mode(producer: Arc<dyn FrameProducer>, mode: PersistenceMode) -> Self {
        Self {
            producer,
            serve: None,
            converter: FrameConverter::new(),
            mode,
            last_increment: 0,
            frame_counter: 0,
            replicate_remaining: 0,
            last_timestamp_us: 0,
            no_gyro_cooldown: 0,
            ignore_first: true,
            cached_sample: None,
            no_gyro_signal: false,
        }
    }

    /// Reset sequencing state, start the producer, and obtain a consume
    /// handle. Idempotent after a matching `stop()`.
    pub fn start(&mut self) -> sdmotion_hid::HidResult<()> {
        self.last_increment = 0;
        self.frame_counter = 0;
        self.ignore_first = true;
        self.replicate_remaining = 0;
        self.no_gyro_cooldown = 0;
        self.cached_sample = None;
        self.producer.start()?;
        self.serve = Some(self.producer.serve());
        debug!("sdmotion-core: adapter started");
        Ok(())
    }

    /// Release the consume handle and stop the producer.
    pub fn stop(&mut self) {
        self.serve = None;
        self.producer.stop();
        debug!("sdmotion-core: adapter stopped");
    }

    /// Whether a dead-gyro pattern has fired since the last check. Clears
    /// the flag on read — a one-shot, coalescing signal.
    pub fn take_no_gyro_signal(&mut self) -> bool {
        std::mem::take(&mut self.no_gyro_signal)
    }

    /// Pull one fresh or replicated sample. Returns `false` only in the
    /// pathological "frame is repeated continuously" case — callers treat
    /// that as "no data this tick" and retry later.
    pub fn try_get(&mut self, out: &mut MotionSample) -> bool {
        let Some(serve) = self.serve.clone() else {
            return false;
        };

        if self.replicate_remaining > 0 {
            self.replicate_remaining -= 1;
            self.last_timestamp_us += SCAN_PERIOD_US;
            match self.mode {
                PersistenceMode::Persistent => {
                    out.timestamp_us = self.last_timestamp_us;
                }
                PersistenceMode::NonPersistent => {
                    if let Some(cached) = self.cached_sample {
                        *out = cached;
                    }
                    out.timestamp_us = self.last_timestamp_us;
                }
            }
            self.frame_counter += 1;
            out.frame_id = self.frame_counter;
            return true;
        }

        if self.ignore_first {
            // Discard the frame that was already buffered before start().
            let _ = serve.consume();
            self.ignore_first = false;
        }

        let mut repeated_loop = MAX_REPEATED_LOOP;
        loop {
            let Ok(frame) = serve.consume() else {
                return false;
            };

            if self.no_gyro_cooldown > 0 {
                self.no_gyro_cooldown -= 1;
            }
            if self.no_gyro_cooldown == 0 && frame.all_axes_zero() {
                self.no_gyro_signal = true;
                self.no_gyro_cooldown = NO_GYRO_COOLDOWN_FRAMES;
            }

            let diff = i64::from(frame.increment) - i64::from(self.last_increment);

            if self.last_increment != 0 && diff < 1 && diff > -100 {
                if repeated_loop == MAX_REPEATED_LOOP {
                    trace!(
                        current = format_args!("{:#010x}", frame.increment),
                        last = format_args!("{:#010x}", self.last_increment),
                        "sdmotion-core: frame was repeated, ignoring"
                    );
                }
                if repeated_loop == 0 {
                    warn!("sdmotion-core: frame is repeated continuously");
                    return false;
                }
                repeated_loop -= 1;
                continue;
            }

            if self.last_increment != 0 && diff > 1 {
                if diff > 6 {
                    warn!(missed = diff - 1, "sdmotion-core: missed frames");
                } else {
                    debug!(missed = diff - 1, "sdmotion-core: missed frames");
                }
                if diff <= MAX_DIFF_REPLICATE {
                    self.replicate_remaining = (diff - 1) as u32;
                }
            }

            self.frame_counter += 1;
            *out = self.converter.convert(frame, self.frame_counter);

            if self.replicate_remaining > 0 {
                self.last_timestamp_us = u64::from(self.last_increment + 1) * SCAN_PERIOD_US;
                out.timestamp_us = self.last_timestamp_us;
                if self.mode == PersistenceMode::NonPersistent {
                    self.cached_sample = Some(*out);
                }
            }

            self.last_increment = frame.increment;
            return true;
        }
    }
}
