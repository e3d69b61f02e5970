//! Raw-frame-to-sample conversion, including accelerometer smoothing.
//!
//! Mirrors the `openracing-filters` style of a small `State` struct plus a
//! free function that advances it: no heap allocation, O(1) per call.

use sdmotion_hid::RawFrame;
use sdmotion_types::MotionSample;

/// One "g" in device accelerometer units.
const ACC_1G: f32 = 16384.0;
/// Device units per degree/second on the gyro axes.
const GYRO_1DPS: f32 = 16.0;
/// Accelerometer smoothing re-seed threshold, device units.
const ACCEL_SMOOTH_THRESHOLD: f32 = 0x1FF as f32;
/// Gyro deadzone half-width, device units.
const GYRO_DEADZONE: i16 = 8;

/// Per-axis single-pole IIR low-pass state for the accelerometer.
///
/// Zero-initialized; the first frame always takes the re-seed branch since
/// `|curr - 0| >= ACCEL_SMOOTH_THRESHOLD` whenever `curr` is a plausible
/// accelerometer reading near 1g.
#[derive(Debug, Clone, Copy, Default)]
struct SmoothingState {
    accel_rtl: f32,
    accel_ftb: f32,
    accel_ttb: f32,
}

fn smooth_accel(last: &mut f32, curr: i16) -> f32 {
    let curr = curr as f32;
    if (curr - *last).abs() < ACCEL_SMOOTH_THRESHOLD {
        *last = *last * 0.95 + curr * 0.05;
    } else {
        *last = curr;
    }
    *last / ACC_1G
}

fn apply_deadzone(raw: i16) -> i16 {
    if raw > -GYRO_DEADZONE && raw < GYRO_DEADZONE {
        0
    } else {
        raw
    }
}

/// Stateful raw-frame to [`MotionSample`] transform.
///
/// One instance owns the accelerometer smoothing accumulators; gyro
/// conversion is stateless aside from the deadzone, which only looks at
/// the current frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameConverter {
    smoothing: SmoothingState,
}

impl FrameConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one raw frame into a [`MotionSample`], stamped with
    /// `frame_id` and the current monotonic time.
    ///
    /// The timestamp is overwritten by the caller for replicated samples
    /// (see `MotionAdapter`); this always stamps wall-clock "now".
    pub fn convert(&mut self, frame: RawFrame, frame_id: u32) -> MotionSample {
        let accel_x = -smooth_accel(&mut self.smoothing.accel_rtl, frame.accel_rtl);
        let accel_y = -smooth_accel(&mut self.smoothing.accel_ftb, frame.accel_ftb);
        let accel_z = smooth_accel(&mut self.smoothing.accel_ttb, frame.accel_ttb);

        let (gyro_pitch, gyro_yaw, gyro_roll) = if frame.has_no_gyro_marker() {
            (0.0, 0.0, 0.0)
        } else {
            let rtl = apply_deadzone(frame.gyro_rtl);
            let ftb = apply_deadzone(frame.gyro_ftb);
            let ttb = apply_deadzone(frame.gyro_ttb);
            (
                rtl as f32 / GYRO_1DPS,
                -(ftb as f32) / GYRO_1DPS,
                ttb as f32 / GYRO_1DPS,
            )
        };

        let timestamp_us = now_monotonic_us();

        MotionSample::new(
            timestamp_us,
            frame_id,
            accel_x,
            accel_y,
            accel_z,
            gyro_pitch,
            gyro_yaw,
            gyro_roll,
        )
    }
}

fn now_monotonic_us() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn accel_re_seeds_on_large_jump() {
        let mut converter = FrameConverter::new();
        // First call always re-seeds (0 -> curr), giving last = curr exactly.
        let raw = test_frame(0, 0, 16384, (0, 0, 0), 0x00);
        let sample = converter.convert(raw, 1);
        assert!((sample.accel_z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn accel_smooths_when_within_threshold() {
        let mut converter = FrameConverter::new();
        let raw1 = test_frame(0, 0, 16384, (0, 0, 0), 0x00);
        converter.convert(raw1, 1);
        // curr - last = 100 < 0x1FF -> smoothing branch.
        let raw2 = test_frame(0, 0, 16484, (0, 0, 0), 0x00);
        let sample = converter.convert(raw2, 2);
        let expected = (16384.0_f32 * 0.95 + 16484.0 * 0.05) / ACC_1G;
        assert!((sample.accel_z - expected).abs() < 1e-5);
    }

    #[test]
    fn accel_boundary_just_under_threshold_smooths_at_threshold_reseeds() {
        // ACCEL_SMOOTH_THRESHOLD is 0x1FF (511); the comparison is a
        // strict `<`, so a jump of exactly 511 device units misses the
        // smoothing branch and re-seeds, while 510 stays within it.
        let base = test_frame(0, 0, 0, (0, 0, 0), 0x00);

        let mut smooth = FrameConverter::new();
        smooth.convert(base, 1);
        let within = test_frame(0, 0, 510, (0, 0, 0), 0x00);
        let sample = smooth.convert(within, 2);
        let expected_smooth = (0.0_f32 * 0.95 + 510.0 * 0.05) / ACC_1G;
        assert!((sample.accel_z - expected_smooth).abs() < 1e-5);

        let mut reseed = FrameConverter::new();
        reseed.convert(base, 1);
        let at_threshold = test_frame(0, 0, 511, (0, 0, 0), 0x00);
        let sample = reseed.convert(at_threshold, 2);
        let expected_reseed = 511.0 / ACC_1G;
        assert!((sample.accel_z - expected_reseed).abs() < 1e-5);
    }

    #[test]
    fn gyro_no_marker_zeroes_all_axes() {
        let mut converter = FrameConverter::new();
        let raw = test_frame(0, 0, 0, (100, 100, 100), 0xDD);
        let sample = converter.convert(raw, 1);
        assert_eq!(sample.gyro_pitch, 0.0);
        assert_eq!(sample.gyro_yaw, 0.0);
        assert_eq!(sample.gyro_roll, 0.0);
    }

    #[test]
    fn gyro_deadzone_boundaries() {
        let mut converter = FrameConverter::new();
        let raw = test_frame(0, 0, 0, (7, -7, 0), 0x00);
        let sample = converter.convert(raw, 1);
        assert_eq!(sample.gyro_pitch, 0.0);
        assert_eq!(sample.gyro_yaw, 0.0);

        let mut converter = FrameConverter::new();
        let raw = test_frame(0, 0, 0, (8, -8, 0), 0x00);
        let sample = converter.convert(raw, 1);
        assert!((sample.gyro_pitch - 0.5).abs() < 1e-6);
        assert!((sample.gyro_yaw - 0.5).abs() < 1e-6);
    }

    #[test]
    fn gyro_axis_signs_and_scale() {
        let mut converter = FrameConverter::new();
        let raw = test_frame(0, 0, 0, (16, 16, 16), 0x00);
        let sample = converter.convert(raw, 1);
        assert!((sample.gyro_pitch - 1.0).abs() < 1e-6);
        assert!((sample.gyro_yaw - -1.0).abs() < 1e-6);
        assert!((sample.gyro_roll - 1.0).abs() < 1e-6);
    }

    #[test]
    fn frame_id_is_assigned_verbatim() {
        let mut converter = FrameConverter::new();
        let raw = test_frame(0, 0, 0, (0, 0, 0), 0x00);
        let sample = converter.convert(raw, 7);
        assert_eq!(sample.frame_id, 7);
    }

    fn test_frame(
        accel_rtl: i16,
        accel_ftb: i16,
        accel_ttb: i16,
        gyro: (i16, i16, i16),
        header: u16,
    ) -> RawFrame {
        RawFrame {
            header,
            increment: 1,
            accel_rtl,
            accel_ftb,
            accel_ttb,
            gyro_rtl: gyro.0,
            gyro_ftb: gyro.1,
            gyro_ttb: gyro.2,
        }
    }

    proptest::proptest! {
        #[test]
        fn accel_smoothing_never_overshoots_within_threshold(
            last in -20000.0f32..20000.0,
            delta in -510.0f32..510.0,
        ) {
            let curr = (last + delta) as i16;
            let mut state = last;
            let out = smooth_accel(&mut state, curr);
            let curr_f = curr as f32;
            let lo = last.min(curr_f);
            let hi = last.max(curr_f);
            prop_assert!(state >= lo - 1e-3 && state <= hi + 1e-3);
            prop_assert!((out - state / ACC_1G).abs() < 1e-6);
        }

        #[test]
        fn accel_reseeds_exactly_on_upward_jump_past_threshold(
            last in -20000.0f32..20000.0,
            jump in 512.0f32..20000.0,
        ) {
            let curr = (last + jump) as i16;
            let mut state = last;
            smooth_accel(&mut state, curr);
            prop_assert!((state - curr as f32).abs() < 1e-3);
        }

        #[test]
        fn accel_reseeds_exactly_on_downward_jump_past_threshold(
            last in -20000.0f32..20000.0,
            jump in 512.0f32..20000.0,
        ) {
            let curr = (last - jump) as i16;
            let mut state = last;
            smooth_accel(&mut state, curr);
            prop_assert!((state - curr as f32).abs() < 1e-3);
        }

        #[test]
        fn gyro_deadzone_holds_for_every_raw_value(raw in -4000i16..4000) {
            let out = apply_deadzone(raw);
            if raw > -GYRO_DEADZONE && raw < GYRO_DEADZONE {
                prop_assert_eq!(out, 0);
            } else {
                prop_assert_eq!(out, raw);
            }
        }
    }
}
