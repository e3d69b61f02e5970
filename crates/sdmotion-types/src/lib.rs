//! Wire types for motion telemetry: [`MotionSample`] and its JSON encoding.
//!
//! The JSON shape is a fixed contract (key order, four fractional digits,
//! no whitespace) consumed by clients that don't run a JSON parser tuned
//! for arbitrary key order, so the encoder below builds the string by hand
//! rather than going through `serde_json::to_string`.

use std::fmt::Write as _;

/// One converted motion reading, ready to be broadcast to subscribers.
///
/// `accel_magnitude` and `gyro_magnitude` are derived fields: callers
/// should populate them via [`MotionSample::new`] rather than
/// computing the Euclidean norm themselves, so the invariant
/// `magnitude == sqrt(sum of squares)` can't drift out of sync with the
/// components it was computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub timestamp_us: u64,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_pitch: f32,
    pub gyro_yaw: f32,
    pub gyro_roll: f32,
    pub frame_id: u32,
    pub accel_magnitude: f32,
    pub gyro_magnitude: f32,
}

impl MotionSample {
    /// Build a sample, deriving the two magnitude fields from the
    /// accelerometer and gyroscope triples.
    #[allow(clippy::too_many_arguments, reason = "one field per wire value, matches the JSON shape")]
    pub fn new(
        timestamp_us: u64,
        frame_id: u32,
        accel_x: f32,
        accel_y: f32,
        accel_z: f32,
        gyro_pitch: f32,
        gyro_yaw: f32,
        gyro_roll: f32,
    ) -> Self {
        let accel_magnitude = (accel_x * accel_x + accel_y * accel_y + accel_z * accel_z).sqrt();
        let gyro_magnitude =
            (gyro_pitch * gyro_pitch + gyro_yaw * gyro_yaw + gyro_roll * gyro_roll).sqrt();
        Self {
            timestamp_us,
            accel_x,
            accel_y,
            accel_z,
            gyro_pitch,
            gyro_yaw,
            gyro_roll,
            frame_id,
            accel_magnitude,
            gyro_magnitude,
        }
    }

    /// Recompute the magnitude fields from the current axis values.
    ///
    /// Used when a sample's axes are mutated in place (persistent-mode
    /// replication reuses the caller's buffer) and the magnitudes must be
    /// refreshed to match.
    pub fn recompute_magnitudes(&mut self) {
        self.accel_magnitude =
            (self.accel_x * self.accel_x + self.accel_y * self.accel_y + self.accel_z * self.accel_z)
                .sqrt();
        self.gyro_magnitude = (self.gyro_pitch * self.gyro_pitch
            + self.gyro_yaw * self.gyro_yaw
            + self.gyro_roll * self.gyro_roll)
            .sqrt();
    }

    /// Encode as the wire JSON object described in the service's protocol
    /// contract: fixed key order, four fractional digits, no whitespace.
    pub fn to_json(&self) -> String {
        let mut out = String::with_capacity(192);
        // write! into a String cannot fail; the unwrap_used lint is
        // satisfied by propagating via `let _ =` only where infallible.
        let _ = write!(
            out,
            "{{\"timestamp\":{},\"accel\":{{\"x\":{:.4},\"y\":{:.4},\"z\":{:.4}}},\"gyro\":{{\"pitch\":{:.4},\"yaw\":{:.4},\"roll\":{:.4}}},\"frameId\":{},\"magnitude\":{{\"accel\":{:.4},\"gyro\":{:.4}}}}}",
            self.timestamp_us,
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_pitch,
            self.gyro_yaw,
            self.gyro_roll,
            self.frame_id,
            self.accel_magnitude,
            self.gyro_magnitude,
        );
        out
    }
}
