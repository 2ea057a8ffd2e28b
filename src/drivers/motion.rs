//! Inertial value normalization and smoothing for transmission.

use crate::state::MotionData;

/// A scalar as reported by a sensor driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue {
    Int(i32),
    /// `val1 + val2 * 1e-6`; the two parts may carry different signs.
    IntPlusMicro { val1: i32, val2: i32 },
    Double(f64),
}

impl SensorValue {
    /// Builds the canonical integer-plus-micro pair for `micros` millionths.
    pub fn from_micros(micros: i64) -> Self {
        SensorValue::IntPlusMicro {
            val1: (micros / 1_000_000) as i32,
            val2: (micros % 1_000_000) as i32,
        }
    }

    pub fn normalize(self) -> f64 {
        match self {
            SensorValue::Int(v) => v as f64,
            SensorValue::IntPlusMicro { val1, val2 } => {
                // fold a positive fraction under a negative integer part: -2 + 0.5 = -1 - 0.5
                let (val1, val2) = if val1 < 0 && val2 > 0 {
                    (val1 + 1, val2 - 1_000_000)
                } else {
                    (val1, val2)
                };
                val1 as f64 + val2 as f64 * 1e-6
            }
            SensorValue::Double(v) => v,
        }
    }

    /// Normalized value in thousandths, rounded and saturated to i16.
    pub fn to_milli(self) -> i16 {
        self.scaled(1000.0)
    }

    /// Normalized value in hundredths (temperatures).
    pub fn to_centi(self) -> i16 {
        self.scaled(100.0)
    }

    fn scaled(self, factor: f64) -> i16 {
        // float -> int casts saturate; NaN maps to 0
        libm::round(self.normalize() * factor) as i16
    }
}

/// One inertial reading as delivered by the IMU driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// rad/s
    pub gyro: [SensorValue; 3],
    /// m/s²
    pub accel: [SensorValue; 3],
    /// °C
    pub temperature: SensorValue,
}

/// Smooths motion telemetry: each axis is the mean of the previous transmitted
/// value and the new reading.
pub struct MotionBlender {
    last: Option<MotionData>,
}

impl MotionBlender {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn blend(&mut self, gyro: &[SensorValue; 3], accel: &[SensorValue; 3]) -> MotionData {
        let fresh = MotionData {
            gyro: gyro.map(SensorValue::to_milli),
            accel: accel.map(SensorValue::to_milli),
        };
        let out = match self.last {
            None => fresh,
            Some(prev) => MotionData {
                gyro: mean(prev.gyro, fresh.gyro),
                accel: mean(prev.accel, fresh.accel),
            },
        };
        self.last = Some(out);
        out
    }

    /// Last transmitted value, zero before the first reading.
    pub fn last(&self) -> MotionData {
        self.last.unwrap_or_default()
    }
}

impl Default for MotionBlender {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(a: [i16; 3], b: [i16; 3]) -> [i16; 3] {
    [0, 1, 2].map(|i| ((a[i] as i32 + b[i] as i32) / 2) as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_double_pass_through() {
        assert_eq!(SensorValue::Int(-3).normalize(), -3.0);
        assert_eq!(SensorValue::Double(0.25).normalize(), 0.25);
    }

    #[test]
    fn micro_part_is_scaled() {
        let g = SensorValue::IntPlusMicro { val1: 9, val2: 806_650 };
        assert!((g.normalize() - 9.80665).abs() < 1e-12);
        assert_eq!(g.to_milli(), 9807);
    }

    #[test]
    fn sign_carry_representations_agree() {
        let folded = SensorValue::IntPlusMicro { val1: -1, val2: 500_000 };
        let split = SensorValue::IntPlusMicro { val1: 0, val2: -500_000 };
        assert!((folded.normalize() + 0.5).abs() < 1e-12);
        assert!((split.normalize() + 0.5).abs() < 1e-12);
        assert_eq!(folded.to_milli(), -500);
        assert_eq!(SensorValue::from_micros(-500_000), split);
    }

    #[test]
    fn narrowing_saturates() {
        assert_eq!(SensorValue::Double(40.0).to_milli(), i16::MAX);
        assert_eq!(SensorValue::Int(-40).to_milli(), i16::MIN);
        assert_eq!(SensorValue::Double(f64::NAN).to_milli(), 0);
        assert_eq!(SensorValue::from_micros(36_504_000).to_centi(), 3650);
    }

    #[test]
    fn blender_averages_with_previous_output() {
        let mut blender = MotionBlender::new();
        let zero = [SensorValue::Int(0); 3];
        let first = blender.blend(&[SensorValue::Int(1); 3], &zero);
        assert_eq!(first.gyro, [1000; 3]);

        let second = blender.blend(&[SensorValue::Int(0); 3], &[SensorValue::Double(-0.1); 3]);
        assert_eq!(second.gyro, [500; 3]);
        assert_eq!(second.accel, [-50; 3]);
        assert_eq!(blender.last(), second);
    }
}
