//! Shared state types for inter-task and inter-processor communication.
//!
//! All types are `Copy` to minimise overhead when sent through channels.
use crate::error::DecodeError;

// ── Sensor samples ────────────────────────────────────────────────────────────

/// One FIFO entry of the optical sensor, raw 16-bit left-aligned counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpticalSample {
    pub ir: u16,
    pub red: u16,
}

/// Gyro and accel triplets in milli-units (mrad/s, mm/s²), ready for transmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionData {
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
}

/// Latest output of the heart-rate path (beat detector + SpO2, or threshold estimator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VitalsData {
    pub heartrate: u8,
    pub spo2: u8,
}

// ── Telemetry snapshot ────────────────────────────────────────────────────────

/// Fixed-layout record crossing the processor boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    pub heartrate: u8,
    /// percent, 0..=100
    pub spo2: u8,
    /// hundredths of °C
    pub temperature: i16,
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
}

/// Encoded snapshot: u8, u8, then seven i16, little-endian, no padding.
pub const SNAPSHOT_LEN: usize = 16;

pub type SnapshotFrame = [u8; SNAPSHOT_LEN];

impl TelemetrySnapshot {
    pub fn new(vitals: VitalsData, temperature: i16, motion: MotionData) -> Self {
        Self {
            heartrate: vitals.heartrate,
            spo2: vitals.spo2,
            temperature,
            gyro: motion.gyro,
            accel: motion.accel,
        }
    }

    pub fn motion(&self) -> MotionData {
        MotionData {
            gyro: self.gyro,
            accel: self.accel,
        }
    }

    pub fn to_bytes(&self) -> SnapshotFrame {
        let mut buf = [0u8; SNAPSHOT_LEN];
        buf[0] = self.heartrate;
        buf[1] = self.spo2;
        buf[2..4].copy_from_slice(&self.temperature.to_le_bytes());
        let words = self.gyro.iter().chain(self.accel.iter());
        for (i, w) in words.enumerate() {
            let at = 4 + 2 * i;
            buf[at..at + 2].copy_from_slice(&w.to_le_bytes());
        }
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != SNAPSHOT_LEN {
            return Err(DecodeError::Length {
                expected: SNAPSHOT_LEN,
                actual: buf.len(),
            });
        }
        let word = |i: usize| i16::from_le_bytes([buf[4 + 2 * i], buf[5 + 2 * i]]);
        Ok(Self {
            heartrate: buf[0],
            spo2: buf[1],
            temperature: i16::from_le_bytes([buf[2], buf[3]]),
            gyro: [word(0), word(1), word(2)],
            accel: [word(3), word(4), word(5)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> TelemetrySnapshot {
        TelemetrySnapshot::new(
            VitalsData { heartrate: 72, spo2: 98 },
            3650,
            MotionData {
                gyro: [10, -5, 0],
                accel: [0, 0, 1000],
            },
        )
    }

    #[test]
    fn snapshot_wire_layout() {
        let bytes = reference().to_bytes();
        assert_eq!(
            bytes,
            [
                72, 98, // heartrate, spo2
                0x42, 0x0E, // 3650
                0x0A, 0x00, 0xFB, 0xFF, 0x00, 0x00, // gyro 10, -5, 0
                0x00, 0x00, 0x00, 0x00, 0xE8, 0x03, // accel 0, 0, 1000
            ]
        );
    }

    #[test]
    fn decode_matches_encoder() {
        let snap = reference();
        assert_eq!(TelemetrySnapshot::from_bytes(&snap.to_bytes()), Ok(snap));
    }

    #[test]
    fn decode_rejects_short_frame() {
        let bytes = reference().to_bytes();
        assert_eq!(
            TelemetrySnapshot::from_bytes(&bytes[..15]),
            Err(DecodeError::Length {
                expected: 16,
                actual: 15
            })
        );
    }
}
