//! Telemetry relay (sensor side) and consumer (radio side).

use crate::config::HEARTRATE_AVERAGE_COUNT;
use crate::error::{ChannelError, DecodeError};
use crate::link::{Publisher, TelemetryLink};
use crate::state::{MotionData, TelemetrySnapshot, VitalsData};

// ── Producer ──────────────────────────────────────────────────────────────────

/// Composes one snapshot per relay cycle and hands it to the link.
pub struct TelemetryRelay<L: TelemetryLink> {
    link: L,
    sent: u32,
    dropped: u32,
}

impl<L: TelemetryLink> TelemetryRelay<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            sent: 0,
            dropped: 0,
        }
    }

    /// Builds a fresh snapshot from the latest values and sends it as one frame.
    /// A rejected frame is dropped; the next cycle carries newer values anyway.
    pub fn relay(
        &mut self,
        vitals: VitalsData,
        temperature: i16,
        motion: MotionData,
    ) -> Result<TelemetrySnapshot, ChannelError> {
        let snapshot = TelemetrySnapshot::new(vitals, temperature, motion);
        match self.link.send_frame(snapshot.to_bytes()) {
            Ok(()) => {
                self.sent = self.sent.wrapping_add(1);
                trace!("relay: hr={} spo2={} t={}", snapshot.heartrate, snapshot.spo2, snapshot.temperature);
                Ok(snapshot)
            }
            Err(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("relay: snapshot dropped: {}", e);
                Err(e)
            }
        }
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

// ── Consumer ──────────────────────────────────────────────────────────────────

/// Last `HEARTRATE_AVERAGE_COUNT` heart-rate readings, overwritten oldest first.
pub struct HeartRateHistory {
    slots: [u8; HEARTRATE_AVERAGE_COUNT],
    pos: usize,
    len: usize,
}

impl HeartRateHistory {
    pub const fn new() -> Self {
        Self {
            slots: [0; HEARTRATE_AVERAGE_COUNT],
            pos: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, bpm: u8) {
        self.slots[self.pos] = bpm;
        self.pos = (self.pos + 1) % HEARTRATE_AVERAGE_COUNT;
        self.len = (self.len + 1).min(HEARTRATE_AVERAGE_COUNT);
    }

    /// Mean of the window once it holds `HEARTRATE_AVERAGE_COUNT` nonzero readings.
    pub fn mean(&self) -> Option<u8> {
        if self.len < HEARTRATE_AVERAGE_COUNT || self.slots.contains(&0) {
            return None;
        }
        let sum: u32 = self.slots.iter().map(|&b| b as u32).sum();
        Some((sum / HEARTRATE_AVERAGE_COUNT as u32) as u8)
    }
}

impl Default for HeartRateHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Radio-side receiver: invoked once per arriving frame.
pub struct TelemetryConsumer<P: Publisher> {
    history: HeartRateHistory,
    publisher: P,
}

impl<P: Publisher> TelemetryConsumer<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            history: HeartRateHistory::new(),
            publisher,
        }
    }

    pub fn on_receive(&mut self, frame: &[u8]) -> Result<(), DecodeError> {
        let snapshot = TelemetrySnapshot::from_bytes(frame).inspect_err(|e| {
            warn!("consumer: {}", e);
        })?;
        self.on_snapshot(&snapshot);
        Ok(())
    }

    pub fn on_snapshot(&mut self, snapshot: &TelemetrySnapshot) {
        self.history.push(snapshot.heartrate);
        if let Some(mean) = self.history.mean() {
            self.publisher.publish_heart_rate(mean);
        }
        self.publisher
            .publish_oxygen(snapshot.spo2 as u16, snapshot.heartrate as u16);
        self.publisher.publish_temperature(snapshot.temperature);
        self.publisher.publish_motion(snapshot.gyro, snapshot.accel);
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }
}
