//! Boundaries of the telemetry path: the inter-processor channel on the
//! producer side and the radio publications on the consumer side.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;

use crate::error::ChannelError;
use crate::state::SnapshotFrame;

/// Producer end of the inter-processor channel. Frames are self-contained.
pub trait TelemetryLink {
    fn send_frame(&mut self, frame: SnapshotFrame) -> Result<(), ChannelError>;
}

/// Never waits: a full channel rejects the frame and the next relay cycle supersedes it.
impl<'ch, M: RawMutex, const N: usize> TelemetryLink for Sender<'ch, M, SnapshotFrame, N> {
    fn send_frame(&mut self, frame: SnapshotFrame) -> Result<(), ChannelError> {
        self.try_send(frame).map_err(|_| ChannelError::Full)
    }
}

/// Outward broadcast characteristics exposed to the radio stack.
pub trait Publisher {
    fn publish_heart_rate(&mut self, bpm: u8);
    fn publish_oxygen(&mut self, spo2: u16, pulse_rate: u16);
    fn publish_temperature(&mut self, centi_celsius: i16);
    fn publish_motion(&mut self, gyro: [i16; 3], accel: [i16; 3]);
}
