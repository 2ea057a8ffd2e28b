//! Radio notification payloads and the framed byte stream handed to the radio.
//!
//! Frame: [Sync] [Len] [Characteristic] [Payload...] [CRC]
//! Len counts Characteristic, Payload and CRC. CRC-8 (poly 0xD5) covers
//! Characteristic and Payload.

use heapless::{Deque, Vec};

use crate::link::Publisher;

pub const NOTIFY_SYNC: u8 = 0xA5;
pub const MAX_NOTIFICATION_LEN: usize = 16;
pub const NOTIFICATION_QUEUE_DEPTH: usize = 8;

/// SFLOAT "not a number", sent for values outside the 12-bit mantissa.
pub const SFLOAT_NAN: u16 = 0x07FF;

pub type Notification = Vec<u8, MAX_NOTIFICATION_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Characteristic {
    /// 0x2A37
    HeartRate = 0x01,
    /// 0x2A5F
    PlxContinuous = 0x02,
    /// 0x2A6E
    Temperature = 0x03,
    Gyro = 0x04,
    Accel = 0x05,
}

/// Heart Rate Measurement: flags (u8 format, no contact info), bpm.
pub fn heart_rate_payload(bpm: u8) -> [u8; 2] {
    [0x00, bpm]
}

/// PLX Continuous Measurement: flags, SpO2 and pulse rate as SFLOAT.
pub fn plx_continuous_payload(spo2: u16, pulse_rate: u16) -> [u8; 5] {
    let s = sfloat(spo2).to_le_bytes();
    let p = sfloat(pulse_rate).to_le_bytes();
    [0x00, s[0], s[1], p[0], p[1]]
}

/// Temperature in hundredths of a degree.
pub fn temperature_payload(centi_celsius: i16) -> [u8; 2] {
    centi_celsius.to_le_bytes()
}

pub fn axes_payload(axes: [i16; 3]) -> [u8; 6] {
    let mut out = [0u8; 6];
    for (chunk, v) in out.chunks_exact_mut(2).zip(axes) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
    out
}

/// Integer as IEEE-11073 SFLOAT with a zero exponent.
pub fn sfloat(value: u16) -> u16 {
    if value > 0x07FD {
        SFLOAT_NAN
    } else {
        value
    }
}

pub fn build_notification(characteristic: Characteristic, payload: &[u8]) -> Option<Notification> {
    // Characteristic + CRC
    let len = payload.len() + 2;
    if len + 2 > MAX_NOTIFICATION_LEN {
        return None;
    }

    let mut frame = Notification::new();
    frame.push(NOTIFY_SYNC).ok()?;
    frame.push(len as u8).ok()?;
    frame.push(characteristic as u8).ok()?;
    frame.extend_from_slice(payload).ok()?;
    let crc = calc_crc8(&frame[2..]);
    frame.push(crc).ok()?;
    Some(frame)
}

fn calc_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ 0xD5;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Pending notifications, drained by whatever owns the radio. When full the
/// oldest notification is discarded.
pub struct NotificationQueue {
    pending: Deque<Notification, NOTIFICATION_QUEUE_DEPTH>,
    overflowed: u32,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self {
            pending: Deque::new(),
            overflowed: 0,
        }
    }

    pub fn pop(&mut self) -> Option<Notification> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn overflowed(&self) -> u32 {
        self.overflowed
    }

    fn enqueue(&mut self, characteristic: Characteristic, payload: &[u8]) {
        let Some(frame) = build_notification(characteristic, payload) else {
            return;
        };
        if self.pending.is_full() {
            self.pending.pop_front();
            self.overflowed = self.overflowed.wrapping_add(1);
        }
        let _ = self.pending.push_back(frame);
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for NotificationQueue {
    fn publish_heart_rate(&mut self, bpm: u8) {
        self.enqueue(Characteristic::HeartRate, &heart_rate_payload(bpm));
    }

    fn publish_oxygen(&mut self, spo2: u16, pulse_rate: u16) {
        self.enqueue(
            Characteristic::PlxContinuous,
            &plx_continuous_payload(spo2, pulse_rate),
        );
    }

    fn publish_temperature(&mut self, centi_celsius: i16) {
        self.enqueue(Characteristic::Temperature, &temperature_payload(centi_celsius));
    }

    fn publish_motion(&mut self, gyro: [i16; 3], accel: [i16; 3]) {
        self.enqueue(Characteristic::Gyro, &axes_payload(gyro));
        self.enqueue(Characteristic::Accel, &axes_payload(accel));
    }
}
