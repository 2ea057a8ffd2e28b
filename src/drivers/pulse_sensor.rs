//! Peak/trough heart-rate estimator for a bare analog pulse sensor (12-bit ADC).

use crate::config::{
    PULSE_SENSOR_BPM_NUMERATOR, PULSE_SENSOR_LOST_LOCK_MS, PULSE_SENSOR_MAX_GAP_MS,
    PULSE_SENSOR_MIDSCALE, PULSE_SENSOR_MIN_GAP_MS, PULSE_SENSOR_SAMPLE_PERIOD_MS,
    PULSE_SENSOR_SEED_IBI_MS, PULSE_SENSOR_SEED_THRESHOLD,
};

const RATE_SLOTS: usize = 10;

pub struct PulseSensorEstimator {
    /// Last inter-beat interval (ms)
    ibi_ms: u32,
    /// Recent inter-beat intervals in sample ticks, oldest first
    rate: [u32; RATE_SLOTS],
    /// `true` between the upward threshold crossing and the fall back below it
    pulse: bool,
    last_beat_ms: u32,
    peak: u32,
    trough: u32,
    threshold: u32,
    first_beat: bool,
    second_beat: bool,
    bpm: u32,
}

impl PulseSensorEstimator {
    pub fn new(now_ms: u32) -> Self {
        Self {
            ibi_ms: PULSE_SENSOR_SEED_IBI_MS,
            rate: [0; RATE_SLOTS],
            pulse: false,
            last_beat_ms: now_ms,
            peak: PULSE_SENSOR_MIDSCALE,
            trough: PULSE_SENSOR_MIDSCALE,
            threshold: PULSE_SENSOR_SEED_THRESHOLD,
            first_beat: true,
            second_beat: false,
            bpm: 0,
        }
    }

    /// Feed one ADC reading. Returns the new rate (bpm) when a counted beat lands.
    pub fn measure(&mut self, now_ms: u32, signal: u32) -> Option<u32> {
        let mut result = None;
        let n = now_ms.wrapping_sub(self.last_beat_ms);
        // dicrotic notch guard: 3/5 of the last interval
        let settled = n > (self.ibi_ms / 5) * 3;

        if signal < self.threshold && settled && signal < self.trough {
            self.trough = signal;
        }
        if signal > self.threshold && signal > self.peak {
            self.peak = signal;
        }

        if n > PULSE_SENSOR_MIN_GAP_MS
            && n < PULSE_SENSOR_MAX_GAP_MS
            && signal > self.threshold
            && !self.pulse
            && settled
        {
            self.pulse = true;
            self.ibi_ms = n;
            self.last_beat_ms = now_ms;
            result = self.on_beat();
        }

        if signal < self.threshold && self.pulse {
            self.pulse = false;
            let amp = self.peak.saturating_sub(self.trough);
            self.threshold = amp * 2 / 3 + self.trough;
            self.peak = self.threshold;
            self.trough = self.threshold;
        }

        if n > PULSE_SENSOR_LOST_LOCK_MS {
            debug!("pulse sensor: no beat for {} ms, reseeding", n);
            self.threshold = PULSE_SENSOR_MIDSCALE;
            self.peak = PULSE_SENSOR_MIDSCALE;
            self.trough = PULSE_SENSOR_MIDSCALE;
            self.last_beat_ms = now_ms;
            self.first_beat = true;
            self.second_beat = false;
        }

        result
    }

    /// Latest rate (bpm), 0 until two beats have been seen.
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    fn on_beat(&mut self) -> Option<u32> {
        let ibi_ticks = self.ibi_ms / PULSE_SENSOR_SAMPLE_PERIOD_MS;

        if self.second_beat {
            self.second_beat = false;
            self.rate = [ibi_ticks; RATE_SLOTS];
        }
        if self.first_beat {
            // interval to an arbitrary start point, discard
            self.first_beat = false;
            self.second_beat = true;
            return None;
        }

        self.rate.copy_within(1.., 0);
        self.rate[RATE_SLOTS - 1] = ibi_ticks;
        let mean = self.rate.iter().sum::<u32>() / RATE_SLOTS as u32;
        if mean == 0 {
            return None;
        }
        self.bpm = PULSE_SENSOR_BPM_NUMERATOR / mean;
        Some(self.bpm)
    }
}
