//! Peak-following beat detector for the conditioned IR signal.
//!
//! The threshold rides up each pulse, a beat is confirmed once the signal
//! falls a fixed margin below the followed peak, and between pulses the
//! threshold decays so the next (possibly weaker) pulse is caught.

use crate::config::{
    BEATDETECTOR_BPFILTER_ALPHA, BEATDETECTOR_INIT_HOLDOFF_MS, BEATDETECTOR_INVALID_READOUT_DELAY_MS,
    BEATDETECTOR_MASKING_HOLDOFF_MS, BEATDETECTOR_MAX_THRESHOLD, BEATDETECTOR_MIN_THRESHOLD,
    BEATDETECTOR_STEP_RESILIENCY, BEATDETECTOR_THRESHOLD_DECAY_FACTOR,
    BEATDETECTOR_THRESHOLD_FALLOFF_TARGET, SAMPLE_PERIOD_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectorState {
    Init,
    Waiting,
    FollowingSlope,
    MaybeDetected,
    Masking,
}

pub struct BeatDetector {
    state: DetectorState,
    threshold: f32,
    /// Smoothed inter-beat interval (ms), 0 when unknown
    beat_period: f32,
    last_max_value: f32,
    ts_last_beat: u32,
    /// Start of the init hold-off, latched on the first sample after a reset
    init_since: Option<u32>,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self {
            state: DetectorState::Init,
            threshold: BEATDETECTOR_MIN_THRESHOLD,
            beat_period: 0.0,
            last_max_value: 0.0,
            ts_last_beat: 0,
            init_since: None,
        }
    }

    /// Feed one conditioned sample taken at `now_ms`. Returns `true` on a confirmed beat.
    pub fn sample(&mut self, now_ms: u32, value: f32) -> bool {
        let mut beat_detected = false;

        match self.state {
            DetectorState::Init => {
                let since = *self.init_since.get_or_insert(now_ms);
                if now_ms.wrapping_sub(since) > BEATDETECTOR_INIT_HOLDOFF_MS {
                    self.state = DetectorState::Waiting;
                }
            }

            DetectorState::Waiting => {
                if value > self.threshold {
                    self.threshold = value.min(BEATDETECTOR_MAX_THRESHOLD);
                    self.state = DetectorState::FollowingSlope;
                }

                // Tracking lost
                if now_ms.wrapping_sub(self.ts_last_beat) > BEATDETECTOR_INVALID_READOUT_DELAY_MS {
                    self.beat_period = 0.0;
                    self.last_max_value = 0.0;
                }

                self.decrease_threshold();
            }

            DetectorState::FollowingSlope => {
                if value < self.threshold {
                    self.state = DetectorState::MaybeDetected;
                } else {
                    self.threshold = value.min(BEATDETECTOR_MAX_THRESHOLD);
                }
            }

            DetectorState::MaybeDetected => {
                if value + BEATDETECTOR_STEP_RESILIENCY < self.threshold {
                    beat_detected = true;
                    self.last_max_value = value;
                    self.state = DetectorState::Masking;

                    let delta = now_ms.wrapping_sub(self.ts_last_beat);
                    if delta != 0 {
                        self.beat_period = BEATDETECTOR_BPFILTER_ALPHA * delta as f32
                            + (1.0 - BEATDETECTOR_BPFILTER_ALPHA) * self.beat_period;
                    }
                    self.ts_last_beat = now_ms;
                } else {
                    self.state = DetectorState::FollowingSlope;
                }
            }

            DetectorState::Masking => {
                if now_ms.wrapping_sub(self.ts_last_beat) > BEATDETECTOR_MASKING_HOLDOFF_MS {
                    self.state = DetectorState::Waiting;
                }
                self.decrease_threshold();
            }
        }

        beat_detected
    }

    /// Instantaneous rate (bpm), 0 without lock.
    pub fn rate(&self) -> f32 {
        if self.beat_period != 0.0 {
            60_000.0 / self.beat_period
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.beat_period = 0.0;
        self.last_max_value = 0.0;
        self.state = DetectorState::Init;
        self.init_since = None;
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn beat_period(&self) -> f32 {
        self.beat_period
    }

    pub fn last_max_value(&self) -> f32 {
        self.last_max_value
    }

    fn decrease_threshold(&mut self) {
        if self.last_max_value > 0.0 && self.beat_period > 0.0 {
            // Reach FALLOFF_TARGET of the last peak after one beat period
            self.threshold -= self.last_max_value * (1.0 - BEATDETECTOR_THRESHOLD_FALLOFF_TARGET)
                / (self.beat_period / SAMPLE_PERIOD_MS as f32);
        } else {
            self.threshold *= BEATDETECTOR_THRESHOLD_DECAY_FACTOR;
        }

        if self.threshold < BEATDETECTOR_MIN_THRESHOLD {
            self.threshold = BEATDETECTOR_MIN_THRESHOLD;
        }
    }
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    const PERIOD_MS: u32 = 800;

    fn pulse(t_ms: u32) -> f32 {
        100.0 * (2.0 * PI * (t_ms % PERIOD_MS) as f32 / PERIOD_MS as f32).sin()
    }

    /// Runs the detector over `[from, to)` and returns the beat timestamps.
    fn run(det: &mut BeatDetector, from: u32, to: u32, signal: impl Fn(u32) -> f32) -> Vec<u32> {
        let mut beats = Vec::new();
        let mut t = from;
        while t < to {
            if det.sample(t, signal(t)) {
                beats.push(t);
            }
            t += SAMPLE_PERIOD_MS;
        }
        beats
    }

    #[test]
    fn holds_in_init_until_holdoff() {
        let mut det = BeatDetector::new();
        let beats = run(&mut det, 0, BEATDETECTOR_INIT_HOLDOFF_MS, pulse);
        assert!(beats.is_empty());
        assert_eq!(det.state(), DetectorState::Init);
        det.sample(BEATDETECTOR_INIT_HOLDOFF_MS + SAMPLE_PERIOD_MS, 0.0);
        assert_eq!(det.state(), DetectorState::Waiting);
    }

    #[test]
    fn one_beat_per_period() {
        let mut det = BeatDetector::new();
        run(&mut det, 0, 8_000, pulse);

        let beats = run(&mut det, 8_000, 8_000 + 10 * PERIOD_MS, pulse);
        assert_eq!(beats.len(), 10);
        for pair in beats.windows(2) {
            assert_eq!(pair[1] - pair[0], PERIOD_MS);
        }

        run(&mut det, 16_000, 30_000, pulse);
        let bpm = det.rate();
        assert!((bpm - 75.0).abs() < 0.5, "bpm {}", bpm);
    }

    #[test]
    fn threshold_stays_clamped() {
        let mut det = BeatDetector::new();
        let loud = |t: u32| 5_000.0 * (2.0 * PI * (t % PERIOD_MS) as f32 / PERIOD_MS as f32).sin();
        let mut t = 0;
        while t < 20_000 {
            det.sample(t, loud(t));
            let th = det.threshold();
            assert!(
                (BEATDETECTOR_MIN_THRESHOLD..=BEATDETECTOR_MAX_THRESHOLD).contains(&th),
                "threshold {} at {}",
                th,
                t
            );
            t += SAMPLE_PERIOD_MS;
        }
    }

    #[test]
    fn single_sample_dip_is_not_a_beat() {
        let mut det = BeatDetector::new();
        run(&mut det, 0, 2_100, |_| 0.0);
        assert_eq!(det.state(), DetectorState::Waiting);

        det.sample(2_110, 200.0);
        assert_eq!(det.state(), DetectorState::FollowingSlope);
        // small dip only
        assert!(!det.sample(2_120, 190.0));
        assert_eq!(det.state(), DetectorState::MaybeDetected);
        assert!(!det.sample(2_130, 195.0));
        assert_eq!(det.state(), DetectorState::FollowingSlope);
        // a real fall below threshold - resiliency
        assert!(!det.sample(2_140, 150.0));
        assert!(det.sample(2_150, 150.0));
        assert_eq!(det.state(), DetectorState::Masking);
    }

    #[test]
    fn lost_lock_clears_period_and_peak() {
        let mut det = BeatDetector::new();
        run(&mut det, 0, 10_000, pulse);
        assert!(det.beat_period() > 0.0);
        assert!(det.last_max_value() > 0.0);

        run(&mut det, 10_000, 10_000 + BEATDETECTOR_INVALID_READOUT_DELAY_MS + 500, |_| 0.0);
        assert_eq!(det.beat_period(), 0.0);
        assert_eq!(det.last_max_value(), 0.0);
        assert_eq!(det.rate(), 0.0);
    }

    #[test]
    fn reset_restarts_holdoff() {
        let mut det = BeatDetector::new();
        run(&mut det, 0, 10_000, pulse);
        det.reset();
        assert_eq!(det.state(), DetectorState::Init);
        assert_eq!(det.rate(), 0.0);
        let beats = run(&mut det, 10_000, 10_000 + BEATDETECTOR_INIT_HOLDOFF_MS, pulse);
        assert!(beats.is_empty());
    }
}
