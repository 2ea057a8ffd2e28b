//! SpO2 from the ratio of red and IR AC energy, reduced through a calibration table.

use crate::config::CALCULATE_EVERY_N_BEATS;

/// Calibrated SpO2 (%) by ratio index.
const SPO2_LUT: [u8; 43] = [
    100, 100, 100, 100, 99, 99, 99, 99, 99, 99, 98, 98, 98, 98, 98, 97, 97, 97, 97, 97, 97, 96, 96,
    96, 96, 96, 96, 95, 95, 95, 95, 95, 95, 94, 94, 94, 94, 94, 93, 93, 93, 93, 93,
];

pub struct SpO2Calculator {
    ir_ac_sq_sum: f64,
    red_ac_sq_sum: f64,
    samples_recorded: u32,
    beats_detected: u8,
    spo2: u8,
}

impl SpO2Calculator {
    pub fn new() -> Self {
        Self {
            ir_ac_sq_sum: 0.0,
            red_ac_sq_sum: 0.0,
            samples_recorded: 0,
            beats_detected: 0,
            spo2: 0,
        }
    }

    /// Accumulates one AC sample pair. Every `CALCULATE_EVERY_N_BEATS` beats the
    /// estimate is recomputed and returned, and the accumulators start over.
    pub fn update(&mut self, ir_ac: f32, red_ac: f32, beat_detected: bool) -> Option<u8> {
        let (ir, red) = (ir_ac as f64, red_ac as f64);
        self.ir_ac_sq_sum += ir * ir;
        self.red_ac_sq_sum += red * red;
        self.samples_recorded += 1;

        if !beat_detected {
            return None;
        }

        self.beats_detected += 1;
        if self.beats_detected < CALCULATE_EVERY_N_BEATS {
            return None;
        }

        let estimate = self.estimate();
        self.clear_accumulators();
        if let Some(spo2) = estimate {
            self.spo2 = spo2;
        }
        estimate
    }

    /// Last computed value; persists until the next cycle or an external reset.
    pub fn spo2(&self) -> u8 {
        self.spo2
    }

    pub fn beats_detected(&self) -> u8 {
        self.beats_detected
    }

    pub fn samples_recorded(&self) -> u32 {
        self.samples_recorded
    }

    /// External reset (signal lost): drops the accumulators and the last value.
    pub fn reset(&mut self) {
        self.clear_accumulators();
        self.spo2 = 0;
    }

    /// `None` until the accumulated energy gives a usable ratio.
    pub fn estimate(&self) -> Option<u8> {
        if self.samples_recorded == 0 {
            return None;
        }
        let n = self.samples_recorded as f64;
        let ir_ln = ln(self.ir_ac_sq_sum / n)?;
        let red_ln = ln(self.red_ac_sq_sum / n)?;
        if ir_ln <= 0.0 {
            return None;
        }
        Some(ratio_to_spo2(100.0 * red_ln / ir_ln))
    }

    fn clear_accumulators(&mut self) {
        self.ir_ac_sq_sum = 0.0;
        self.red_ac_sq_sum = 0.0;
        self.samples_recorded = 0;
        self.beats_detected = 0;
    }
}

impl Default for SpO2Calculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Table position for an AC energy ratio (x100), clamped to the last entry.
pub fn ratio_to_index(ratio: f64) -> usize {
    let index = if ratio > 66.0 {
        (ratio as u8) - 66
    } else if ratio > 50.0 {
        (ratio as u8) - 50
    } else {
        0
    };
    (index as usize).min(SPO2_LUT.len() - 1)
}

/// Maps an AC energy ratio (x100) to a calibrated SpO2 percentage.
pub fn ratio_to_spo2(ratio: f64) -> u8 {
    SPO2_LUT[ratio_to_index(ratio)]
}

/// Natural logarithm by range reduction and the atanh series.
/// `None` for zero, negative or non-finite input.
fn ln(x: f64) -> Option<f64> {
    const LN_2: f64 = 0.693_147_180_559_945_3;
    const SQRT_2: f64 = 1.414_213_562_373_095_1;

    if x.is_nan() || x <= 0.0 || x.is_infinite() {
        return None;
    }

    // x = m * 2^e, m in [1, 2)
    let (mut x, mut e) = (x, 0i32);
    if x < f64::MIN_POSITIVE {
        x *= (1u64 << 54) as f64;
        e -= 54;
    }
    let bits = x.to_bits();
    e += ((bits >> 52) & 0x7FF) as i32 - 1023;
    let mut m = f64::from_bits((bits & 0x000F_FFFF_FFFF_FFFF) | (1023u64 << 52));
    if m > SQRT_2 {
        m *= 0.5;
        e += 1;
    }

    // ln(m) = 2 * atanh(z), |z| <= 0.172
    let z = (m - 1.0) / (m + 1.0);
    let z2 = z * z;
    let mut term = z;
    let mut sum = 0.0;
    let mut k = 1.0;
    while k < 40.0 {
        sum += term / k;
        term *= z2;
        k += 2.0;
    }

    Some(2.0 * sum + e as f64 * LN_2)
}
