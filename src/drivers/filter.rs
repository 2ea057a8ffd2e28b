//! Analog conditioning of the optical channels.

/// Single-pole high-pass removing the DC bias of one optical channel.
pub struct DcRemover {
    alpha: f32,
    w: f32,
}

impl DcRemover {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            w: 0.0,
        }
    }

    /// Returns the AC component of `raw`.
    pub fn filter(&mut self, raw: f32) -> f32 {
        let w_next = raw + self.alpha * self.w;
        let ac = w_next - self.w;
        self.w = w_next;
        ac
    }

    /// DC-tracking accumulator, proportional to the channel baseline.
    pub fn dc(&self) -> f32 {
        self.w
    }

    pub fn reset(&mut self) {
        self.w = 0.0;
    }
}

/// First order Butterworth low pass, Fs = 100 Hz, Fc = 6 Hz.
/// Coefficients are fixed; the beat detector thresholds are tuned against them.
pub struct BeatLowPass {
    v: [f32; 2],
}

impl BeatLowPass {
    const GAIN: f32 = 2.452372752527856026e-1;
    const POLE: f32 = 0.50952544949442879485;

    pub fn new() -> Self {
        Self { v: [0.0; 2] }
    }

    pub fn filter(&mut self, x: f32) -> f32 {
        self.v[0] = self.v[1];
        self.v[1] = Self::GAIN * x + Self::POLE * self.v[0];
        self.v[0] + self.v[1]
    }

    pub fn reset(&mut self) {
        self.v = [0.0; 2];
    }
}

impl Default for BeatLowPass {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DC_REMOVER_ALPHA;
    use core::f32::consts::PI;

    #[test]
    fn dc_remover_converges_to_zero_mean() {
        let mut dc = DcRemover::new(DC_REMOVER_ALPHA);
        let offset = 30_000.0f32;
        let sample = |n: usize| offset + 500.0 * (2.0 * PI * n as f32 / 80.0).sin();

        // settle for many time constants (1 / (1 - 0.95) = 20 samples)
        for n in 0..800 {
            dc.filter(sample(n));
        }
        let mut sum = 0.0f64;
        for n in 800..1600 {
            sum += dc.filter(sample(n)) as f64;
        }
        let mean = sum / 800.0;
        assert!(mean.abs() < 5.0, "residual mean {}", mean);
    }

    #[test]
    fn dc_remover_tracks_baseline() {
        let mut dc = DcRemover::new(DC_REMOVER_ALPHA);
        for _ in 0..1000 {
            dc.filter(100.0);
        }
        // steady state w = raw / (1 - alpha)
        assert!((dc.dc() - 2000.0).abs() < 1.0);
        dc.reset();
        assert_eq!(dc.dc(), 0.0);
    }

    #[test]
    fn low_pass_first_outputs() {
        let mut lp = BeatLowPass::new();
        let y0 = lp.filter(1.0);
        assert!((y0 - 0.245_237_28).abs() < 1e-6);
        let y1 = lp.filter(1.0);
        // v = [0.24523728, 0.24523728 + 0.50952545 * 0.24523728]
        assert!((y1 - 0.615_434_9).abs() < 1e-5);
    }

    #[test]
    fn low_pass_has_unity_dc_gain() {
        let mut lp = BeatLowPass::new();
        let mut y = 0.0;
        for _ in 0..200 {
            y = lp.filter(10.0);
        }
        // 2 * g / (1 - p) = 1
        assert!((y - 10.0).abs() < 1e-3);
    }
}
