//! Tuning constants and the runtime pipeline configuration.

// ── Optical sampling ──────────────────────────────────────────────────────────

/// PPG sampling rate (Hz)
pub const SAMPLING_FREQUENCY_HZ: u32 = 100;
/// PPG sample period (ms)
pub const SAMPLE_PERIOD_MS: u32 = 1000 / SAMPLING_FREQUENCY_HZ;

// ── Signal conditioner ────────────────────────────────────────────────────────

/// DC remover pole
pub const DC_REMOVER_ALPHA: f32 = 0.95;

// ── Beat detector ─────────────────────────────────────────────────────────────

/// Filters settle for this long after a reset before the signal is trusted (ms)
pub const BEATDETECTOR_INIT_HOLDOFF_MS: u32 = 2000;
/// Refractory period after a confirmed beat (ms)
pub const BEATDETECTOR_MASKING_HOLDOFF_MS: u32 = 200;
/// Exponential filter weight of the newest inter-beat interval
pub const BEATDETECTOR_BPFILTER_ALPHA: f32 = 0.6;
pub const BEATDETECTOR_MIN_THRESHOLD: f32 = 20.0;
pub const BEATDETECTOR_MAX_THRESHOLD: f32 = 800.0;
/// Drop below the followed peak needed to confirm a beat
pub const BEATDETECTOR_STEP_RESILIENCY: f32 = 30.0;
/// Fraction of the last peak the threshold aims for after one beat period
pub const BEATDETECTOR_THRESHOLD_FALLOFF_TARGET: f32 = 0.3;
/// Asymptotic decay used while no rate is known
pub const BEATDETECTOR_THRESHOLD_DECAY_FACTOR: f32 = 0.99;
/// No beat for this long means lock is lost (ms)
pub const BEATDETECTOR_INVALID_READOUT_DELAY_MS: u32 = 2000;

// ── SpO2 estimator ────────────────────────────────────────────────────────────

pub const CALCULATE_EVERY_N_BEATS: u8 = 3;

// ── Pulse oximeter ────────────────────────────────────────────────────────────

/// Red LED current follower period (ms)
pub const CURRENT_ADJUSTMENT_PERIOD_MS: u32 = 500;
/// DC baseline mismatch that triggers a red LED current step
pub const CURRENT_ADJUSTMENT_DC_DELTA: f32 = 70_000.0;
/// Die temperature poll period (ms)
pub const TEMPERATURE_SAMPLING_PERIOD_MS: u32 = 10_000;

// ── Threshold heart-rate estimator (analog pulse sensor) ──────────────────────

/// ADC sample period of the analog pulse sensor (ms)
pub const PULSE_SENSOR_SAMPLE_PERIOD_MS: u32 = 2;
/// Mid-scale of the 12-bit ADC; peak, trough and threshold reset here
pub const PULSE_SENSOR_MIDSCALE: u32 = 2048;
/// Threshold used before the first amplitude is known
pub const PULSE_SENSOR_SEED_THRESHOLD: u32 = 2100;
/// Seed inter-beat interval (ms)
pub const PULSE_SENSOR_SEED_IBI_MS: u32 = 600;
/// Beats closer than this are noise (ms)
pub const PULSE_SENSOR_MIN_GAP_MS: u32 = 250;
/// Beats further apart than this are not counted (ms)
pub const PULSE_SENSOR_MAX_GAP_MS: u32 = 2000;
/// Silence longer than this resets the estimator (ms)
pub const PULSE_SENSOR_LOST_LOCK_MS: u32 = 2500;
/// `bpm = PULSE_SENSOR_BPM_NUMERATOR / mean(IBI in sample ticks)`
pub const PULSE_SENSOR_BPM_NUMERATOR: u32 = 30_000;

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// Relay cadence of the PPG image (ms)
pub const RELAY_PERIOD_MS: u64 = 500;
/// Relay cadence of the analog pulse sensor image (ms)
pub const PULSE_SENSOR_RELAY_PERIOD_MS: u64 = 320;
/// Slots of the consumer's heart-rate history
pub const HEARTRATE_AVERAGE_COUNT: usize = 10;
/// Inertial poll period (ms)
pub const MOTION_POLL_PERIOD_MS: u64 = 50;

// ── Runtime configuration ─────────────────────────────────────────────────────

/// LED drive current, one of the sixteen MAX30100 levels (0 = 0 mA, 15 = 50 mA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LedCurrent(u8);

impl LedCurrent {
    pub const OFF: Self = Self(0x00);
    pub const MA_27_1: Self = Self(0x08);
    pub const MA_50: Self = Self(0x0F);

    /// Clamps `level` to the 4-bit register field.
    pub const fn new(level: u8) -> Self {
        if level > 0x0F {
            Self(0x0F)
        } else {
            Self(level)
        }
    }

    pub const fn level(self) -> u8 {
        self.0
    }

    pub fn step_up(self) -> Self {
        Self::new(self.0.saturating_add(1))
    }

    pub fn step_down(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

/// Settings handed by `main` to the sensor task.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub relay_period_ms: u64,
    pub motion_poll_period_ms: u64,
    pub temperature_period_ms: u32,
    pub ir_led_current: LedCurrent,
    pub red_led_current: LedCurrent,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            relay_period_ms: RELAY_PERIOD_MS,
            motion_poll_period_ms: MOTION_POLL_PERIOD_MS,
            temperature_period_ms: TEMPERATURE_SAMPLING_PERIOD_MS,
            ir_led_current: LedCurrent::MA_50,
            red_led_current: LedCurrent::MA_27_1,
        }
    }
}

impl PipelineConfig {
    /// Configuration of the reduced image with an analog pulse sensor.
    pub fn pulse_sensor() -> Self {
        Self {
            relay_period_ms: PULSE_SENSOR_RELAY_PERIOD_MS,
            ..Self::default()
        }
    }
}
