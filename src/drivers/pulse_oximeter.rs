//! Optical pipeline: DC removal on both channels, beat detection on the
//! low-passed IR signal, SpO2 from the AC energy of the pair.

use crate::config::{
    LedCurrent, CURRENT_ADJUSTMENT_DC_DELTA, CURRENT_ADJUSTMENT_PERIOD_MS, DC_REMOVER_ALPHA,
};
use crate::drivers::beat_detector::BeatDetector;
use crate::drivers::filter::{BeatLowPass, DcRemover};
use crate::drivers::spo2::SpO2Calculator;
use crate::drivers::{DieTemperature, OpticalSensor};
use crate::error::SensorError;
use crate::state::{OpticalSample, VitalsData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OximeterState {
    Init,
    Idle,
    Detecting,
}

pub struct PulseOximeter {
    state: OximeterState,
    ir_dc: DcRemover,
    red_dc: DcRemover,
    beat_filter: BeatLowPass,
    detector: BeatDetector,
    spo2: SpO2Calculator,
    red_led_current: LedCurrent,
    ts_last_bias_check: u32,
    vitals: VitalsData,
}

impl PulseOximeter {
    pub fn new(red_led_current: LedCurrent) -> Self {
        Self {
            state: OximeterState::Init,
            ir_dc: DcRemover::new(DC_REMOVER_ALPHA),
            red_dc: DcRemover::new(DC_REMOVER_ALPHA),
            beat_filter: BeatLowPass::new(),
            detector: BeatDetector::new(),
            spo2: SpO2Calculator::new(),
            red_led_current,
            ts_last_bias_check: 0,
            vitals: VitalsData::default(),
        }
    }

    /// Called once the sensor is configured; the detector hold-off starts here.
    pub fn begin(&mut self) {
        self.beat_filter.reset();
        self.detector.reset();
        self.state = OximeterState::Idle;
    }

    /// Feeds one IR/red pair. Returns true on a confirmed beat.
    pub fn update(&mut self, now_ms: u32, sample: OpticalSample) -> bool {
        let ir_ac = self.ir_dc.filter(sample.ir as f32);
        let red_ac = self.red_dc.filter(sample.red as f32);

        // pulses show as dips in reflected IR
        let beat_sample = self.beat_filter.filter(-ir_ac);
        let beat = self.detector.sample(now_ms, beat_sample);
        let rate = self.detector.rate();

        if rate > 0.0 {
            self.state = OximeterState::Detecting;
            self.spo2.update(ir_ac, red_ac, beat);

            if beat {
                self.vitals = VitalsData {
                    heartrate: rate as u8,
                    spo2: self.spo2.spo2(),
                };
                info!(
                    "beat: {} bpm, SpO2 {} %",
                    self.vitals.heartrate,
                    self.vitals.spo2
                );
            }
        } else if self.state == OximeterState::Detecting {
            debug!("pulse lost");
            self.state = OximeterState::Idle;
            self.spo2.reset();
        }

        beat
    }

    /// Red LED current follower: keeps the red DC baseline near the IR one.
    /// Returns the level the red LED should move to; nothing is recorded
    /// until [`set_red_led_current`](Self::set_red_led_current).
    pub fn check_current_bias(&mut self, now_ms: u32) -> Option<LedCurrent> {
        if now_ms.wrapping_sub(self.ts_last_bias_check) <= CURRENT_ADJUSTMENT_PERIOD_MS {
            return None;
        }
        self.ts_last_bias_check = now_ms;

        let ir_dc = self.ir_dc.dc();
        let red_dc = self.red_dc.dc();
        if ir_dc - red_dc > CURRENT_ADJUSTMENT_DC_DELTA && self.red_led_current < LedCurrent::MA_50 {
            Some(self.red_led_current.step_up())
        } else if red_dc - ir_dc > CURRENT_ADJUSTMENT_DC_DELTA && self.red_led_current > LedCurrent::OFF {
            Some(self.red_led_current.step_down())
        } else {
            None
        }
    }

    /// Records the red LED current once the device accepted it.
    pub fn set_red_led_current(&mut self, current: LedCurrent) {
        info!("red LED current -> level {}", current.level());
        self.red_led_current = current;
    }

    /// Runs the follower and writes a proposed level to `sensor`. The new
    /// level is only recorded when the write succeeds; a failed write is
    /// proposed again at the next check.
    pub fn adjust_current_bias<S: OpticalSensor>(
        &mut self,
        now_ms: u32,
        sensor: &mut S,
        ir: LedCurrent,
    ) -> Result<Option<LedCurrent>, SensorError> {
        let Some(next) = self.check_current_bias(now_ms) else {
            return Ok(None);
        };
        sensor.configure(ir, next)?;
        self.set_red_led_current(next);
        Ok(Some(next))
    }

    /// Heart rate and SpO2 latched at the last confirmed beat.
    pub fn vitals(&self) -> VitalsData {
        self.vitals
    }

    pub fn state(&self) -> OximeterState {
        self.state
    }

    pub fn red_led_current(&self) -> LedCurrent {
        self.red_led_current
    }
}

/// Die-temperature polling: a conversion is started every `period_ms` and
/// collected on a later tick once the sensor reports it ready.
pub struct TemperatureSchedule {
    period_ms: u32,
    last_start_ms: Option<u32>,
    pending: bool,
}

impl TemperatureSchedule {
    pub fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_start_ms: None,
            pending: false,
        }
    }

    /// True when a new conversion should be started now; marks it pending.
    pub fn due(&mut self, now_ms: u32) -> bool {
        if self.pending {
            return false;
        }
        let due = match self.last_start_ms {
            None => true,
            Some(t) => now_ms.wrapping_sub(t) >= self.period_ms,
        };
        if due {
            self.last_start_ms = Some(now_ms);
            self.pending = true;
        }
        due
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Conversion collected or abandoned.
    pub fn complete(&mut self) {
        self.pending = false;
    }

    /// One tick of the conversion cycle. Starts a conversion when due and
    /// returns the reading once the sensor has it, in hundredths of a degree.
    /// Sampling carries on while the conversion runs.
    pub fn poll<S: DieTemperature>(&mut self, now_ms: u32, sensor: &mut S) -> Option<i16> {
        if self.pending {
            match sensor.read_temperature_centi() {
                Ok(t) => {
                    self.complete();
                    return Some(t);
                }
                Err(SensorError::NotReady) => {}
                Err(e) => {
                    debug!("temperature read: {}", e);
                    self.complete();
                }
            }
        } else if self.due(now_ms) {
            if let Err(e) = sensor.start_temperature_sampling() {
                debug!("temperature start: {}", e);
                self.complete();
            }
        }
        None
    }
}
