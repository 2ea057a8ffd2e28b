//! Signal processing stages and device drivers.

pub mod beat_detector;
pub mod filter;
pub mod gatt;
pub mod icm42688;
pub mod max30100;
pub mod motion;
pub mod pulse_oximeter;
pub mod pulse_sensor;
pub mod spo2;

use crate::config::LedCurrent;
use crate::error::SensorError;
use crate::state::OpticalSample;

use self::motion::MotionSample;

/// PPG front end: yields IR/red pairs and accepts LED drive changes.
pub trait OpticalSensor {
    fn sample(&mut self) -> Result<OpticalSample, SensorError>;
    fn configure(&mut self, ir: LedCurrent, red: LedCurrent) -> Result<(), SensorError>;
}

/// Die-temperature sensor with a start/collect conversion cycle.
pub trait DieTemperature {
    fn start_temperature_sampling(&mut self) -> Result<(), SensorError>;
    /// `Err(NotReady)` until the conversion started last has finished.
    fn read_temperature_centi(&mut self) -> Result<i16, SensorError>;
}

pub trait MotionSensor {
    fn sample(&mut self) -> Result<MotionSample, SensorError>;
}
