//! MAX30100 pulse oximeter front end over I2C.

use embedded_hal::i2c::I2c;

use crate::config::LedCurrent;
use crate::drivers::{DieTemperature, OpticalSensor};
use crate::error::SensorError;
use crate::state::OpticalSample;

pub const ADDR: u8 = 0x57;

const REG_FIFO_WRITE_POINTER: u8 = 0x02;
const REG_FIFO_OVERFLOW_COUNTER: u8 = 0x03;
const REG_FIFO_READ_POINTER: u8 = 0x04;
/// Burst reads here do not auto-increment the address
const REG_FIFO_DATA: u8 = 0x05;
const REG_MODE_CONFIGURATION: u8 = 0x06;
const REG_SPO2_CONFIGURATION: u8 = 0x07;
const REG_LED_CONFIGURATION: u8 = 0x09;
const REG_TEMPERATURE_DATA_INT: u8 = 0x16;
const REG_REVISION_ID: u8 = 0xFE;
const REG_PART_ID: u8 = 0xFF;

const PART_ID: u8 = 0x11;

const MC_TEMP_EN: u8 = 1 << 3;
const SPC_SPO2_HI_RES_EN: u8 = 1 << 6;

/// 1/16 °C per fraction LSB
const TEMPERATURE_FRACTION_STEP: f32 = 0.0625;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    HeartRateOnly = 0x02,
    Spo2HeartRate = 0x03,
}

/// Check datasheet tables 8 and 9 for the valid rate / pulse width pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SamplingRate {
    Hz50 = 0x00,
    Hz100 = 0x01,
    Hz167 = 0x02,
    Hz200 = 0x03,
    Hz400 = 0x04,
    Hz600 = 0x05,
    Hz800 = 0x06,
    Hz1000 = 0x07,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PulseWidth {
    Us200Bits13 = 0x00,
    Us400Bits14 = 0x01,
    Us800Bits15 = 0x02,
    Us1600Bits16 = 0x03,
}

pub struct Max30100<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Max30100<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c.write(ADDR, &[reg, value]).map_err(|_| SensorError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(ADDR, &[reg], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(buf[0])
    }

    fn burst_read(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c.write_read(ADDR, &[reg], buf).map_err(|_| SensorError::Bus)
    }

    /// Checks the part id and applies SpO2 mode, 100 Hz, 1600 us pulses, high
    /// resolution and the given LED currents.
    pub fn init(&mut self, ir: LedCurrent, red: LedCurrent) -> Result<(), SensorError> {
        let part = self.read_reg(REG_PART_ID).map_err(|_| SensorError::Unavailable)?;
        if part != PART_ID {
            error!("MAX30100: unexpected part id {:x}", part);
            return Err(SensorError::Unavailable);
        }

        self.set_mode(Mode::Spo2HeartRate)?;
        self.set_leds_pulse_width(PulseWidth::Us1600Bits16)?;
        self.set_sampling_rate(SamplingRate::Hz100)?;
        self.set_leds_current(ir, red)?;
        self.set_high_res_mode_enabled(true)?;
        self.reset_fifo()?;

        let revision = self.revision_id()?;
        info!("MAX30100: revision {}", revision);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), SensorError> {
        self.write_reg(REG_MODE_CONFIGURATION, mode as u8)
    }

    pub fn set_leds_pulse_width(&mut self, width: PulseWidth) -> Result<(), SensorError> {
        let previous = self.read_reg(REG_SPO2_CONFIGURATION)?;
        self.write_reg(REG_SPO2_CONFIGURATION, (previous & 0xFC) | width as u8)
    }

    pub fn set_sampling_rate(&mut self, rate: SamplingRate) -> Result<(), SensorError> {
        let previous = self.read_reg(REG_SPO2_CONFIGURATION)?;
        self.write_reg(REG_SPO2_CONFIGURATION, (previous & 0xE3) | ((rate as u8) << 2))
    }

    pub fn set_leds_current(&mut self, ir: LedCurrent, red: LedCurrent) -> Result<(), SensorError> {
        self.write_reg(REG_LED_CONFIGURATION, red.level() << 4 | ir.level())
    }

    pub fn set_high_res_mode_enabled(&mut self, enabled: bool) -> Result<(), SensorError> {
        let previous = self.read_reg(REG_SPO2_CONFIGURATION)?;
        let value = if enabled {
            previous | SPC_SPO2_HI_RES_EN
        } else {
            previous & !SPC_SPO2_HI_RES_EN
        };
        self.write_reg(REG_SPO2_CONFIGURATION, value)
    }

    pub fn reset_fifo(&mut self) -> Result<(), SensorError> {
        self.write_reg(REG_FIFO_WRITE_POINTER, 0)?;
        self.write_reg(REG_FIFO_OVERFLOW_COUNTER, 0)?;
        self.write_reg(REG_FIFO_READ_POINTER, 0)
    }

    /// One IR/red pair, both big-endian.
    pub fn read_fifo_data(&mut self) -> Result<OpticalSample, SensorError> {
        let mut buf = [0u8; 4];
        self.burst_read(REG_FIFO_DATA, &mut buf)?;
        Ok(OpticalSample {
            ir: u16::from_be_bytes([buf[0], buf[1]]),
            red: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }

    /// The device clears TEMP_EN once the conversion is done.
    pub fn is_temperature_ready(&mut self) -> Result<bool, SensorError> {
        Ok(self.read_reg(REG_MODE_CONFIGURATION)? & MC_TEMP_EN == 0)
    }

    /// Die temperature (°C): signed integer part plus 1/16 °C fraction.
    pub fn retrieve_temperature(&mut self) -> Result<f32, SensorError> {
        let mut buf = [0u8; 2];
        self.burst_read(REG_TEMPERATURE_DATA_INT, &mut buf)?;
        Ok(buf[0] as i8 as f32 + buf[1] as f32 * TEMPERATURE_FRACTION_STEP)
    }

    pub fn revision_id(&mut self) -> Result<u8, SensorError> {
        self.read_reg(REG_REVISION_ID)
    }
}

impl<I2C: I2c> OpticalSensor for Max30100<I2C> {
    fn sample(&mut self) -> Result<OpticalSample, SensorError> {
        self.read_fifo_data()
    }

    fn configure(&mut self, ir: LedCurrent, red: LedCurrent) -> Result<(), SensorError> {
        self.set_leds_current(ir, red)
    }
}

impl<I2C: I2c> DieTemperature for Max30100<I2C> {
    fn start_temperature_sampling(&mut self) -> Result<(), SensorError> {
        let mode = self.read_reg(REG_MODE_CONFIGURATION)?;
        self.write_reg(REG_MODE_CONFIGURATION, mode | MC_TEMP_EN)
    }

    /// Hundredths of a degree, or `NotReady` while converting.
    fn read_temperature_centi(&mut self) -> Result<i16, SensorError> {
        if !self.is_temperature_ready()? {
            return Err(SensorError::NotReady);
        }
        let celsius = self.retrieve_temperature()?;
        Ok(libm::roundf(celsius * 100.0) as i16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::collections::VecDeque;

    /// Register file behind a fake bus. FIFO reads pop from `fifo`.
    struct FakeBus {
        regs: [u8; 256],
        fifo: VecDeque<u8>,
        fail: bool,
    }

    impl FakeBus {
        fn new() -> Self {
            let mut regs = [0u8; 256];
            regs[REG_PART_ID as usize] = PART_ID;
            regs[REG_REVISION_ID as usize] = 0x03;
            Self {
                regs,
                fifo: VecDeque::new(),
                fail: false,
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
            assert_eq!(address, ADDR);
            if self.fail {
                return Err(ErrorKind::Other);
            }
            let mut ptr = 0usize;
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        ptr = bytes[0] as usize;
                        for &b in &bytes[1..] {
                            self.regs[ptr] = b;
                            ptr += 1;
                        }
                    }
                    Operation::Read(buf) => {
                        for b in buf.iter_mut() {
                            if ptr == REG_FIFO_DATA as usize {
                                *b = self.fifo.pop_front().unwrap_or(0);
                            } else {
                                *b = self.regs[ptr];
                                ptr += 1;
                            }
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn init_configures_spo2_mode() {
        let mut dev = Max30100::new(FakeBus::new());
        dev.init(LedCurrent::MA_50, LedCurrent::MA_27_1).unwrap();
        let bus = dev.release();
        assert_eq!(bus.regs[REG_MODE_CONFIGURATION as usize], 0x03);
        // hi-res | 100 Hz | 1600 us
        assert_eq!(bus.regs[REG_SPO2_CONFIGURATION as usize], 0x40 | 0x04 | 0x03);
        assert_eq!(bus.regs[REG_LED_CONFIGURATION as usize], 0x8F);
    }

    #[test]
    fn wrong_part_is_unavailable() {
        let mut bus = FakeBus::new();
        bus.regs[REG_PART_ID as usize] = 0x15;
        let mut dev = Max30100::new(bus);
        assert_eq!(dev.init(LedCurrent::MA_50, LedCurrent::MA_27_1), Err(SensorError::Unavailable));

        let mut bus = dev.release();
        bus.fail = true;
        let mut dev = Max30100::new(bus);
        assert_eq!(dev.init(LedCurrent::MA_50, LedCurrent::MA_27_1), Err(SensorError::Unavailable));
    }

    #[test]
    fn fifo_pair_is_big_endian() {
        let mut bus = FakeBus::new();
        bus.fifo.extend([0x75, 0x30, 0x6D, 0x60]);
        let mut dev = Max30100::new(bus);
        assert_eq!(dev.sample(), Ok(OpticalSample { ir: 30_000, red: 28_000 }));
    }

    #[test]
    fn transient_read_failure_is_bus_error() {
        let mut bus = FakeBus::new();
        bus.fail = true;
        let mut dev = Max30100::new(bus);
        assert_eq!(dev.sample(), Err(SensorError::Bus));
    }

    #[test]
    fn configure_keeps_current_nibbles() {
        let mut dev = Max30100::new(FakeBus::new());
        dev.configure(LedCurrent::MA_50, LedCurrent::new(0x09)).unwrap();
        assert_eq!(dev.release().regs[REG_LED_CONFIGURATION as usize], 0x9F);
    }

    #[test]
    fn failed_led_write_is_proposed_again() {
        use crate::drivers::pulse_oximeter::PulseOximeter;

        let mut ox = PulseOximeter::new(LedCurrent::MA_27_1);
        ox.begin();
        for t in (0..600).step_by(10) {
            ox.update(t, OpticalSample { ir: 40_000, red: 20_000 });
        }

        let mut bus = FakeBus::new();
        bus.fail = true;
        let mut dev = Max30100::new(bus);
        assert_eq!(ox.adjust_current_bias(600, &mut dev, LedCurrent::MA_50), Err(SensorError::Bus));
        assert_eq!(ox.red_led_current(), LedCurrent::MA_27_1);

        let mut bus = dev.release();
        bus.fail = false;
        let mut dev = Max30100::new(bus);
        assert_eq!(ox.adjust_current_bias(1_200, &mut dev, LedCurrent::MA_50), Ok(Some(LedCurrent::new(0x09))));
        assert_eq!(ox.red_led_current(), LedCurrent::new(0x09));
        assert_eq!(dev.release().regs[REG_LED_CONFIGURATION as usize], 0x9F);
    }

    #[test]
    fn temperature_conversion() {
        let mut dev = Max30100::new(FakeBus::new());
        dev.set_mode(Mode::Spo2HeartRate).unwrap();
        dev.start_temperature_sampling().unwrap();
        assert_eq!(dev.read_temperature_centi(), Err(SensorError::NotReady));

        let mut bus = dev.release();
        // conversion done: 36 + 8/16 °C
        bus.regs[REG_MODE_CONFIGURATION as usize] &= !MC_TEMP_EN;
        bus.regs[REG_TEMPERATURE_DATA_INT as usize] = 36;
        bus.regs[REG_TEMPERATURE_DATA_INT as usize + 1] = 8;
        let mut dev = Max30100::new(bus);
        assert_eq!(dev.retrieve_temperature(), Ok(36.5));
        assert_eq!(dev.read_temperature_centi(), Ok(3650));
        assert_eq!(dev.release().regs[REG_MODE_CONFIGURATION as usize], 0x03);
    }

    #[test]
    fn negative_die_temperature() {
        let mut bus = FakeBus::new();
        bus.regs[REG_TEMPERATURE_DATA_INT as usize] = 0xFE; // -2
        bus.regs[REG_TEMPERATURE_DATA_INT as usize + 1] = 4;
        let mut dev = Max30100::new(bus);
        assert_eq!(dev.retrieve_temperature(), Ok(-1.75));
    }
}
