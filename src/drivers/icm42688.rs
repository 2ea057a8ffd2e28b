use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::drivers::motion::{MotionSample, SensorValue};
use crate::drivers::MotionSensor;
use crate::error::SensorError;

const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_TEMP_DATA1: u8 = 0x1D;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I: u8 = 0x47;

// Reset defaults: ±16 g, ±2000 dps
const ACCEL_LSB_PER_G: f64 = 2048.0;
const GYRO_LSB_PER_DPS: f64 = 16.4;
const STANDARD_GRAVITY: f64 = 9.80665;
const TEMP_LSB_PER_DEGC: f64 = 132.48;
const TEMP_OFFSET_DEGC: f64 = 25.0;

pub struct Icm42688<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI: SpiBus, CS: OutputPin> Icm42688<SPI, CS> {
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs }
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn select(&mut self) -> Result<(), SensorError> {
        self.cs.set_low().map_err(|_| SensorError::Bus)
    }

    fn deselect(&mut self) -> Result<(), SensorError> {
        self.cs.set_high().map_err(|_| SensorError::Bus)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.select()?;
        let res = self.spi.write(&[reg & 0x7F, value]).map_err(|_| SensorError::Bus);
        self.deselect()?;
        res
    }

    fn burst_read(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        buf[0] = reg | 0x80;
        self.select()?;
        let res = self.spi.transfer_in_place(buf).map_err(|_| SensorError::Bus);
        self.deselect()?;
        res
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 2];
        self.burst_read(reg, &mut buf)?;
        Ok(buf[1])
    }

    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        // Soft reset
        self.write_reg(REG_DEVICE_CONFIG, 0x01)?;
        delay.delay_ms(10);

        let id = self.read_who_am_i()?;
        if id != WHO_AM_I {
            error!("ICM42688: unexpected WHO_AM_I {:x}", id);
            return Err(SensorError::Unavailable);
        }

        // Enable Gyro and Accel in Low Noise mode
        self.write_reg(REG_PWR_MGMT0, 0x0F)?;
        delay.delay_ms(50);

        Ok(())
    }

    pub fn read_who_am_i(&mut self) -> Result<u8, SensorError> {
        self.read_reg(REG_WHO_AM_I)
    }

    /// Raw temperature, accel and gyro counts in one burst.
    pub fn read_raw(&mut self) -> Result<(i16, [i16; 3], [i16; 3]), SensorError> {
        let mut rx = [0u8; 15];
        self.burst_read(REG_TEMP_DATA1, &mut rx)?;

        let word = |i: usize| i16::from_be_bytes([rx[i], rx[i + 1]]);
        let temp = word(1);
        let accel = [word(3), word(5), word(7)];
        let gyro = [word(9), word(11), word(13)];

        Ok((temp, accel, gyro))
    }
}

/// m/s² as integer-plus-micro
pub fn accel_value(raw: i16) -> SensorValue {
    SensorValue::from_micros((raw as f64 * STANDARD_GRAVITY * 1e6 / ACCEL_LSB_PER_G) as i64)
}

/// rad/s as integer-plus-micro
pub fn gyro_value(raw: i16) -> SensorValue {
    let rad_s = raw as f64 / GYRO_LSB_PER_DPS * core::f64::consts::PI / 180.0;
    SensorValue::from_micros((rad_s * 1e6) as i64)
}

/// °C as integer-plus-micro
pub fn temperature_value(raw: i16) -> SensorValue {
    let celsius = raw as f64 / TEMP_LSB_PER_DEGC + TEMP_OFFSET_DEGC;
    SensorValue::from_micros((celsius * 1e6) as i64)
}

impl<SPI: SpiBus, CS: OutputPin> MotionSensor for Icm42688<SPI, CS> {
    fn sample(&mut self) -> Result<MotionSample, SensorError> {
        let (temp, accel, gyro) = self.read_raw()?;
        Ok(MotionSample {
            gyro: gyro.map(gyro_value),
            accel: accel.map(accel_value),
            temperature: temperature_value(temp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct FakeSpi {
        regs: [u8; 128],
        writes: Vec<[u8; 2]>,
    }

    impl embedded_hal::spi::ErrorType for FakeSpi {
        type Error = Infallible;
    }

    impl SpiBus for FakeSpi {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            words.fill(0);
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
            self.regs[(words[0] & 0x7F) as usize] = words[1];
            self.writes.push([words[0], words[1]]);
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], _write: &[u8]) -> Result<(), Infallible> {
            read.fill(0);
            Ok(())
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            let start = (words[0] & 0x7F) as usize;
            for (i, w) in words.iter_mut().enumerate().skip(1) {
                *w = self.regs[start + i - 1];
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeCs {
        low: bool,
        selections: u32,
    }

    impl embedded_hal::digital::ErrorType for FakeCs {
        type Error = Infallible;
    }

    impl OutputPin for FakeCs {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.low = true;
            self.selections += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.low = false;
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn device() -> Icm42688<FakeSpi, FakeCs> {
        let mut regs = [0u8; 128];
        regs[REG_WHO_AM_I as usize] = WHO_AM_I;
        Icm42688::new(
            FakeSpi {
                regs,
                writes: Vec::new(),
            },
            FakeCs::default(),
        )
    }

    #[test]
    fn init_resets_and_powers_sensors() {
        let mut imu = device();
        imu.init(&mut NoDelay).unwrap();
        let (spi, cs) = imu.release();
        assert_eq!(spi.writes, vec![[REG_DEVICE_CONFIG, 0x01], [REG_PWR_MGMT0, 0x0F]]);
        assert!(!cs.low);
        assert_eq!(cs.selections, 3);
    }

    #[test]
    fn missing_device_is_unavailable() {
        let mut imu = device();
        imu.spi.regs[REG_WHO_AM_I as usize] = 0x00;
        assert_eq!(imu.init(&mut NoDelay), Err(SensorError::Unavailable));
    }

    #[test]
    fn burst_is_scaled_to_si_units() {
        let mut imu = device();
        let t = REG_TEMP_DATA1 as usize;
        // temperature 0 counts = 25 °C
        imu.spi.regs[t..t + 2].copy_from_slice(&0i16.to_be_bytes());
        // accel z = 1 g
        imu.spi.regs[t + 6..t + 8].copy_from_slice(&2048i16.to_be_bytes());
        // gyro x = -164 counts = -10 dps
        imu.spi.regs[t + 8..t + 10].copy_from_slice(&(-164i16).to_be_bytes());

        let s = imu.sample().unwrap();
        assert!((s.temperature.normalize() - 25.0).abs() < 1e-6);
        assert_eq!(s.accel[2].to_milli(), 9807);
        assert_eq!(s.accel[0], SensorValue::from_micros(0));
        assert_eq!(s.gyro[0].to_milli(), -175);
        assert!(!imu.cs.low);
    }
}
