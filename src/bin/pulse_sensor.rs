#![no_std]
#![no_main]

//! # Reduced-hardware image: analog pulse sensor
//!
//! Same relay and radio side as `health-monitor`, but heart rate comes from
//! a bare pulse sensor on PA0 (ADC1) through the threshold estimator, sampled
//! every 2 ms. There is no optical SpO2 path: the snapshot carries 0 %, and
//! the temperature is the IMU die temperature. Snapshots go out every 320 ms.
//!
//! ```sh
//! cargo run --release --features firmware --bin pulse-sensor
//! ```

// ── Modules shared with the main image ────────────────────────────────────────
#[path = "../board.rs"]
mod board;
#[path = "../tasks/radio_task.rs"]
mod radio_task;
#[path = "../usb.rs"]
mod usb;

use embassy_executor::Spawner;
use embassy_futures::select::{select3, Either3};
use embassy_stm32::adc::Adc;
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Level, Output, Pin, Speed};
use embassy_stm32::peripherals::{ADC1, PA0, SPI1};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use {defmt_rtt as _, panic_probe as _};

use wearable_health::config::{PipelineConfig, PULSE_SENSOR_SAMPLE_PERIOD_MS};
use wearable_health::drivers::icm42688::Icm42688;
use wearable_health::drivers::motion::{MotionBlender, MotionSample};
use wearable_health::drivers::pulse_sensor::PulseSensorEstimator;
use wearable_health::drivers::MotionSensor;
use wearable_health::state::{SnapshotFrame, VitalsData};
use wearable_health::telemetry::TelemetryRelay;

use crate::board::Board;
use crate::radio_task::radio_task;

type Imu = Icm42688<Spi<'static, SPI1, NoDma, NoDma>, Output<'static, AnyPin>>;

static RELAY_CHAN: Channel<CriticalSectionRawMutex, SnapshotFrame, 1> = Channel::new();

fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

// ── Sensor context ────────────────────────────────────────────────────────────
#[embassy_executor::task]
async fn pulse_sensor_task(
    mut adc: Adc<'static, ADC1>,
    mut pulse_pin: PA0,
    mut imu: Imu,
    config: PipelineConfig,
    relay_tx: Sender<'static, CriticalSectionRawMutex, SnapshotFrame, 1>,
) {
    let imu_ok = match imu.init(&mut Delay) {
        Ok(()) => true,
        Err(e) => {
            defmt::error!("ICM42688 init failed: {}", e);
            false
        }
    };

    let mut estimator = PulseSensorEstimator::new(now_ms());
    let mut blender = MotionBlender::new();
    let mut latest_motion: Option<MotionSample> = None;
    let mut temperature: i16 = 0;
    let mut relay = TelemetryRelay::new(relay_tx);

    let mut adc_ticker = Ticker::every(Duration::from_millis(PULSE_SENSOR_SAMPLE_PERIOD_MS as u64));
    let mut motion_ticker = Ticker::every(Duration::from_millis(config.motion_poll_period_ms));
    let mut relay_ticker = Ticker::every(Duration::from_millis(config.relay_period_ms));

    loop {
        match select3(adc_ticker.next(), motion_ticker.next(), relay_ticker.next()).await {
            Either3::First(()) => {
                let signal = adc.read(&mut pulse_pin) as u32;
                if let Some(bpm) = estimator.measure(now_ms(), signal) {
                    defmt::debug!("pulse: {} bpm", bpm);
                }
            }
            Either3::Second(()) => {
                if !imu_ok {
                    continue;
                }
                match imu.sample() {
                    Ok(m) => {
                        temperature = m.temperature.to_centi();
                        latest_motion = Some(m);
                    }
                    Err(e) => defmt::debug!("imu read: {}", e),
                }
            }
            Either3::Third(()) => {
                let motion = match latest_motion.take() {
                    Some(m) => blender.blend(&m.gyro, &m.accel),
                    None => blender.last(),
                };
                let vitals = VitalsData {
                    heartrate: estimator.bpm().min(u8::MAX as u32) as u8,
                    spo2: 0,
                };
                let _ = relay.relay(vitals, temperature, motion);
            }
        }
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let board = Board::init();
    let p = board.p;

    // USB CDC
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // ADC1, pulse sensor on PA0
    let adc = Adc::new(p.ADC1, &mut Delay);

    // SPI1 @ 10 MHz → ICM-42688
    let mut spi_cfg = SpiConfig::default();
    spi_cfg.frequency = TimeHertz(10_000_000);
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_cfg);
    let cs_imu = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let imu = Icm42688::new(spi, cs_imu);

    Timer::after(Duration::from_millis(100)).await;

    spawner.spawn(pulse_sensor_task(
        adc,
        p.PA0,
        imu,
        PipelineConfig::pulse_sensor(),
        RELAY_CHAN.sender(),
    )).unwrap();

    spawner.spawn(radio_task(usb_serial, RELAY_CHAN.receiver())).unwrap();

    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
