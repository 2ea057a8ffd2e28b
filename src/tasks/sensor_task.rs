use embassy_executor::task;
use embassy_futures::select::{select3, Either3};
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::{I2C1, SPI1};
use embassy_stm32::spi::Spi;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Delay, Duration, Instant, Ticker};

use wearable_health::config::{PipelineConfig, SAMPLE_PERIOD_MS};
use wearable_health::drivers::icm42688::Icm42688;
use wearable_health::drivers::max30100::Max30100;
use wearable_health::drivers::motion::{MotionBlender, MotionSample};
use wearable_health::drivers::pulse_oximeter::{PulseOximeter, TemperatureSchedule};
use wearable_health::drivers::{MotionSensor, OpticalSensor};
use wearable_health::state::SnapshotFrame;
use wearable_health::telemetry::TelemetryRelay;

pub type PpgSensor = Max30100<I2c<'static, I2C1, NoDma, NoDma>>;
pub type Imu = Icm42688<Spi<'static, SPI1, NoDma, NoDma>, Output<'static, AnyPin>>;

fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// Sensor context: owns both sensors and the whole PPG pipeline.
/// 100 Hz optical sampling, inertial polling and snapshot relay on separate tickers.
#[task]
pub async fn sensor_task(
    mut ppg: PpgSensor,
    mut imu: Imu,
    config: PipelineConfig,
    relay_tx: Sender<'static, CriticalSectionRawMutex, SnapshotFrame, 1>,
) {
    let ppg_ok = match ppg.init(config.ir_led_current, config.red_led_current) {
        Ok(()) => true,
        Err(e) => {
            defmt::error!("MAX30100 init failed: {}", e);
            false
        }
    };
    let imu_ok = match imu.init(&mut Delay) {
        Ok(()) => true,
        Err(e) => {
            defmt::error!("ICM42688 init failed: {}", e);
            false
        }
    };

    let mut oximeter = PulseOximeter::new(config.red_led_current);
    oximeter.begin();
    let mut temperature_schedule = TemperatureSchedule::new(config.temperature_period_ms);
    let mut temperature: i16 = 0;

    let mut blender = MotionBlender::new();
    let mut latest_motion: Option<MotionSample> = None;

    let mut relay = TelemetryRelay::new(relay_tx);

    let mut optical_ticker = Ticker::every(Duration::from_millis(SAMPLE_PERIOD_MS as u64));
    let mut motion_ticker = Ticker::every(Duration::from_millis(config.motion_poll_period_ms));
    let mut relay_ticker = Ticker::every(Duration::from_millis(config.relay_period_ms));

    loop {
        match select3(optical_ticker.next(), motion_ticker.next(), relay_ticker.next()).await {
            // ── PPG @ 100 Hz ─────────────────────────────────────────────────
            Either3::First(()) => {
                if !ppg_ok {
                    continue;
                }
                let now = now_ms();

                match ppg.sample() {
                    Ok(sample) => {
                        oximeter.update(now, sample);
                    }
                    // skip the tick, filter state stays as it is
                    Err(e) => defmt::debug!("ppg read: {}", e),
                }

                // the follower only records a level the device accepted
                if let Err(e) = oximeter.adjust_current_bias(now, &mut ppg, config.ir_led_current) {
                    defmt::debug!("led current: {}", e);
                }

                // sampling carries on while the die temperature converts
                if let Some(t) = temperature_schedule.poll(now, &mut ppg) {
                    temperature = t;
                    defmt::info!("die temperature: {} (x0.01 C)", t);
                }
            }

            // ── IMU ──────────────────────────────────────────────────────────
            Either3::Second(()) => {
                if !imu_ok {
                    continue;
                }
                match imu.sample() {
                    Ok(m) => latest_motion = Some(m),
                    Err(e) => defmt::debug!("imu read: {}", e),
                }
            }

            // ── Relay ────────────────────────────────────────────────────────
            Either3::Third(()) => {
                let motion = match latest_motion.take() {
                    Some(m) => blender.blend(&m.gyro, &m.accel),
                    None => blender.last(),
                };
                // a rejected frame is logged by the relay and superseded next cycle
                let _ = relay.relay(oximeter.vitals(), temperature, motion);
            }
        }
    }
}
