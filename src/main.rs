#![no_std]
#![no_main]

mod board;
mod tasks;
mod usb;

use embassy_executor::Spawner;
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use wearable_health::config::PipelineConfig;
use wearable_health::drivers::icm42688::Icm42688;
use wearable_health::drivers::max30100::Max30100;
use wearable_health::state::SnapshotFrame;

use crate::board::Board;
use crate::tasks::radio_task::radio_task;
use crate::tasks::sensor_task::sensor_task;

// ── Inter-processor channel ───────────────────────────────────────────────────
//  Cap=1: a snapshot that finds the slot taken is dropped; the next relay supersedes it.
static RELAY_CHAN: Channel<CriticalSectionRawMutex, SnapshotFrame, 1> = Channel::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    I2C1_EV => embassy_stm32::i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => embassy_stm32::i2c::ErrorInterruptHandler<peripherals::I2C1>;
});

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (84 MHz core, 48 MHz USB)
    let board = Board::init();
    let p = board.p;

    // 2. USB (CDC-ACM stands in for the radio link)
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // 3. I2C1 @ 400 kHz: MAX30100 PPG (SCL=PB8, SDA=PB9)
    let i2c = I2c::new(
        p.I2C1,
        p.PB8, p.PB9,
        Irqs,
        NoDma,
        NoDma,
        TimeHertz(400_000),
        Default::default(),
    );
    let ppg = Max30100::new(i2c);

    // 4. SPI1 @ 10 MHz: ICM-42688 IMU (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = TimeHertz(10_000_000);
    let spi = Spi::new(
        p.SPI1,
        p.PA5, p.PA7, p.PA6,
        NoDma, NoDma,
        spi_config,
    );
    let cs_imu = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let imu = Icm42688::new(spi, cs_imu);

    // 5. Heartbeat LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 6. Let the sensors power up before the sensor task configures them
    Timer::after(Duration::from_millis(100)).await;

    // 7. Spawn the two contexts; the channel is all they share
    spawner.spawn(sensor_task(
        ppg,
        imu,
        PipelineConfig::default(),
        RELAY_CHAN.sender(),
    )).unwrap();

    spawner.spawn(radio_task(
        usb_serial,
        RELAY_CHAN.receiver(),
    )).unwrap();

    // 8. Main task: LED heartbeat @ 1 Hz
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
