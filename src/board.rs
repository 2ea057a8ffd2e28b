//! STM32F405 clock tree for the health monitor.
//!
//! 8 MHz crystal, PLL VCO at 336 MHz. The pipeline is light (100 Hz optics,
//! a few SPI reads per motion tick), so the core runs at 84 MHz instead of
//! the part's 168 MHz ceiling. The VCO still yields the 48 MHz USB clock.

use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;

/// Core clock after [`Board::init`].
pub const SYSCLK_HZ: u32 = 84_000_000;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();

        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,   // 2 MHz PLL input
            mul: PllMul::MUL168,       // 336 MHz VCO
            divp: Some(PllPDiv::DIV4), // 84 MHz core
            divq: Some(PllQDiv::DIV7), // 48 MHz USB CDC
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        // APB1 42 MHz: I2C1 (MAX30100 at 400 kHz) sits at its upper limit
        config.rcc.apb1_pre = APBPrescaler::DIV2;
        // APB2 84 MHz: SPI1 (ICM-42688) and ADC1 (pulse sensor)
        config.rcc.apb2_pre = APBPrescaler::DIV1;

        let p = embassy_stm32::init(config);
        defmt::debug!("clocks up: {} Hz core", SYSCLK_HZ);

        Self { p }
    }
}
