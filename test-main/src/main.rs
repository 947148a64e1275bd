mod config;

use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::i2c::BitBangI2c;
use charlcd_gpio::lcd::hd44780::bus::{GpioHD44780Bus, HD44780Bus, I2cHD44780Bus};
use charlcd_gpio::lcd::hd44780::display::CharacterDisplay;
use charlcd_gpio::lcd::hd44780::driver::BusHD44780Driver;
use charlcd_gpio::lcd::hd44780::timing::TimingPolicy;
use charlcd_gpio::{GpioBias, GpioDriver};
use dotenv::dotenv;
use log::{debug, info};
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;
use time::OffsetDateTime;
use crate::config::{Config, DataPins, Wiring};

const UNKNOWN_STR: &str = "???";

/// A small clock face, shown in front of the time.
const CLOCK_GLYPH: [u8; 8] = [
    0b00000,
    0b01110,
    0b10101,
    0b10111,
    0b10001,
    0b01110,
    0b00000,
    0b00000,
];

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!("Architecture {}", System::cpu_arch());

    let config = Config::from_env()?;
    info!("Display @ {}: {:?}", config.chip, config.wiring);

    let timing = match config.osc_khz {
        Some(khz) => TimingPolicy::for_oscillator(khz)?,
        None => TimingPolicy::default(),
    };

    let gpio = GpiodDriver::open(&config.chip)?;
    debug!("{:?} initialized.", gpio);

    match &config.wiring {
        Wiring::Parallel { rs, rw, e, data } => {
            let mut pin_e = gpio.get_pin(*e)?;
            let pin_e_out = pin_e.as_output()?;
            let mut pin_rw = rw.map(|index| gpio.get_pin(index)).transpose()?;
            let pin_rw_out = pin_rw.as_mut().map(|pin| pin.as_output()).transpose()?;
            let mut pin_rs = gpio.get_pin(*rs)?;
            let pin_rs_out = pin_rs.as_output()?;

            match data {
                DataPins::Four(pins) => {
                    let mut data_bus = gpio.get_pin_bus(*pins)?;
                    let bus = GpioHD44780Bus::new_4bit(
                        &*pin_e_out,
                        pin_rw_out.as_deref(),
                        &*pin_rs_out,
                        &mut *data_bus,
                    );
                    run(bus, &config, timing)
                }
                DataPins::Eight(pins) => {
                    let mut data_bus = gpio.get_pin_bus(*pins)?;
                    let bus = GpioHD44780Bus::new_8bit(
                        &*pin_e_out,
                        pin_rw_out.as_deref(),
                        &*pin_rs_out,
                        &mut *data_bus,
                    );
                    run(bus, &config, timing)
                }
            }
        }
        Wiring::I2c { sda, scl, address, write_only } => {
            let mut pin_sda = gpio.get_pin(*sda)?;
            pin_sda.set_bias(GpioBias::PullUp)?;
            let mut pin_scl = gpio.get_pin(*scl)?;
            let pin_scl_out = pin_scl.as_output()?;

            let mut i2c = BitBangI2c::new(&mut *pin_sda, &*pin_scl_out);
            let mut bus = I2cHD44780Bus::new(&mut i2c, *address)?;
            if *write_only {
                bus = bus.write_only();
            }
            run(bus, &config, timing)
        }
    }
}

fn run<B: HD44780Bus>(bus: B, config: &Config, timing: TimingPolicy) -> eyre::Result<()> {
    let mut driver = BusHD44780Driver::new(bus).with_timing(timing);
    if config.busy_polling {
        driver.set_busy_polling(true)?;
    }

    let mut display = CharacterDisplay::new(&mut driver).with_columns(config.columns)?;
    display.init()?;
    display.define_glyph(0, &CLOCK_GLYPH)?;
    debug!("{:?} initialized.", display);

    let host_name = System::host_name().unwrap_or_else(|| UNKNOWN_STR.to_string());
    let visible: String = host_name.chars().take(config.columns as usize).collect();
    display.print(&visible)?;

    loop {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());

        display.move_to(1, 0)?;
        display.print_glyph(0)?;
        display.print(&format!(" {:02}:{:02}:{:02}", now.hour(), now.minute(), now.second()))?;

        sleep(Duration::from_secs(1));
    }
}
