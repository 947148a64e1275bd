use std::env::{var, VarError};
use std::error::Error;
use std::str::FromStr;
use eyre::{eyre, WrapErr};

/// Data lines of a parallel display.
#[derive(Debug)]
pub enum DataPins {
    Four([usize; 4]),
    Eight([usize; 8]),
}

/// How the display is connected to the GPIO chip.
#[derive(Debug)]
pub enum Wiring {
    Parallel {
        rs: usize,
        rw: Option<usize>,
        e: usize,
        data: DataPins,
    },
    I2c {
        sda: usize,
        scl: usize,
        address: u8,
        write_only: bool,
    },
}

#[derive(Debug)]
pub struct Config {
    pub chip: String,
    pub wiring: Wiring,
    pub osc_khz: Option<u32>,
    pub busy_polling: bool,
    pub columns: u8,
}

impl Config {
    /// Reads the configuration from the `CHARLCD_*` environment variables.
    pub fn from_env() -> eyre::Result<Self> {
        let wiring = match optional_var("CHARLCD_TRANSPORT")?.as_deref() {
            None | Some("gpio4") => Wiring::Parallel {
                rs: parse_var("CHARLCD_PIN_RS")?,
                rw: parse_optional_var("CHARLCD_PIN_RW")?,
                e: parse_var("CHARLCD_PIN_E")?,
                data: DataPins::Four(parse_pin_bus(&required_var("CHARLCD_PINS_DATA")?)?),
            },
            Some("gpio8") => Wiring::Parallel {
                rs: parse_var("CHARLCD_PIN_RS")?,
                rw: parse_optional_var("CHARLCD_PIN_RW")?,
                e: parse_var("CHARLCD_PIN_E")?,
                data: DataPins::Eight(parse_pin_bus(&required_var("CHARLCD_PINS_DATA")?)?),
            },
            Some("i2c") => Wiring::I2c {
                sda: parse_var("CHARLCD_I2C_PIN_SDA")?,
                scl: parse_var("CHARLCD_I2C_PIN_SCL")?,
                address: match optional_var("CHARLCD_I2C_ADDRESS")? {
                    Some(address) => parse_address(&address)?,
                    None => 0x27,
                },
                write_only: parse_optional_var("CHARLCD_I2C_WRITE_ONLY")?.unwrap_or(false),
            },
            Some(other) => return Err(eyre!("Unknown transport {:?}, expected gpio4, gpio8 or i2c", other)),
        };

        Ok(Config {
            chip: optional_var("CHARLCD_GPIO_CHIP")?.unwrap_or_else(|| "/dev/gpiochip0".to_string()),
            wiring,
            osc_khz: parse_optional_var("CHARLCD_OSC_KHZ")?,
            busy_polling: parse_optional_var("CHARLCD_BUSY_POLLING")?.unwrap_or(false),
            columns: parse_optional_var("CHARLCD_COLUMNS")?.unwrap_or(16),
        })
    }
}

fn optional_var(name: &str) -> eyre::Result<Option<String>> {
    match var(name) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).wrap_err_with(|| format!("Invalid {}", name)),
    }
}

fn required_var(name: &str) -> eyre::Result<String> {
    optional_var(name)?.ok_or_else(|| eyre!("{} is not set", name))
}

fn parse_var<T>(name: &str) -> eyre::Result<T>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    required_var(name)?
        .trim()
        .parse()
        .wrap_err_with(|| format!("Invalid {}", name))
}

fn parse_optional_var<T>(name: &str) -> eyre::Result<Option<T>>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    optional_var(name)?
        .map(|value| value.trim().parse().wrap_err_with(|| format!("Invalid {}", name)))
        .transpose()
}

/// Parses a 7-bit I2C address, either decimal or `0x`-prefixed hex.
fn parse_address(s: &str) -> eyre::Result<u8> {
    let s = s.trim();
    let address = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16)?,
        None => s.parse()?,
    };
    Ok(address)
}

fn parse_pin_bus<const N: usize>(pin_str: &str) -> eyre::Result<[usize; N]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|pins: Vec<usize>| eyre!("Expected {} data pins, got {}", N, pins.len()))
}
