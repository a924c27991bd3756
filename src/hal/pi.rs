//! Raspberry Pi implementation: relay lines over the BCM GPIO controller
//! and an ADS1015 ADC on `/dev/i2c-1`.
//!
//! The ADS1015 is read in single-shot, single-ended mode at gain 1
//! (±4.096 V) and 1600 SPS. Each read writes the configuration register,
//! waits out the conversion, and reads the result register; the 12-bit
//! result sits in the upper bits and is sign-corrected near ground.
//!
//! If reads report permission errors, add the user to the `gpio` and `i2c`
//! groups.

use std::thread;
use std::time::Duration;

use rppal::gpio::{Gpio, OutputPin};
use rppal::i2c::I2c;
use tracing::debug;

use super::{AdcChannel, HalError, RelayPin, RotatorHal};

/// I²C bus address of the ADS1015.
pub const ADC_I2C_ADDR: u16 = 0x48;

// ADS1015 register map and config bits, per the TI datasheet.
const REG_CONVERT: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const CONFIG_CQUE_NONE: u16 = 0x0003; // comparator disabled
const CONFIG_DR_1600SPS: u16 = 0x0080;
const CONFIG_MODE_SINGLE: u16 = 0x0100;
const CONFIG_PGA_4_096V: u16 = 0x0200; // gain 1
const CONFIG_MUX_SINGLE_0: u16 = 0x4000;
const CONFIG_OS_SINGLE: u16 = 0x8000; // start one conversion

/// Worst-case single conversion time at 1600 SPS; not worth polling OS.
const CONVERSION_DELAY: Duration = Duration::from_millis(1);

/// Real-hardware implementation of [`RotatorHal`].
pub struct PiRotator {
    az_cw: OutputPin,
    az_ccw: OutputPin,
    el_up: OutputPin,
    el_down: OutputPin,
    i2c: I2c,
}

impl PiRotator {
    /// Claim the four relay lines (driven low) and open the I²C bus.
    pub fn new() -> Result<Self, HalError> {
        let gpio = Gpio::new().map_err(|e| HalError::Gpio(e.to_string()))?;
        let claim = |pin: RelayPin| -> Result<OutputPin, HalError> {
            gpio.get(pin.bcm())
                .map(rppal::gpio::Pin::into_output_low)
                .map_err(|e| HalError::Gpio(format!("BCM {}: {e}", pin.bcm())))
        };

        let az_cw = claim(RelayPin::AzCw)?;
        let az_ccw = claim(RelayPin::AzCcw)?;
        let el_up = claim(RelayPin::ElUp)?;
        let el_down = claim(RelayPin::ElDown)?;

        let mut i2c = I2c::new().map_err(|e| HalError::I2c(e.to_string()))?;
        i2c.set_slave_address(ADC_I2C_ADDR)
            .map_err(|e| HalError::I2c(e.to_string()))?;

        debug!("GPIO and I2C ready");

        Ok(Self {
            az_cw,
            az_ccw,
            el_up,
            el_down,
            i2c,
        })
    }

    fn line(&mut self, pin: RelayPin) -> &mut OutputPin {
        match pin {
            RelayPin::AzCw => &mut self.az_cw,
            RelayPin::AzCcw => &mut self.az_ccw,
            RelayPin::ElUp => &mut self.el_up,
            RelayPin::ElDown => &mut self.el_down,
        }
    }
}

impl RotatorHal for PiRotator {
    fn init(&mut self) -> Result<(), HalError> {
        // Lines were claimed low in `new`; nothing further to prepare.
        Ok(())
    }

    fn read_adc(&mut self, channel: AdcChannel) -> Result<u16, HalError> {
        let mux = CONFIG_MUX_SINGLE_0 + ((channel as u16) << 12);
        let config = CONFIG_CQUE_NONE
            | CONFIG_DR_1600SPS
            | CONFIG_MODE_SINGLE
            | CONFIG_PGA_4_096V
            | CONFIG_OS_SINGLE
            | mux;

        let request = [REG_CONFIG, (config >> 8) as u8, config as u8];
        self.i2c
            .write(&request)
            .map_err(|e| HalError::I2c(format!("config ch{}: {e}", channel as u16)))?;

        thread::sleep(CONVERSION_DELAY);

        let mut result = [0u8; 2];
        self.i2c
            .write_read(&[REG_CONVERT], &mut result)
            .map_err(|e| HalError::I2c(format!("convert ch{}: {e}", channel as u16)))?;

        // Result occupies the upper 12 bits and is signed; near ground it
        // can dip slightly negative.
        let counts = u16::from_be_bytes(result) >> 4;
        Ok(if counts > 0x7ff { 0 } else { counts })
    }

    fn set_pin(&mut self, pin: RelayPin, active: bool) {
        let line = self.line(pin);
        if active {
            line.set_high();
        } else {
            line.set_low();
        }
    }

    fn shutdown(&mut self) {
        self.az_cw.set_low();
        self.az_ccw.set_low();
        self.el_up.set_low();
        self.el_down.set_low();
        debug!("relay lines released");
    }
}
