//! Hardware abstraction for the rotator's I/O.
//!
//! The motion controller drives everything through [`RotatorHal`]: four
//! active-high relay lines and a three-channel ADC. Implementations:
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`pi::PiRotator`] | Real Raspberry Pi GPIO + ADS1015 over I²C (Linux only) |
//! | [`sim::SimRotator`] | Synthetic mount that moves in response to commanded relays |
//! | [`mock::MockRotator`] | Scripted test double with queued readings |

pub mod mock;
#[cfg(target_os = "linux")]
pub mod pi;
pub mod sim;

use std::time::Duration;

use thiserror::Error;

use crate::mount::SimMode;

pub use mock::MockRotator;
#[cfg(target_os = "linux")]
pub use pi::PiRotator;
pub use sim::SimRotator;

/// ADC input channels, numbered as wired on the ADS1015.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdcChannel {
    /// Azimuth feedback potentiometer (AIN0).
    Azimuth = 0,
    /// Elevation feedback potentiometer (AIN1).
    Elevation = 1,
    /// "Power OK" sense rail (AIN2).
    Power = 2,
}

/// Relay output lines, named by the motion they energize.
///
/// The discriminants are the BCM GPIO numbers they are wired to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelayPin {
    /// Rotate azimuth clockwise (BCM 25, header pin 22).
    AzCw = 25,
    /// Rotate azimuth counter-clockwise (BCM 8, header pin 24).
    AzCcw = 8,
    /// Raise elevation (BCM 7, header pin 26).
    ElUp = 7,
    /// Lower elevation (BCM 1, header pin 28).
    ElDown = 1,
}

impl RelayPin {
    /// The BCM GPIO number for this line.
    pub fn bcm(&self) -> u8 {
        *self as u8
    }
}

/// Why a HAL operation failed.
#[derive(Debug, Error)]
pub enum HalError {
    /// The GPIO subsystem could not be prepared or driven.
    #[error("GPIO: {0}")]
    Gpio(String),
    /// An I²C transfer failed.
    #[error("I2C: {0}")]
    I2c(String),
    /// The operation is not available on this build or backend.
    #[error("{0}")]
    Unsupported(&'static str),
}

/// The capability set the motion controller consumes.
///
/// After startup the controller owns the implementation exclusively; no
/// other code touches pins or the I²C bus.
pub trait RotatorHal {
    /// Prepare the device: claim output lines (all released) and open the
    /// ADC bus. Harmless to call more than once.
    fn init(&mut self) -> Result<(), HalError>;

    /// Read one channel. Counts are 12-bit, `0..=2047`; readings that would
    /// be negative near ground potential are clamped to zero.
    fn read_adc(&mut self, channel: AdcChannel) -> Result<u16, HalError>;

    /// Energize or release a relay line. Idempotent.
    fn set_pin(&mut self, pin: RelayPin, active: bool);

    /// Release every line and close the device.
    fn shutdown(&mut self);

    /// Advance simulated motion by `dt`. Real hardware moves on its own;
    /// the default does nothing.
    fn advance(&mut self, dt: Duration) {
        let _ = dt;
    }

    /// Reconfigure for a new simulator mode. Ignored by real hardware.
    fn apply_sim_mode(&mut self, mode: SimMode) {
        let _ = mode;
    }
}
