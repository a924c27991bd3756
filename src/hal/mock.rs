//! Scripted HAL double for controller tests.
//!
//! Unlike [`SimRotator`](super::SimRotator), which models physics, the mock
//! replays exactly the readings a test queues and records every pin write,
//! so tests can script fault conditions (failed reads, dead power rail,
//! frozen counts) that the simulator never produces on its own.

use std::collections::VecDeque;
use std::time::Duration;

use super::{AdcChannel, HalError, RelayPin, RotatorHal};

/// One scripted ADC channel: queued readings first, then a steady level.
#[derive(Debug, Default)]
pub struct MockChannel {
    /// Readings returned in order before falling back to `level`.
    pub queue: VecDeque<Result<u16, String>>,
    /// Reading returned once the queue is empty.
    pub level: u16,
}

impl MockChannel {
    fn read(&mut self) -> Result<u16, HalError> {
        match self.queue.pop_front() {
            Some(Ok(counts)) => Ok(counts),
            Some(Err(reason)) => Err(HalError::I2c(reason)),
            None => Ok(self.level),
        }
    }
}

/// Mock implementation of [`RotatorHal`].
///
/// All fields are public so tests can inspect or rig them directly.
#[derive(Debug)]
pub struct MockRotator {
    /// Azimuth channel script.
    pub az: MockChannel,
    /// Elevation channel script.
    pub el: MockChannel,
    /// Power-sense channel script.
    pub power: MockChannel,
    /// Every `set_pin` call, in order.
    pub pin_writes: Vec<(RelayPin, bool)>,
    /// Current level of each line: `(az_cw, az_ccw, el_up, el_down)`.
    pub pins: (bool, bool, bool, bool),
    /// Whether `init` was called.
    pub initialized: bool,
    /// Whether `shutdown` was called.
    pub shut_down: bool,
}

impl Default for MockRotator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRotator {
    /// Mock with a healthy power rail and both axes reading zero.
    pub fn new() -> Self {
        Self {
            az: MockChannel::default(),
            el: MockChannel::default(),
            power: MockChannel {
                queue: VecDeque::new(),
                level: 1800,
            },
            pin_writes: Vec::new(),
            pins: (false, false, false, false),
            initialized: false,
            shut_down: false,
        }
    }

    /// Set the steady azimuth and elevation levels.
    pub fn set_levels(&mut self, az: u16, el: u16) {
        self.az.level = az;
        self.el.level = el;
    }

    /// Queue a failed read on the azimuth channel.
    pub fn fail_az_read(&mut self, reason: &str) {
        self.az.queue.push_back(Err(reason.to_string()));
    }

    /// Queue a power-sense reading (e.g. below the power-fail threshold).
    pub fn queue_power(&mut self, counts: u16) {
        self.power.queue.push_back(Ok(counts));
    }

    /// Current level of one line.
    pub fn pin(&self, pin: RelayPin) -> bool {
        match pin {
            RelayPin::AzCw => self.pins.0,
            RelayPin::AzCcw => self.pins.1,
            RelayPin::ElUp => self.pins.2,
            RelayPin::ElDown => self.pins.3,
        }
    }

    /// True when every line is released.
    pub fn all_pins_low(&self) -> bool {
        self.pins == (false, false, false, false)
    }
}

impl RotatorHal for MockRotator {
    fn init(&mut self) -> Result<(), HalError> {
        self.initialized = true;
        Ok(())
    }

    fn read_adc(&mut self, channel: AdcChannel) -> Result<u16, HalError> {
        match channel {
            AdcChannel::Azimuth => self.az.read(),
            AdcChannel::Elevation => self.el.read(),
            AdcChannel::Power => self.power.read(),
        }
    }

    fn set_pin(&mut self, pin: RelayPin, active: bool) {
        self.pin_writes.push((pin, active));
        match pin {
            RelayPin::AzCw => self.pins.0 = active,
            RelayPin::AzCcw => self.pins.1 = active,
            RelayPin::ElUp => self.pins.2 = active,
            RelayPin::ElDown => self.pins.3 = active,
        }
    }

    fn shutdown(&mut self) {
        self.pins = (false, false, false, false);
        self.shut_down = true;
    }

    fn advance(&mut self, _dt: Duration) {}
}
