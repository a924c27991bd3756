//! Synthetic rotator for development and client testing without hardware.
//!
//! The simulated mount holds one position per axis and moves it at a fixed
//! slew rate whenever the corresponding relay line is energized, bounded at
//! the ends of travel. Stalling against a bound looks exactly like a real
//! axis pinned on a limit switch, so the calibration sweep works unmodified
//! against it.

use std::time::Duration;

use crate::mount::{
    SimMode, AZ_MOUNT_MAX, AZ_SIM_MAX_ADC, AZ_SIM_SPEED, EL_SIM_MAX_ADC, EL_SIM_SPEED,
};

use super::{AdcChannel, HalError, RelayPin, RotatorHal};

/// ADC count returned for the power-sense channel; comfortably above the
/// power-fail threshold.
const SIM_POWER_ADC: u16 = 2000;

/// One simulated axis: position plus commanded direction.
#[derive(Debug)]
struct SimAxis {
    /// Position in fractional counts; reads truncate to u16.
    position: f32,
    /// Count at the top of travel.
    max_adc: u16,
    /// Slew rate, degrees per second. Settable to 0 to fake a stuck axis.
    speed_dps: f32,
    /// Degrees covered by the full count span.
    span_deg: f32,
    increasing: bool,
    decreasing: bool,
}

impl SimAxis {
    fn new(max_adc: u16, speed_dps: f32, span_deg: f32) -> Self {
        Self {
            position: 0.0,
            max_adc,
            speed_dps,
            span_deg,
            increasing: false,
            decreasing: false,
        }
    }

    fn advance(&mut self, dt: Duration) {
        let step = self.speed_dps * f32::from(self.max_adc) / self.span_deg * dt.as_secs_f32();
        if self.increasing {
            self.position = (self.position + step).min(f32::from(self.max_adc));
        } else if self.decreasing {
            self.position = (self.position - step).max(0.0);
        }
    }

    fn counts(&self) -> u16 {
        self.position as u16
    }
}

/// Simulated implementation of [`RotatorHal`].
#[derive(Debug)]
pub struct SimRotator {
    az: SimAxis,
    el: SimAxis,
}

impl SimRotator {
    /// Build a simulated mount for the given mode, parked at `(0, 0)`.
    pub fn new(mode: SimMode) -> Self {
        let (el_max_adc, el_span) = Self::el_profile(mode);
        Self {
            az: SimAxis::new(AZ_SIM_MAX_ADC, AZ_SIM_SPEED, AZ_MOUNT_MAX),
            el: SimAxis::new(el_max_adc, EL_SIM_SPEED, el_span),
        }
    }

    fn el_profile(mode: SimMode) -> (u16, f32) {
        match mode {
            SimMode::El90 => (EL_SIM_MAX_ADC / 2, mode.el_span_deg()),
            _ => (EL_SIM_MAX_ADC, mode.el_span_deg()),
        }
    }

    /// Override the azimuth slew rate. Zero pins the axis, which the
    /// controller will diagnose as stuck.
    pub fn set_az_speed(&mut self, dps: f32) {
        self.az.speed_dps = dps;
    }

    /// Override the elevation slew rate.
    pub fn set_el_speed(&mut self, dps: f32) {
        self.el.speed_dps = dps;
    }

    /// Place the axes at arbitrary counts (test setup).
    pub fn set_counts(&mut self, az: u16, el: u16) {
        self.az.position = f32::from(az);
        self.el.position = f32::from(el);
    }
}

impl RotatorHal for SimRotator {
    fn init(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn read_adc(&mut self, channel: AdcChannel) -> Result<u16, HalError> {
        Ok(match channel {
            AdcChannel::Azimuth => self.az.counts(),
            AdcChannel::Elevation => self.el.counts(),
            AdcChannel::Power => SIM_POWER_ADC,
        })
    }

    fn set_pin(&mut self, pin: RelayPin, active: bool) {
        match pin {
            RelayPin::AzCw => self.az.increasing = active,
            RelayPin::AzCcw => self.az.decreasing = active,
            RelayPin::ElUp => self.el.increasing = active,
            RelayPin::ElDown => self.el.decreasing = active,
        }
    }

    fn shutdown(&mut self) {
        self.az.increasing = false;
        self.az.decreasing = false;
        self.el.increasing = false;
        self.el.decreasing = false;
    }

    fn advance(&mut self, dt: Duration) {
        self.az.advance(dt);
        self.el.advance(dt);
    }

    fn apply_sim_mode(&mut self, mode: SimMode) {
        let (el_max_adc, el_span) = Self::el_profile(mode);
        self.el.max_adc = el_max_adc;
        self.el.span_deg = el_span;
        self.az.position = 0.0;
        self.el.position = 0.0;
        self.shutdown();
    }
}
