//! Pure conversions between world coordinates and ADC counts.
//!
//! All four maps are linear over the calibration endpoints and clamp to the
//! mount bounds on both sides. They are only meaningful with a valid
//! calibration; without one they return zero, and callers are expected to
//! have gated on validity already.

use crate::cal::Calibration;
use crate::mount::{self, SimMode};

/// Convert azimuth degrees (east of true north) to an ADC count.
pub fn az_to_adc(cal: &Calibration, az: f32) -> u16 {
    if !cal.valid {
        return 0;
    }
    if az < mount::AZ_MOUNT_MIN {
        return cal.az_min;
    }
    if az > mount::AZ_MOUNT_MAX {
        return cal.az_max;
    }
    let span = f32::from(cal.az_max - cal.az_min);
    let frac = (az - mount::AZ_MOUNT_MIN) / (mount::AZ_MOUNT_MAX - mount::AZ_MOUNT_MIN);
    cal.az_min + (frac * span) as u16
}

/// Convert elevation degrees (up from the horizon) to an ADC count.
///
/// Azimuth-only simulation has no elevation feedback, so the conversion
/// collapses to zero there.
pub fn el_to_adc(cal: &Calibration, mode: SimMode, el: f32) -> u16 {
    if !cal.valid {
        return 0;
    }
    if el < mount::EL_MOUNT_MIN {
        return cal.el_min;
    }
    if el > mode.el_max_deg() {
        return cal.el_max;
    }
    if mode == SimMode::AzOnly {
        return 0;
    }
    let span = f32::from(cal.el_max - cal.el_min);
    let frac = (el - mount::EL_MOUNT_MIN) / (mode.el_span_deg() - mount::EL_MOUNT_MIN);
    cal.el_min + (frac * span) as u16
}

/// Convert an azimuth ADC count to degrees east of true north.
pub fn adc_to_az(cal: &Calibration, adc: u16) -> f32 {
    if !cal.valid {
        return 0.0;
    }
    if adc < cal.az_min {
        return mount::AZ_MOUNT_MIN;
    }
    if adc > cal.az_max {
        return mount::AZ_MOUNT_MAX;
    }
    let span = f32::from(cal.az_max - cal.az_min);
    mount::AZ_MOUNT_MIN
        + f32::from(adc - cal.az_min) * (mount::AZ_MOUNT_MAX - mount::AZ_MOUNT_MIN) / span
}

/// Convert an elevation ADC count to degrees up from the horizon.
pub fn adc_to_el(cal: &Calibration, mode: SimMode, adc: u16) -> f32 {
    if !cal.valid {
        return 0.0;
    }
    if adc < cal.el_min {
        return mount::EL_MOUNT_MIN;
    }
    if adc > cal.el_max {
        return mode.el_max_deg();
    }
    if mode == SimMode::AzOnly {
        return 0.0;
    }
    let span = f32::from(cal.el_max - cal.el_min);
    mount::EL_MOUNT_MIN
        + f32::from(adc - cal.el_min) * (mode.el_span_deg() - mount::EL_MOUNT_MIN) / span
}
