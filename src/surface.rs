//! The position-based command surface consumed by the network dialects.
//!
//! [`Rotator`] translates degree-valued requests into ADC targets and state
//! transitions, and translates latched controller faults back into wire
//! error codes. It holds no hardware: everything flows through the shared
//! cells, and the controller picks changes up at its next tick.
//!
//! Every call that needs world coordinates goes through the same readiness
//! gate: report (and clear) a latched fault, otherwise make sure a
//! calibration exists, starting a sweep if it does not. A client that only
//! ever polls position therefore sees a fault exactly once and then gets
//! positions again, while the fault stays latched for anyone who never read
//! it; a client that commands motion clears the fault by virtue of its
//! command.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use crate::cal;
use crate::convert;
use crate::error::RotError;
use crate::mount::{
    ControllerState, MoveDirection, SimMode, StatusFlags, AZ_MOUNT_MAX, AZ_MOUNT_MIN,
    AZ_MOUNT_PARK, EL_MOUNT_MIN, EL_MOUNT_PARK,
};
use crate::state::SharedState;

/// Short description reported by `get_info`.
pub const INFO: &str = "Yaesu G5500 on RPi";

/// Mount capabilities reported by `dump_caps`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Caps {
    /// Minimum azimuth, degrees.
    pub min_az: f32,
    /// Maximum azimuth, degrees.
    pub max_az: f32,
    /// Minimum elevation, degrees.
    pub min_el: f32,
    /// Maximum elevation, degrees; tracks the simulator mode.
    pub max_el: f32,
    /// Status bitset captured at the last controller tick.
    pub status: StatusFlags,
}

/// Pure telemetry snapshot for the web status page. Reading it never
/// clears faults or starts calibration.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    /// Current azimuth, degrees (zero until calibrated).
    pub azimuth: f32,
    /// Current elevation, degrees (zero until calibrated).
    pub elevation: f32,
    /// Controller state name.
    pub state: &'static str,
    /// Raw status bits.
    pub status: u32,
    /// Whether a usable calibration exists.
    pub calibrated: bool,
    /// Active simulator level (0 = real hardware).
    pub simulator: u8,
    /// Last accepted setpoint, degrees.
    pub setpoint: (f32, f32),
}

/// The control surface. Cheap to share: clone the `Arc` it lives in.
pub struct Rotator {
    shared: Arc<SharedState>,
    cal_path: Option<PathBuf>,
    /// Last accepted `set_position`/`park` request, for `get_setpos`.
    setpoint: Mutex<(f32, f32)>,
}

impl Rotator {
    /// Build a surface over the shared cells.
    pub fn new(shared: Arc<SharedState>, cal_path: Option<PathBuf>) -> Self {
        Self {
            shared,
            cal_path,
            setpoint: Mutex::new((0.0, 0.0)),
        }
    }

    // ------------------------------------------------------------------
    // Readiness gate
    // ------------------------------------------------------------------

    /// Report and clear a latched fault, if any.
    fn take_error(&self) -> Option<RotError> {
        let err = match self.shared.controller_state() {
            ControllerState::ErrAdc => RotError::AdcFail,
            ControllerState::ErrNoPower => RotError::NoPower,
            ControllerState::ErrStuck => RotError::Stuck,
            _ => return None,
        };
        // Reporting once resets the controller so the operator can retry;
        // a persistent fault will simply re-latch.
        self.shared.set_controller_state(ControllerState::Stop);
        Some(err)
    }

    /// Ask the controller to begin a calibration sweep, unless one is
    /// already running.
    fn request_calibration(&self) {
        match self.shared.controller_state() {
            ControllerState::Stop | ControllerState::Run => {
                info!("starting calibration sweep");
                self.shared.set_controller_state(ControllerState::CalStart);
            }
            // Already sweeping, or faulted; leave it be.
            _ => {}
        }
    }

    /// Fault and calibration gate run by every position-based operation.
    fn ensure_ready(&self) -> Result<(), RotError> {
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        if self.shared.cal_valid() {
            return Ok(());
        }

        if let Some(path) = &self.cal_path {
            match cal::load(path) {
                Ok(calibration) => {
                    self.shared.store_calibration(&calibration);
                    return Ok(());
                }
                Err(e) => debug!(%e, "calibration file unusable"),
            }
        }

        self.request_calibration();
        Err(RotError::Calibrating)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Command the mount to the given azimuth and elevation, degrees.
    pub fn set_position(&self, az: f32, el: f32) -> Result<(), RotError> {
        self.ensure_ready()?;

        let mode = self.shared.sim_mode();
        if !(AZ_MOUNT_MIN..=AZ_MOUNT_MAX).contains(&az) {
            return Err(RotError::BadArgs);
        }
        if !(EL_MOUNT_MIN..=mode.el_max_deg()).contains(&el) {
            return Err(RotError::BadArgs);
        }

        let calibration = self.shared.calibration();
        self.shared
            .set_az_target(convert::az_to_adc(&calibration, az));
        self.shared
            .set_el_target(convert::el_to_adc(&calibration, mode, el));
        self.shared.set_controller_state(ControllerState::Run);
        *self.setpoint.lock().unwrap() = (az, el);

        debug!(az, el, "position commanded");
        Ok(())
    }

    /// Current position, degrees.
    pub fn get_position(&self) -> Result<(f32, f32), RotError> {
        self.ensure_ready()?;

        let calibration = self.shared.calibration();
        let mode = self.shared.sim_mode();
        Ok((
            convert::adc_to_az(&calibration, self.shared.az_now()),
            convert::adc_to_el(&calibration, mode, self.shared.el_now()),
        ))
    }

    /// Run the chosen axis to its travel limit. The mount has no speed
    /// control, so this is simply a seek to the calibration endpoint.
    pub fn slew(&self, direction: MoveDirection) -> Result<(), RotError> {
        self.ensure_ready()?;

        let calibration = self.shared.calibration();
        match direction {
            MoveDirection::Up => self.shared.set_el_target(calibration.el_max),
            MoveDirection::Down => self.shared.set_el_target(calibration.el_min),
            MoveDirection::Left => self.shared.set_az_target(calibration.az_min),
            MoveDirection::Right => self.shared.set_az_target(calibration.az_max),
        }
        self.shared.set_controller_state(ControllerState::Run);

        debug!(?direction, "slew commanded");
        Ok(())
    }

    /// Command the park position.
    pub fn park(&self) -> Result<(), RotError> {
        self.ensure_ready()?;

        let calibration = self.shared.calibration();
        let mode = self.shared.sim_mode();
        self.shared
            .set_az_target(convert::az_to_adc(&calibration, AZ_MOUNT_PARK));
        self.shared
            .set_el_target(convert::el_to_adc(&calibration, mode, EL_MOUNT_PARK));
        self.shared.set_controller_state(ControllerState::Run);
        *self.setpoint.lock().unwrap() = (AZ_MOUNT_PARK, EL_MOUNT_PARK);

        debug!("park commanded");
        Ok(())
    }

    /// Stop all motion. Always succeeds and never starts a calibration:
    /// a stop must not cause movement under any circumstances.
    pub fn stop(&self) -> Result<(), RotError> {
        self.shared.set_controller_state(ControllerState::Stop);
        debug!("stop commanded");
        Ok(())
    }

    /// Switch simulator modes, resetting calibration and motion state.
    pub fn set_sim_mode(&self, mode: SimMode) {
        info!(level = mode.level(), "simulator mode set");
        self.shared.reset_for_sim(mode);
    }

    /// Active simulator mode.
    pub fn sim_mode(&self) -> SimMode {
        self.shared.sim_mode()
    }

    /// Static description string.
    pub fn get_info(&self) -> &'static str {
        INFO
    }

    /// Mount bounds and current status.
    pub fn caps(&self) -> Caps {
        Caps {
            min_az: AZ_MOUNT_MIN,
            max_az: AZ_MOUNT_MAX,
            min_el: EL_MOUNT_MIN,
            max_el: self.shared.sim_mode().el_max_deg(),
            status: self.shared.status(),
        }
    }

    /// Last accepted setpoint, degrees.
    pub fn last_setpoint(&self) -> (f32, f32) {
        *self.setpoint.lock().unwrap()
    }

    /// Side-effect-free telemetry for the status page.
    pub fn snapshot(&self) -> StatusSnapshot {
        let calibration = self.shared.calibration();
        let mode = self.shared.sim_mode();
        StatusSnapshot {
            azimuth: convert::adc_to_az(&calibration, self.shared.az_now()),
            elevation: convert::adc_to_el(&calibration, mode, self.shared.el_now()),
            state: self.shared.controller_state().name(),
            status: self.shared.status().bits(),
            calibrated: calibration.valid,
            simulator: mode.level(),
            setpoint: self.last_setpoint(),
        }
    }
}

impl std::fmt::Debug for Rotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rotator")
            .field("state", &self.shared.controller_state())
            .field("sim_mode", &self.shared.sim_mode())
            .finish()
    }
}

/// Drop guard used by the binary: releases the controller on shutdown by
/// requesting a stop, then giving the tick loop one period to de-energize.
pub fn shutdown(rotator: &Rotator) {
    let _ = rotator.stop();
    info!("shutting down; giving the controller one tick to release relays");
    std::thread::sleep(std::time::Duration::from_millis(100));
}
