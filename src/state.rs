//! Lock-free state shared between the motion controller and the command
//! surface.
//!
//! Every cell is a single machine word with one designated writer: the
//! controller publishes live counts, direction flags, and the status bitset;
//! the surface writes the targets. The `state` and calibration cells accept
//! writes from both sides (the surface requests transitions and installs
//! file-loaded or synthesized endpoints; the controller latches faults and
//! sweep results), which is safe because every access is a whole-word atomic
//! and no reader assumes two cells are consistent with each other.
//!
//! `Relaxed` ordering is sufficient throughout: the controller rereads every
//! input at each tick, so cross-cell ordering carries no meaning.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering::Relaxed};

use crate::cal::Calibration;
use crate::mount::{
    ControllerState, SimMode, StatusFlags, AZ_SIM_MAX_ADC, EL_SIM_MAX_ADC,
};

/// Sentinel for "no simulator-mode change pending".
const SIM_MODE_NONE: u8 = u8::MAX;

/// The shared cells. Construct once, wrap in an `Arc`, and hand clones to
/// the controller and every service.
#[derive(Debug)]
pub struct SharedState {
    adc_az_now: AtomicU16,
    adc_el_now: AtomicU16,
    adc_az_target: AtomicU16,
    adc_el_target: AtomicU16,

    az_cw: AtomicBool,
    az_ccw: AtomicBool,
    el_up: AtomicBool,
    el_down: AtomicBool,

    state: AtomicU8,
    status: AtomicU32,

    cal_az_min: AtomicU16,
    cal_az_max: AtomicU16,
    cal_el_min: AtomicU16,
    cal_el_max: AtomicU16,
    cal_valid: AtomicBool,

    sim_mode: AtomicU8,
    pending_sim_mode: AtomicU8,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Fresh state: stopped, uncalibrated, simulation off.
    pub fn new() -> Self {
        Self {
            adc_az_now: AtomicU16::new(0),
            adc_el_now: AtomicU16::new(0),
            adc_az_target: AtomicU16::new(0),
            adc_el_target: AtomicU16::new(0),
            az_cw: AtomicBool::new(false),
            az_ccw: AtomicBool::new(false),
            el_up: AtomicBool::new(false),
            el_down: AtomicBool::new(false),
            state: AtomicU8::new(ControllerState::Stop as u8),
            status: AtomicU32::new(0),
            cal_az_min: AtomicU16::new(0),
            cal_az_max: AtomicU16::new(0),
            cal_el_min: AtomicU16::new(0),
            cal_el_max: AtomicU16::new(0),
            cal_valid: AtomicBool::new(false),
            sim_mode: AtomicU8::new(SimMode::Off.level()),
            pending_sim_mode: AtomicU8::new(SIM_MODE_NONE),
        }
    }

    // ------------------------------------------------------------------
    // Live counts (controller writes)
    // ------------------------------------------------------------------

    /// Most recent azimuth ADC count.
    pub fn az_now(&self) -> u16 {
        self.adc_az_now.load(Relaxed)
    }

    /// Most recent elevation ADC count.
    pub fn el_now(&self) -> u16 {
        self.adc_el_now.load(Relaxed)
    }

    /// Publish fresh axis counts. Controller only.
    pub fn set_now(&self, az: u16, el: u16) {
        self.adc_az_now.store(az, Relaxed);
        self.adc_el_now.store(el, Relaxed);
    }

    // ------------------------------------------------------------------
    // Targets (surface writes)
    // ------------------------------------------------------------------

    /// Commanded azimuth ADC count.
    pub fn az_target(&self) -> u16 {
        self.adc_az_target.load(Relaxed)
    }

    /// Commanded elevation ADC count.
    pub fn el_target(&self) -> u16 {
        self.adc_el_target.load(Relaxed)
    }

    /// Set the azimuth target. Surface only.
    pub fn set_az_target(&self, adc: u16) {
        self.adc_az_target.store(adc, Relaxed);
    }

    /// Set the elevation target. Surface only.
    pub fn set_el_target(&self, adc: u16) {
        self.adc_el_target.store(adc, Relaxed);
    }

    // ------------------------------------------------------------------
    // Direction flags (controller writes)
    // ------------------------------------------------------------------

    /// Commanded direction flags as `(cw, ccw, up, down)`.
    pub fn direction_flags(&self) -> (bool, bool, bool, bool) {
        (
            self.az_cw.load(Relaxed),
            self.az_ccw.load(Relaxed),
            self.el_up.load(Relaxed),
            self.el_down.load(Relaxed),
        )
    }

    /// Publish azimuth direction flags. Controller only.
    pub fn set_az_flags(&self, cw: bool, ccw: bool) {
        // Clear before set so an observer never sees both raised.
        if cw || ccw {
            self.az_cw.store(false, Relaxed);
            self.az_ccw.store(false, Relaxed);
        }
        self.az_cw.store(cw, Relaxed);
        self.az_ccw.store(ccw, Relaxed);
    }

    /// Publish elevation direction flags. Controller only.
    pub fn set_el_flags(&self, up: bool, down: bool) {
        if up || down {
            self.el_up.store(false, Relaxed);
            self.el_down.store(false, Relaxed);
        }
        self.el_up.store(up, Relaxed);
        self.el_down.store(down, Relaxed);
    }

    // ------------------------------------------------------------------
    // Controller state
    // ------------------------------------------------------------------

    /// Current controller state.
    pub fn controller_state(&self) -> ControllerState {
        ControllerState::from_u8(self.state.load(Relaxed))
    }

    /// Write the controller state.
    pub fn set_controller_state(&self, state: ControllerState) {
        self.state.store(state as u8, Relaxed);
    }

    // ------------------------------------------------------------------
    // Status bitset (controller writes)
    // ------------------------------------------------------------------

    /// Status bitset captured at the last tick.
    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.status.load(Relaxed))
    }

    /// Publish the status bitset. Controller only.
    pub fn set_status(&self, status: StatusFlags) {
        self.status.store(status.bits(), Relaxed);
    }

    // ------------------------------------------------------------------
    // Calibration
    // ------------------------------------------------------------------

    /// Snapshot of the calibration cells.
    pub fn calibration(&self) -> Calibration {
        Calibration {
            az_min: self.cal_az_min.load(Relaxed),
            az_max: self.cal_az_max.load(Relaxed),
            el_min: self.cal_el_min.load(Relaxed),
            el_max: self.cal_el_max.load(Relaxed),
            valid: self.cal_valid.load(Relaxed),
        }
    }

    /// Whether the calibration cells hold usable endpoints.
    pub fn cal_valid(&self) -> bool {
        self.cal_valid.load(Relaxed)
    }

    /// Install endpoints and mark them valid.
    pub fn store_calibration(&self, cal: &Calibration) {
        self.cal_az_min.store(cal.az_min, Relaxed);
        self.cal_az_max.store(cal.az_max, Relaxed);
        self.cal_el_min.store(cal.el_min, Relaxed);
        self.cal_el_max.store(cal.el_max, Relaxed);
        self.cal_valid.store(true, Relaxed);
    }

    /// Latch minima found by the calibration sweep. Controller only.
    pub fn latch_cal_minima(&self, az_min: u16, el_min: u16) {
        self.cal_az_min.store(az_min, Relaxed);
        self.cal_el_min.store(el_min, Relaxed);
    }

    /// Latch maxima found by the calibration sweep. Controller only.
    pub fn latch_cal_maxima(&self, az_max: u16, el_max: u16) {
        self.cal_az_max.store(az_max, Relaxed);
        self.cal_el_max.store(el_max, Relaxed);
    }

    /// Mark the calibration cells usable (or not). The controller sets this
    /// after a sweep whose spans pass the sanity check.
    pub fn set_cal_valid(&self, valid: bool) {
        self.cal_valid.store(valid, Relaxed);
    }

    // ------------------------------------------------------------------
    // Simulator mode
    // ------------------------------------------------------------------

    /// Active simulator mode.
    pub fn sim_mode(&self) -> SimMode {
        SimMode::from_level(self.sim_mode.load(Relaxed)).unwrap_or(SimMode::Off)
    }

    /// Take a pending simulator-mode change, if any. Controller only.
    pub fn take_pending_sim_mode(&self) -> Option<SimMode> {
        let level = self.pending_sim_mode.swap(SIM_MODE_NONE, Relaxed);
        SimMode::from_level(level)
    }

    /// Switch simulator modes: synthesize or clear the calibration, reset
    /// targets, counts, and flags, and stop the controller. The new mode is
    /// also queued for the controller to forward to its HAL at the next
    /// tick. Surface only.
    pub fn reset_for_sim(&self, mode: SimMode) {
        self.sim_mode.store(mode.level(), Relaxed);
        self.pending_sim_mode.store(mode.level(), Relaxed);

        match mode {
            SimMode::Off => {
                // Force the next command to reload the calibration file.
                self.cal_valid.store(false, Relaxed);
            }
            SimMode::AzOnly | SimMode::El180 => {
                self.store_calibration(&Calibration::new(0, AZ_SIM_MAX_ADC, 0, EL_SIM_MAX_ADC));
            }
            SimMode::El90 => {
                self.store_calibration(&Calibration::new(
                    0,
                    AZ_SIM_MAX_ADC,
                    0,
                    EL_SIM_MAX_ADC / 2,
                ));
            }
        }

        self.set_controller_state(ControllerState::Stop);
        self.set_az_flags(false, false);
        self.set_el_flags(false, false);
        self.set_now(0, 0);
        self.set_az_target(0);
        self.set_el_target(0);
        self.set_status(StatusFlags::empty());
    }
}
