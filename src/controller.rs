//! The closed-loop motion controller.
//!
//! One [`Controller`] owns the HAL for the life of the process and runs the
//! tick loop on a dedicated thread: read positions, update stall detection,
//! publish status, then act on the current [`ControllerState`]. Only this
//! loop ever touches pins or the ADC; everything else communicates through
//! [`SharedState`].
//!
//! Faults latch into the shared state and keep the relays released until the
//! command surface clears them; the loop itself never retries anything,
//! because the faults it can see (lost AC power, a jammed axis, a dead ADC)
//! all need a human.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use g5500d::controller::Controller;
//! use g5500d::hal::MockRotator;
//! use g5500d::state::SharedState;
//!
//! let shared = Arc::new(SharedState::new());
//! let mut controller = Controller::new(MockRotator::new(), Arc::clone(&shared), None);
//!
//! // Tests drive ticks by hand; the daemon calls `spawn` instead.
//! controller.tick();
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::cal;
use crate::convert;
use crate::hal::{AdcChannel, RelayPin, RotatorHal};
use crate::mount::{
    ControllerState, StatusFlags, ADC_AZ_DEADBAND, ADC_EL_DEADBAND, AZ_MOUNT_WRAP,
};
use crate::state::SharedState;

/// Polling period of the control loop.
pub const TICK: Duration = Duration::from_millis(200);

/// Extra pause after commanding motion at a calibration phase change, so a
/// motor that has not spun up yet is not mistaken for one pinned on a limit.
pub const MOTION_START_PERIOD: Duration = Duration::from_secs(1);

/// Consecutive identical readings on a commanded axis that count as stalled.
///
/// Exact equality is deliberate: at this gain the ADS1015 has enough natural
/// dither that a genuinely moving axis never repeats a reading four times in
/// 800 ms. An exponential average was tried in an earlier life of this
/// driver and was too easily fooled by bogus readings.
pub const STALL_TICKS: u8 = 4;

/// Minimum count on the power-sense channel for the supply to be considered
/// on.
pub const ADC_MIN_POWER_OK: u16 = 1000;

/// The control-loop owner. Generic over the HAL so tests can swap in the
/// mock or simulator.
pub struct Controller<H: RotatorHal> {
    hal: H,
    shared: Arc<SharedState>,
    /// Where to persist sweep results; `None` skips persistence.
    cal_path: Option<PathBuf>,
    prev_az: u16,
    prev_el: u16,
    az_n_equal: u8,
    el_n_equal: u8,
}

impl<H: RotatorHal> Controller<H> {
    /// Wrap a HAL and the shared cells. The HAL must already be
    /// initialized.
    pub fn new(hal: H, shared: Arc<SharedState>, cal_path: Option<PathBuf>) -> Self {
        Self {
            hal,
            shared,
            cal_path,
            prev_az: 0,
            prev_el: 0,
            az_n_equal: 0,
            el_n_equal: 0,
        }
    }

    /// Access the HAL, e.g. to rig the simulator in tests.
    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    /// Run one tick and return how long to sleep before the next one.
    pub fn tick(&mut self) -> Duration {
        if let Some(mode) = self.shared.take_pending_sim_mode() {
            debug!(level = mode.level(), "applying simulator mode");
            self.hal.apply_sim_mode(mode);
            self.prev_az = 0;
            self.prev_el = 0;
            self.az_n_equal = 0;
            self.el_n_equal = 0;
        }

        self.hal.advance(TICK);

        if self.read_positions() {
            self.update_stall_counters();
            self.prev_az = self.shared.az_now();
            self.prev_el = self.shared.el_now();
        }

        self.capture_status();

        let state = self.shared.controller_state();
        trace!(
            state = state.name(),
            az_now = self.shared.az_now(),
            az_target = self.shared.az_target(),
            az_n_equal = self.az_n_equal,
            el_now = self.shared.el_now(),
            el_target = self.shared.el_target(),
            el_n_equal = self.el_n_equal,
            "tick"
        );

        self.act(state)
    }

    /// Tick forever. Never returns; the thread is bounded by process
    /// lifetime.
    pub fn run(mut self) -> ! {
        self.az_stop();
        self.el_stop();
        loop {
            let pause = self.tick();
            thread::sleep(pause);
        }
    }

    /// Spawn the tick loop on its own named thread.
    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<()>>
    where
        H: Send + 'static,
    {
        thread::Builder::new()
            .name("g5500-controller".into())
            .spawn(move || self.run())
    }

    // ------------------------------------------------------------------
    // Measurement
    // ------------------------------------------------------------------

    /// Read power and both axis channels into the shared state. On failure
    /// the matching error state is latched and `false` returned.
    fn read_positions(&mut self) -> bool {
        match self.hal.read_adc(AdcChannel::Power) {
            Err(e) => {
                error!(%e, "power ADC read failed");
                self.shared.set_controller_state(ControllerState::ErrAdc);
                return false;
            }
            Ok(counts) if counts < ADC_MIN_POWER_OK => {
                error!(counts, "rotator power is off");
                self.shared
                    .set_controller_state(ControllerState::ErrNoPower);
                return false;
            }
            Ok(_) => {}
        }

        let az = match self.hal.read_adc(AdcChannel::Azimuth) {
            Ok(counts) => counts,
            Err(e) => {
                error!(%e, "azimuth ADC read failed");
                self.shared.set_controller_state(ControllerState::ErrAdc);
                return false;
            }
        };
        let el = match self.hal.read_adc(AdcChannel::Elevation) {
            Ok(counts) => counts,
            Err(e) => {
                error!(%e, "elevation ADC read failed");
                self.shared.set_controller_state(ControllerState::ErrAdc);
                return false;
            }
        };

        self.shared.set_now(az, el);
        true
    }

    fn update_stall_counters(&mut self) {
        let (cw, ccw, up, down) = self.shared.direction_flags();

        if (cw || ccw) && self.shared.az_now() == self.prev_az {
            // Cap so long stalls cannot wrap the counter.
            if self.az_n_equal < STALL_TICKS {
                self.az_n_equal += 1;
            }
        } else {
            self.az_n_equal = 0;
        }

        if (up || down) && self.shared.el_now() == self.prev_el {
            if self.el_n_equal < STALL_TICKS {
                self.el_n_equal += 1;
            }
        } else {
            self.el_n_equal = 0;
        }
    }

    fn az_stuck(&self) -> bool {
        let (cw, ccw, _, _) = self.shared.direction_flags();
        (cw || ccw) && self.az_n_equal >= STALL_TICKS
    }

    fn el_stuck(&self) -> bool {
        let (_, _, up, down) = self.shared.direction_flags();
        (up || down) && self.el_n_equal >= STALL_TICKS
    }

    // ------------------------------------------------------------------
    // Low-level motion commands
    // ------------------------------------------------------------------
    // Each clears the opposing line before energizing the new one so the
    // relays never fight, and mirrors the command into the shared flags.

    fn az_stop(&mut self) {
        self.hal.set_pin(RelayPin::AzCw, false);
        self.hal.set_pin(RelayPin::AzCcw, false);
        self.shared.set_az_flags(false, false);
    }

    fn el_stop(&mut self) {
        self.hal.set_pin(RelayPin::ElUp, false);
        self.hal.set_pin(RelayPin::ElDown, false);
        self.shared.set_el_flags(false, false);
    }

    fn rotate_cw(&mut self) {
        self.hal.set_pin(RelayPin::AzCcw, false);
        self.hal.set_pin(RelayPin::AzCw, true);
        self.shared.set_az_flags(true, false);
    }

    fn rotate_ccw(&mut self) {
        self.hal.set_pin(RelayPin::AzCw, false);
        self.hal.set_pin(RelayPin::AzCcw, true);
        self.shared.set_az_flags(false, true);
    }

    fn rotate_up(&mut self) {
        self.hal.set_pin(RelayPin::ElDown, false);
        self.hal.set_pin(RelayPin::ElUp, true);
        self.shared.set_el_flags(true, false);
    }

    fn rotate_down(&mut self) {
        self.hal.set_pin(RelayPin::ElUp, false);
        self.hal.set_pin(RelayPin::ElDown, true);
        self.shared.set_el_flags(false, true);
    }

    // ------------------------------------------------------------------
    // Status publication
    // ------------------------------------------------------------------

    fn capture_status(&mut self) {
        let mut status = StatusFlags::empty();
        let (cw, ccw, up, down) = self.shared.direction_flags();

        if cw {
            status |= StatusFlags::MOVING | StatusFlags::MOVING_AZ | StatusFlags::MOVING_RIGHT;
        }
        if ccw {
            status |= StatusFlags::MOVING | StatusFlags::MOVING_AZ | StatusFlags::MOVING_LEFT;
        }
        if up {
            status |= StatusFlags::MOVING | StatusFlags::MOVING_EL | StatusFlags::MOVING_UP;
        }
        if down {
            status |= StatusFlags::MOVING | StatusFlags::MOVING_EL | StatusFlags::MOVING_DOWN;
        }

        let cal = self.shared.calibration();
        if cal.valid {
            let az = self.shared.az_now();
            let el = self.shared.el_now();
            if az < cal.az_min.saturating_add(ADC_AZ_DEADBAND) {
                status |= StatusFlags::LIMIT_LEFT;
            }
            if cal.az_max < az.saturating_add(ADC_AZ_DEADBAND) {
                status |= StatusFlags::LIMIT_RIGHT;
            }
            if el < cal.el_min.saturating_add(ADC_EL_DEADBAND) {
                status |= StatusFlags::LIMIT_DOWN;
            }
            if cal.el_max < el.saturating_add(ADC_EL_DEADBAND) {
                status |= StatusFlags::LIMIT_UP;
            }
            if convert::adc_to_az(&cal, az) >= AZ_MOUNT_WRAP {
                status |= StatusFlags::OVERLAP_RIGHT;
            }
        }

        if !self.shared.controller_state().is_error() {
            status |= StatusFlags::BUSY;
        }

        self.shared.set_status(status);
    }

    // ------------------------------------------------------------------
    // State actions
    // ------------------------------------------------------------------

    fn act(&mut self, state: ControllerState) -> Duration {
        match state {
            ControllerState::Stop => {
                self.az_stop();
                self.el_stop();
                TICK
            }

            ControllerState::Run => {
                self.seek_targets();
                TICK
            }

            ControllerState::CalStart => {
                debug!("calibration: driving both axes to their minima");
                self.rotate_ccw();
                self.rotate_down();
                self.shared
                    .set_controller_state(ControllerState::CalSeekMins);
                TICK + MOTION_START_PERIOD
            }

            ControllerState::CalSeekMins => {
                if self.az_stuck() && self.el_stuck() {
                    let az_min = self.shared.az_now();
                    let el_min = self.shared.el_now();
                    debug!(az_min, el_min, "calibration: minima found, seeking maxima");
                    self.shared.latch_cal_minima(az_min, el_min);
                    self.rotate_cw();
                    self.rotate_up();
                    self.shared
                        .set_controller_state(ControllerState::CalSeekMaxs);
                    return TICK + MOTION_START_PERIOD;
                }
                TICK
            }

            ControllerState::CalSeekMaxs => {
                if self.az_stuck() && self.el_stuck() {
                    let az_max = self.shared.az_now();
                    let el_max = self.shared.el_now();
                    debug!(az_max, el_max, "calibration: maxima found");
                    self.shared.latch_cal_maxima(az_max, el_max);
                    self.finish_calibration();
                    self.az_stop();
                    self.el_stop();
                    self.shared.set_controller_state(ControllerState::Stop);
                }
                TICK
            }

            ControllerState::ErrAdc | ControllerState::ErrNoPower | ControllerState::ErrStuck => {
                self.az_stop();
                self.el_stop();
                TICK
            }
        }
    }

    /// Seek the commanded targets, one axis at a time. Targets are read
    /// fresh here, so a target written moments ago by the surface wins over
    /// any stop decision from earlier in the same tick.
    fn seek_targets(&mut self) {
        let az_now = self.shared.az_now();
        let az_target = self.shared.az_target();

        if self.az_stuck() {
            warn!(az_now, az_target, "azimuth axis stuck");
            self.az_stop();
            self.shared.set_controller_state(ControllerState::ErrStuck);
        } else {
            let (cw, ccw, _, _) = self.shared.direction_flags();
            if ccw {
                // Moving toward lower counts; stop at or past the target.
                // No deadband on this side, to avoid overshoot thrash.
                if az_now <= az_target {
                    self.az_stop();
                }
            } else if cw {
                if az_now >= az_target {
                    self.az_stop();
                }
            } else if az_now > az_target.saturating_add(ADC_AZ_DEADBAND) {
                self.rotate_ccw();
            } else if az_now.saturating_add(ADC_AZ_DEADBAND) < az_target {
                self.rotate_cw();
            } else {
                self.az_stop();
            }
        }

        let el_now = self.shared.el_now();
        let el_target = self.shared.el_target();

        if self.el_stuck() {
            warn!(el_now, el_target, "elevation axis stuck");
            self.el_stop();
            self.shared.set_controller_state(ControllerState::ErrStuck);
        } else {
            let (_, _, up, down) = self.shared.direction_flags();
            if down {
                if el_now <= el_target {
                    self.el_stop();
                }
            } else if up {
                if el_now >= el_target {
                    self.el_stop();
                }
            } else if el_now > el_target.saturating_add(ADC_EL_DEADBAND) {
                self.rotate_down();
            } else if el_now.saturating_add(ADC_EL_DEADBAND) < el_target {
                self.rotate_up();
            } else {
                self.el_stop();
            }
        }
    }

    /// Persist sweep results and mark them valid when plausible.
    fn finish_calibration(&mut self) {
        let cal = self.shared.calibration();
        if cal.spans_ok() {
            self.shared.set_cal_valid(true);
        } else {
            warn!(%cal, "sweep produced an implausible span; not marking valid");
        }
        match &self.cal_path {
            Some(path) => {
                if let Err(e) = cal::save(path, &cal) {
                    warn!(%e, path = %path.display(), "could not save calibration");
                }
            }
            None => warn!("no calibration path configured; sweep results not persisted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cal::Calibration;
    use crate::hal::MockRotator;

    fn setup() -> (Controller<MockRotator>, Arc<SharedState>) {
        let shared = Arc::new(SharedState::new());
        let controller = Controller::new(MockRotator::new(), Arc::clone(&shared), None);
        (controller, shared)
    }

    fn setup_calibrated() -> (Controller<MockRotator>, Arc<SharedState>) {
        let (controller, shared) = setup();
        shared.store_calibration(&Calibration::new(0, 2000, 0, 2000));
        (controller, shared)
    }

    // =========================================================================
    // Stop and error states
    // =========================================================================

    #[test]
    fn stop_state_releases_pins() {
        let (mut controller, shared) = setup();
        controller.hal_mut().set_pin(RelayPin::AzCw, true);

        controller.tick();

        assert!(controller.hal_mut().all_pins_low());
        assert_eq!(shared.direction_flags(), (false, false, false, false));
    }

    #[test]
    fn power_fail_latches_err_nopower() {
        let (mut controller, shared) = setup_calibrated();
        shared.set_controller_state(ControllerState::Run);
        shared.set_az_target(1000);
        controller.hal_mut().queue_power(500);

        controller.tick();

        assert_eq!(shared.controller_state(), ControllerState::ErrNoPower);
        assert!(controller.hal_mut().all_pins_low());
    }

    #[test]
    fn adc_fail_latches_err_adc() {
        let (mut controller, shared) = setup_calibrated();
        shared.set_controller_state(ControllerState::Run);
        controller.hal_mut().fail_az_read("bus timeout");

        controller.tick();

        assert_eq!(shared.controller_state(), ControllerState::ErrAdc);
        assert!(controller.hal_mut().all_pins_low());
    }

    #[test]
    fn error_state_persists_across_ticks() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().queue_power(0);
        shared.set_controller_state(ControllerState::Run);
        controller.tick();
        assert_eq!(shared.controller_state(), ControllerState::ErrNoPower);

        // Power is healthy again, but the latch holds until the surface
        // clears it.
        for _ in 0..5 {
            controller.tick();
            assert_eq!(shared.controller_state(), ControllerState::ErrNoPower);
            assert!(controller.hal_mut().all_pins_low());
        }
    }

    // =========================================================================
    // Target seeking
    // =========================================================================

    #[test]
    fn run_drives_cw_toward_higher_target() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().set_levels(500, 0);
        shared.set_az_target(1500);
        shared.set_controller_state(ControllerState::Run);

        controller.tick();

        assert!(controller.hal_mut().pin(RelayPin::AzCw));
        assert!(!controller.hal_mut().pin(RelayPin::AzCcw));
        let (cw, ccw, _, _) = shared.direction_flags();
        assert!(cw && !ccw);
    }

    #[test]
    fn run_drives_ccw_toward_lower_target() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().set_levels(1500, 0);
        shared.set_az_target(500);
        shared.set_controller_state(ControllerState::Run);

        controller.tick();

        assert!(controller.hal_mut().pin(RelayPin::AzCcw));
        assert!(!controller.hal_mut().pin(RelayPin::AzCw));
    }

    #[test]
    fn run_stops_when_crossing_target() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().set_levels(500, 0);
        shared.set_az_target(560);
        shared.set_controller_state(ControllerState::Run);

        controller.tick();
        assert!(controller.hal_mut().pin(RelayPin::AzCw));

        // Crossed the target: stop without any deadband.
        controller.hal_mut().set_levels(565, 0);
        controller.tick();
        assert!(controller.hal_mut().all_pins_low());
        assert_eq!(shared.controller_state(), ControllerState::Run);
    }

    #[test]
    fn run_idles_within_deadband() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().set_levels(500, 500);
        shared.set_az_target(520);
        shared.set_el_target(480);
        shared.set_controller_state(ControllerState::Run);

        controller.tick();

        assert!(controller.hal_mut().all_pins_low());
    }

    #[test]
    fn elevation_seeks_independently_of_azimuth() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().set_levels(1000, 200);
        shared.set_az_target(1000);
        shared.set_el_target(1500);
        shared.set_controller_state(ControllerState::Run);

        controller.tick();

        assert!(!controller.hal_mut().pin(RelayPin::AzCw));
        assert!(controller.hal_mut().pin(RelayPin::ElUp));
    }

    #[test]
    fn stalled_axis_latches_err_stuck() {
        let (mut controller, shared) = setup_calibrated();
        // Azimuth never moves even though it is commanded.
        controller.hal_mut().set_levels(500, 0);
        shared.set_az_target(1800);
        shared.set_controller_state(ControllerState::Run);

        for _ in 0..10 {
            controller.tick();
            if shared.controller_state() == ControllerState::ErrStuck {
                break;
            }
        }

        assert_eq!(shared.controller_state(), ControllerState::ErrStuck);
        assert!(controller.hal_mut().all_pins_low());
        assert_eq!(shared.direction_flags(), (false, false, false, false));
    }

    #[test]
    fn moving_readings_reset_the_stall_counter() {
        let (mut controller, shared) = setup_calibrated();
        shared.set_az_target(1800);
        shared.set_controller_state(ControllerState::Run);

        // Dithering readings: never four in a row equal.
        for i in 0..20u16 {
            controller.hal_mut().set_levels(500 + i * 3, 0);
            controller.tick();
        }

        assert_eq!(shared.controller_state(), ControllerState::Run);
    }

    // =========================================================================
    // Calibration sweep
    // =========================================================================

    #[test]
    fn cal_start_commands_minima_and_pauses() {
        let (mut controller, shared) = setup();
        shared.set_controller_state(ControllerState::CalStart);

        let pause = controller.tick();

        assert_eq!(shared.controller_state(), ControllerState::CalSeekMins);
        assert!(controller.hal_mut().pin(RelayPin::AzCcw));
        assert!(controller.hal_mut().pin(RelayPin::ElDown));
        assert!(pause > TICK, "expected the motion-start guard");
    }

    #[test]
    fn full_sweep_on_frozen_axes_completes_but_stays_invalid() {
        // Both axes read constant values, so the sweep latches immediately;
        // the resulting zero spans must not be marked valid.
        let (mut controller, shared) = setup();
        controller.hal_mut().set_levels(300, 280);
        shared.set_controller_state(ControllerState::CalStart);

        for _ in 0..30 {
            controller.tick();
            if shared.controller_state() == ControllerState::Stop {
                break;
            }
        }

        assert_eq!(shared.controller_state(), ControllerState::Stop);
        let calibration = shared.calibration();
        assert_eq!(calibration.az_min, 300);
        assert_eq!(calibration.az_max, 300);
        assert!(!calibration.valid);
        assert!(controller.hal_mut().all_pins_low());
    }

    // =========================================================================
    // Status flags
    // =========================================================================

    #[test]
    fn status_reports_motion_and_busy() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().set_levels(500, 0);
        shared.set_az_target(1500);
        shared.set_controller_state(ControllerState::Run);

        controller.tick();
        controller.tick();

        let status = shared.status();
        assert!(status.contains(StatusFlags::BUSY));
        assert!(status.contains(StatusFlags::MOVING));
        assert!(status.contains(StatusFlags::MOVING_AZ));
        assert!(status.contains(StatusFlags::MOVING_RIGHT));
        assert!(!status.contains(StatusFlags::MOVING_LEFT));
    }

    #[test]
    fn status_drops_busy_in_error_states() {
        let (mut controller, shared) = setup_calibrated();
        controller.hal_mut().queue_power(0);
        controller.tick();

        assert!(!shared.status().contains(StatusFlags::BUSY));
    }

    #[test]
    fn status_reports_limits_and_overlap() {
        let (mut controller, shared) = setup_calibrated();
        // 1980 of 0..2000 counts is 445 degrees: well past the wrap and
        // within a deadband of the clockwise limit; elevation near bottom.
        controller.hal_mut().set_levels(1980, 10);
        controller.tick();

        let status = shared.status();
        assert!(status.contains(StatusFlags::OVERLAP_RIGHT));
        assert!(status.contains(StatusFlags::LIMIT_RIGHT));
        assert!(status.contains(StatusFlags::LIMIT_DOWN));
        assert!(!status.contains(StatusFlags::LIMIT_LEFT));
    }

    #[test]
    fn at_most_one_direction_flag_per_axis() {
        let (mut controller, shared) = setup_calibrated();
        shared.set_controller_state(ControllerState::Run);

        // Bounce the target around; the flag pair must stay exclusive.
        for (level, target) in [(500u16, 1500u16), (1500, 200), (200, 1900), (1900, 0)] {
            controller.hal_mut().set_levels(level, level);
            shared.set_az_target(target);
            shared.set_el_target(target);
            controller.tick();
            let (cw, ccw, up, down) = shared.direction_flags();
            assert!(!(cw && ccw), "cw and ccw both raised");
            assert!(!(up && down), "up and down both raised");
        }
    }
}
