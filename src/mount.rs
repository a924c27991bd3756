//! Mount geometry, simulator modes, and the published status bitset.
//!
//! The G-5500 sweeps azimuth through 450° (90° of mechanical overlap past
//! north) and elevation through 180°. All degree values in the crate are
//! validated against these bounds; ADC counts are validated against the
//! 12-bit converter range.

use bitflags::bitflags;

/// Minimum azimuth, degrees east of true north.
pub const AZ_MOUNT_MIN: f32 = 0.0;
/// Maximum azimuth. The mount overlaps 90° past a full circle.
pub const AZ_MOUNT_MAX: f32 = 450.0;
/// Azimuth at and beyond which the overlap status flag is raised.
pub const AZ_MOUNT_WRAP: f32 = 360.0;
/// Minimum elevation, degrees up from the horizon.
pub const EL_MOUNT_MIN: f32 = 0.0;
/// Maximum elevation. Simulator modes may narrow the effective value.
pub const EL_MOUNT_MAX: f32 = 180.0;

/// Park position, degrees.
pub const AZ_MOUNT_PARK: f32 = 0.0;
/// Park position, degrees.
pub const EL_MOUNT_PARK: f32 = 0.0;

/// Largest count the 12-bit converter can report.
pub const ADC_FULL_SCALE: u16 = 2047;

/// ADC tolerance within which an azimuth target counts as reached.
pub const ADC_AZ_DEADBAND: u16 = 50;
/// ADC tolerance within which an elevation target counts as reached.
pub const ADC_EL_DEADBAND: u16 = 50;

/// Simulated ADC count when azimuth is at its mechanical maximum.
pub const AZ_SIM_MAX_ADC: u16 = 2000;
/// Simulated ADC count when elevation is at its mechanical maximum.
pub const EL_SIM_MAX_ADC: u16 = 2000;
/// Simulated azimuth slew rate, degrees per second.
pub const AZ_SIM_SPEED: f32 = 10.0;
/// Simulated elevation slew rate, degrees per second.
pub const EL_SIM_SPEED: f32 = 5.0;

/// Whether and how to simulate the mount instead of driving hardware.
///
/// Any simulated mode synthesizes a valid calibration so clients can command
/// positions immediately; `Off` requires real hardware and a calibration
/// file (or sweep).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimMode {
    /// Real hardware, no simulation.
    #[default]
    Off,
    /// Simulate azimuth only; elevation is pinned to 0°.
    AzOnly,
    /// Simulate both axes with elevation limited to 90°.
    El90,
    /// Simulate both axes over the full 180° elevation range.
    El180,
}

impl SimMode {
    /// Parse the numeric `simulator` configuration value.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(SimMode::Off),
            1 => Some(SimMode::AzOnly),
            2 => Some(SimMode::El90),
            3 => Some(SimMode::El180),
            _ => None,
        }
    }

    /// The numeric `simulator` configuration value.
    pub fn level(&self) -> u8 {
        match self {
            SimMode::Off => 0,
            SimMode::AzOnly => 1,
            SimMode::El90 => 2,
            SimMode::El180 => 3,
        }
    }

    /// Published maximum elevation in this mode, degrees.
    ///
    /// This is the bound used to validate `set_position` arguments and the
    /// value reported by `dump_caps`.
    pub fn el_max_deg(&self) -> f32 {
        match self {
            SimMode::Off | SimMode::El180 => EL_MOUNT_MAX,
            SimMode::El90 => 90.0,
            SimMode::AzOnly => 0.0,
        }
    }

    /// Elevation span used by the linear count conversion, degrees.
    ///
    /// `AzOnly` keeps a 1° span so the conversion never divides by zero,
    /// even though elevation conversions short-circuit to zero in that mode.
    pub fn el_span_deg(&self) -> f32 {
        match self {
            SimMode::Off | SimMode::El180 => EL_MOUNT_MAX,
            SimMode::El90 => 90.0,
            SimMode::AzOnly => 1.0,
        }
    }
}

/// A run-to-limit motion request, using hamlib's wire encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    /// Elevation increase.
    Up,
    /// Elevation decrease.
    Down,
    /// Azimuth decrease (counter-clockwise).
    Left,
    /// Azimuth increase (clockwise).
    Right,
}

impl MoveDirection {
    /// Decode the hamlib `\move` direction number.
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            2 => Some(MoveDirection::Up),
            4 => Some(MoveDirection::Down),
            8 => Some(MoveDirection::Left),
            16 => Some(MoveDirection::Right),
            _ => None,
        }
    }

    /// Decode the web dialect's `move?direction=` name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(MoveDirection::Up),
            "down" => Some(MoveDirection::Down),
            "left" => Some(MoveDirection::Left),
            "right" => Some(MoveDirection::Right),
            _ => None,
        }
    }
}

bitflags! {
    /// Mount status published once per controller tick.
    ///
    /// Bit values follow hamlib's `rot_status_t` so `dump_caps`-style
    /// consumers see familiar numbers.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// The controller is available for motion commands (not faulted).
        const BUSY = 1 << 0;
        /// Either axis is being driven.
        const MOVING = 1 << 1;
        /// The azimuth axis is being driven.
        const MOVING_AZ = 1 << 2;
        /// Azimuth is rotating counter-clockwise.
        const MOVING_LEFT = 1 << 3;
        /// Azimuth is rotating clockwise.
        const MOVING_RIGHT = 1 << 4;
        /// The elevation axis is being driven.
        const MOVING_EL = 1 << 5;
        /// Elevation is increasing.
        const MOVING_UP = 1 << 6;
        /// Elevation is decreasing.
        const MOVING_DOWN = 1 << 7;
        /// Elevation is within a deadband of its upper limit.
        const LIMIT_UP = 1 << 8;
        /// Elevation is within a deadband of its lower limit.
        const LIMIT_DOWN = 1 << 9;
        /// Azimuth is within a deadband of its counter-clockwise limit.
        const LIMIT_LEFT = 1 << 10;
        /// Azimuth is within a deadband of its clockwise limit.
        const LIMIT_RIGHT = 1 << 11;
        /// Azimuth has rotated past 360° into the overlap region.
        const OVERLAP_RIGHT = 1 << 16;
    }
}

/// Controller state, shared between the tick loop and the command surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    /// All relays released; waiting for a command.
    #[default]
    Stop = 0,
    /// Seeking the commanded ADC targets.
    Run = 1,
    /// Starting a calibration sweep.
    CalStart = 2,
    /// Sweeping both axes toward their mechanical minima.
    CalSeekMins = 3,
    /// Sweeping both axes toward their mechanical maxima.
    CalSeekMaxs = 4,
    /// An ADC read failed.
    ErrAdc = 5,
    /// The rotator's AC supply appears to be off.
    ErrNoPower = 6,
    /// A commanded axis stopped moving away from its limits.
    ErrStuck = 7,
}

impl ControllerState {
    /// Decode the shared-state byte. Unknown values map to `Stop`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ControllerState::Run,
            2 => ControllerState::CalStart,
            3 => ControllerState::CalSeekMins,
            4 => ControllerState::CalSeekMaxs,
            5 => ControllerState::ErrAdc,
            6 => ControllerState::ErrNoPower,
            7 => ControllerState::ErrStuck,
            _ => ControllerState::Stop,
        }
    }

    /// True for the latched fault states.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ControllerState::ErrAdc | ControllerState::ErrNoPower | ControllerState::ErrStuck
        )
    }

    /// True while a calibration sweep is in progress.
    pub fn is_calibrating(&self) -> bool {
        matches!(
            self,
            ControllerState::CalStart
                | ControllerState::CalSeekMins
                | ControllerState::CalSeekMaxs
        )
    }

    /// Short name used in log lines and the status snapshot.
    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Stop => "stop",
            ControllerState::Run => "run",
            ControllerState::CalStart => "cal_start",
            ControllerState::CalSeekMins => "cal_seek_mins",
            ControllerState::CalSeekMaxs => "cal_seek_maxs",
            ControllerState::ErrAdc => "err_adc",
            ControllerState::ErrNoPower => "err_nopower",
            ControllerState::ErrStuck => "err_stuck",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_mode_levels_round_trip() {
        for level in 0..=3 {
            let mode = SimMode::from_level(level).unwrap();
            assert_eq!(mode.level(), level);
        }
        assert_eq!(SimMode::from_level(4), None);
    }

    #[test]
    fn sim_mode_elevation_caps() {
        assert_eq!(SimMode::Off.el_max_deg(), 180.0);
        assert_eq!(SimMode::El180.el_max_deg(), 180.0);
        assert_eq!(SimMode::El90.el_max_deg(), 90.0);
        assert_eq!(SimMode::AzOnly.el_max_deg(), 0.0);
        // Conversion span never collapses to zero.
        assert!(SimMode::AzOnly.el_span_deg() > 0.0);
    }

    #[test]
    fn move_direction_wire_encoding() {
        assert_eq!(MoveDirection::from_wire(2), Some(MoveDirection::Up));
        assert_eq!(MoveDirection::from_wire(4), Some(MoveDirection::Down));
        assert_eq!(MoveDirection::from_wire(8), Some(MoveDirection::Left));
        assert_eq!(MoveDirection::from_wire(16), Some(MoveDirection::Right));
        assert_eq!(MoveDirection::from_wire(3), None);
    }

    #[test]
    fn controller_state_round_trip() {
        for state in [
            ControllerState::Stop,
            ControllerState::Run,
            ControllerState::CalStart,
            ControllerState::CalSeekMins,
            ControllerState::CalSeekMaxs,
            ControllerState::ErrAdc,
            ControllerState::ErrNoPower,
            ControllerState::ErrStuck,
        ] {
            assert_eq!(ControllerState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn error_states_flagged() {
        assert!(ControllerState::ErrAdc.is_error());
        assert!(ControllerState::ErrNoPower.is_error());
        assert!(ControllerState::ErrStuck.is_error());
        assert!(!ControllerState::Run.is_error());
        assert!(ControllerState::CalSeekMins.is_calibrating());
        assert!(!ControllerState::Stop.is_calibrating());
    }
}
