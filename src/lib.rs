//! # g5500d
//!
//! A headless daemon that drives a Yaesu G-5500 azimuth/elevation antenna
//! rotator attached to a Raspberry Pi: four relay lines for motion, an
//! ADS1015 ADC for position feedback and power sensing, and two TCP command
//! dialects (hamlib rotctld and a permissive web/direct dialect) on top of
//! a position-based control surface.
//!
//! ## Architecture
//!
//! One dedicated thread owns all hardware access and runs the motion
//! control loop; everything else talks to it through word-sized shared
//! cells, each with a single designated writer:
//!
//! - `hal` - hardware abstraction (real Pi, simulator, test mock)
//! - `cal` - persistent ADC calibration endpoints
//! - `convert` - pure degree/count conversions
//! - `state` - the lock-free shared cells
//! - `controller` - the tick loop and its state machine
//! - `surface` - the position-based command facade
//! - `services` - the two TCP dialects
//!
//! The crate is structured so everything above `hal` runs unmodified on a
//! desktop: the simulator moves synthetic ADC counts in response to the
//! same relay commands the real mount receives, including stalling against
//! its travel limits, so even the calibration sweep can be exercised
//! without hardware.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use g5500d::controller::Controller;
//! use g5500d::hal::SimRotator;
//! use g5500d::mount::SimMode;
//! use g5500d::state::SharedState;
//! use g5500d::surface::Rotator;
//!
//! let shared = Arc::new(SharedState::new());
//! let rotator = Rotator::new(Arc::clone(&shared), None);
//! rotator.set_sim_mode(SimMode::El180);
//!
//! let mut controller = Controller::new(
//!     SimRotator::new(SimMode::El180),
//!     Arc::clone(&shared),
//!     None,
//! );
//!
//! rotator.set_position(90.0, 45.0).unwrap();
//! for _ in 0..100 {
//!     controller.tick();
//! }
//! let (az, _el) = rotator.get_position().unwrap();
//! assert!((az - 90.0).abs() < 15.0);
//! ```

#![warn(missing_docs)]

/// Persistent storage for the ADC calibration endpoints.
pub mod cal;
/// Daemon configuration and port defaults.
pub mod config;
/// The motion controller and its tick loop.
pub mod controller;
/// Pure conversions between degrees and ADC counts.
pub mod convert;
/// Error taxonomy and wire codes.
pub mod error;
/// Hardware abstraction: real Pi, simulator, and test mock.
pub mod hal;
/// Mount geometry, simulator modes, and status flags.
pub mod mount;
/// The two TCP command dialects.
pub mod services;
/// Lock-free state shared between controller and command surface.
pub mod state;
/// The position-based command surface.
pub mod surface;

// Re-exports for convenience
pub use cal::Calibration;
pub use config::Config;
pub use controller::Controller;
pub use error::RotError;
pub use mount::{ControllerState, MoveDirection, SimMode, StatusFlags};
pub use state::SharedState;
pub use surface::Rotator;
