//! Daemon configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::mount::SimMode;

/// Default rotctld-dialect port, matching hamlib's rotctld.
pub const DEF_ROT_PORT: u16 = 4533;

/// Default web-dialect port.
pub const DEF_WEB_PORT: u16 = 8008;

/// rotctld clients are limited to one at a time: a second client has no way
/// to know the position commanded by the first.
pub const MAX_ROT_CLIENTS: usize = 1;

/// Web clients can reconcile through `get_setpos`, so several are allowed.
pub const MAX_WEB_CLIENTS: usize = 5;

/// Complete daemon configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bind address for the rotctld dialect.
    pub rot_addr: SocketAddr,
    /// Bind address for the web dialect.
    pub web_addr: SocketAddr,
    /// Simulator mode selected at startup.
    pub simulator: SimMode,
    /// Calibration file location; `None` falls back to `$HOME`.
    pub cal_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rot_addr: ([0, 0, 0, 0], DEF_ROT_PORT).into(),
            web_addr: ([0, 0, 0, 0], DEF_WEB_PORT).into(),
            simulator: SimMode::Off,
            cal_path: None,
        }
    }
}

impl Config {
    /// Set the rotctld port.
    pub fn with_rot_port(mut self, port: u16) -> Self {
        self.rot_addr.set_port(port);
        self
    }

    /// Set the web port.
    pub fn with_web_port(mut self, port: u16) -> Self {
        self.web_addr.set_port(port);
        self
    }

    /// Set the simulator mode.
    pub fn with_simulator(mut self, mode: SimMode) -> Self {
        self.simulator = mode;
        self
    }

    /// Set an explicit calibration file path.
    pub fn with_cal_path(mut self, path: PathBuf) -> Self {
        self.cal_path = Some(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_published_ports() {
        let config = Config::default();
        assert_eq!(config.rot_addr.port(), 4533);
        assert_eq!(config.web_addr.port(), 8008);
        assert_eq!(config.simulator, SimMode::Off);
    }

    #[test]
    fn builders_compose() {
        let config = Config::default()
            .with_rot_port(14533)
            .with_web_port(18008)
            .with_simulator(SimMode::El180);
        assert_eq!(config.rot_addr.port(), 14533);
        assert_eq!(config.web_addr.port(), 18008);
        assert_eq!(config.simulator, SimMode::El180);
    }
}
