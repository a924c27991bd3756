//! Persistent storage for the four ADC calibration endpoints.
//!
//! The endpoints live in `$HOME/.hamlib_g5500_cal.txt` as plain `key = value`
//! lines, one per endpoint. The file is also edited by hand in the field, so
//! parsing stays permissive: lines may appear in any order and unknown lines
//! are ignored. A load only succeeds when all four keys are present, parse as
//! counts, and satisfy the span sanity check.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Basename of the calibration file under the user's home directory.
pub const CAL_FILE_NAME: &str = ".hamlib_g5500_cal.txt";

/// Minimum ADC span an axis must cover for a calibration to be plausible.
///
/// A sweep that latched fewer counts than this almost certainly stalled
/// early (slipping clutch, stuck limit switch) rather than covering the
/// mount's full travel.
pub const MIN_ADC_SPAN: u16 = 1000;

/// ADC counts observed at the mechanical endpoints of both axes.
///
/// `valid` distinguishes real endpoints (file load, completed sweep,
/// simulator synthesis) from the zeroed placeholder used before any of
/// those happen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Calibration {
    /// Azimuth count at the counter-clockwise limit.
    pub az_min: u16,
    /// Azimuth count at the clockwise limit.
    pub az_max: u16,
    /// Elevation count at the lower limit.
    pub el_min: u16,
    /// Elevation count at the upper limit.
    pub el_max: u16,
    /// Whether the endpoints are usable for conversions.
    pub valid: bool,
}

impl Calibration {
    /// Build a calibration from four endpoints, marking it valid.
    pub fn new(az_min: u16, az_max: u16, el_min: u16, el_max: u16) -> Self {
        Self {
            az_min,
            az_max,
            el_min,
            el_max,
            valid: true,
        }
    }

    /// Whether both axes cover at least [`MIN_ADC_SPAN`] counts.
    pub fn spans_ok(&self) -> bool {
        self.az_max >= self.az_min.saturating_add(MIN_ADC_SPAN)
            && self.el_max >= self.el_min.saturating_add(MIN_ADC_SPAN)
    }
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AZ {}..{} EL {}..{}",
            self.az_min, self.az_max, self.el_min, self.el_max
        )
    }
}

/// Why a calibration file could not be loaded.
#[derive(Debug, Error)]
pub enum CalFileError {
    /// The file could not be opened or read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// One or more of the four endpoint keys never appeared.
    #[error("missing endpoint {0}")]
    MissingKey(&'static str),
    /// The endpoints fail the span sanity check.
    #[error("implausible endpoint span: {0}")]
    BadSpan(Calibration),
}

/// Default calibration file path: [`CAL_FILE_NAME`] under `$HOME`.
pub fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| Path::new(&home).join(CAL_FILE_NAME))
}

/// Load endpoints from `path`.
///
/// Returns a valid [`Calibration`] or the reason the file is unusable.
pub fn load(path: &Path) -> Result<Calibration, CalFileError> {
    let text = fs::read_to_string(path).map_err(|source| CalFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut az_min = None;
    let mut az_max = None;
    let mut el_min = None;
    let mut el_max = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let slot = match key.trim() {
            "ADC_az_min" => &mut az_min,
            "ADC_az_max" => &mut az_max,
            "ADC_el_min" => &mut el_min,
            "ADC_el_max" => &mut el_max,
            _ => continue,
        };
        if let Ok(count) = value.trim().parse::<u16>() {
            *slot = Some(count);
        }
    }

    let cal = Calibration::new(
        az_min.ok_or(CalFileError::MissingKey("ADC_az_min"))?,
        az_max.ok_or(CalFileError::MissingKey("ADC_az_max"))?,
        el_min.ok_or(CalFileError::MissingKey("ADC_el_min"))?,
        el_max.ok_or(CalFileError::MissingKey("ADC_el_max"))?,
    );

    if !cal.spans_ok() {
        return Err(CalFileError::BadSpan(cal));
    }

    debug!(%cal, path = %path.display(), "loaded calibration");
    Ok(cal)
}

/// Write endpoints to `path`, truncating any previous contents.
pub fn save(path: &Path, cal: &Calibration) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "ADC_az_min = {}", cal.az_min)?;
    writeln!(file, "ADC_az_max = {}", cal.az_max)?;
    writeln!(file, "ADC_el_min = {}", cal.el_min)?;
    writeln!(file, "ADC_el_max = {}", cal.el_max)?;
    debug!(%cal, path = %path.display(), "saved calibration");
    Ok(())
}
