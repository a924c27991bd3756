//! Error taxonomy shared by the control surface and the wire dialects.

use thiserror::Error;

/// Failure codes surfaced to clients.
///
/// The numeric values are fixed: they are the negative `RPRT` numbers the
/// rotctld dialect reports, chosen to line up with the hamlib error numbers
/// so existing clients classify them sensibly.
///
/// `Calibrating` and `BadArgs` are transient; `AdcFail`, `NoPower`, and
/// `Stuck` persist until the operator issues another motion command;
/// `GpioFail` and `Internal` are fatal at startup.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RotError {
    /// A position or direction argument was outside the mount's range.
    #[error("invalid argument")]
    BadArgs,
    /// The daemon could not start its control thread.
    #[error("internal error")]
    Internal,
    /// Reading the ADC failed.
    #[error("ADC read failed")]
    AdcFail,
    /// The rotator's AC supply appears to be off.
    #[error("rotator power is off")]
    NoPower,
    /// A commanded axis stopped moving before reaching its target.
    #[error("axis stuck")]
    Stuck,
    /// The GPIO subsystem could not be prepared.
    #[error("GPIO unavailable")]
    GpioFail,
    /// A calibration sweep is running; retry when it completes.
    #[error("calibration in progress")]
    Calibrating,
}

impl RotError {
    /// The negative wire code for this error.
    pub fn code(&self) -> i32 {
        match self {
            RotError::BadArgs => -1,
            RotError::Internal => -7,
            RotError::AdcFail => -8,
            RotError::NoPower => -11,
            RotError::Stuck => -12,
            RotError::GpioFail => -13,
            RotError::Calibrating => -14,
        }
    }
}

/// The `RPRT` number for a surface call: 0 on success, the error code
/// otherwise.
pub fn reply_code<T>(result: &Result<T, RotError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_negative() {
        let all = [
            RotError::BadArgs,
            RotError::Internal,
            RotError::AdcFail,
            RotError::NoPower,
            RotError::Stuck,
            RotError::GpioFail,
            RotError::Calibrating,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.code() < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn reply_code_maps_ok_to_zero() {
        assert_eq!(reply_code(&Ok(())), 0);
        assert_eq!(reply_code::<()>(&Err(RotError::Calibrating)), -14);
    }
}
