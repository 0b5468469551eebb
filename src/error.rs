use thiserror::Error;

#[derive(Debug, Error)]
pub enum TechnoError {
    #[error("Invalid tempo {bpm} BPM (supported range {min}..={max})")]
    InvalidTempo { bpm: f64, min: f64, max: f64 },

    #[error("Invalid argument `{name}` = {value}: expected {expected}")]
    InvalidArgument {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("Numerically degenerate {what}")]
    NumericDegenerate { what: String },

    #[error("Preset error: {0}")]
    Preset(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, TechnoError>;

impl TechnoError {
    pub(crate) fn invalid(name: &'static str, value: f64, expected: &'static str) -> Self {
        TechnoError::InvalidArgument {
            name,
            value,
            expected,
        }
    }
}

/// Reject a parameter that is not a finite number.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TechnoError::invalid(name, value, "a finite number"))
    }
}

/// Reject a parameter outside the closed interval `[lo, hi]`.
pub(crate) fn ensure_range(
    name: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
    expected: &'static str,
) -> Result<f64> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(value)
    } else {
        Err(TechnoError::invalid(name, value, expected))
    }
}

/// Reject a parameter that is not strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(TechnoError::invalid(name, value, "a value > 0"))
    }
}

/// Reject a parameter that is negative.
pub(crate) fn ensure_non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(TechnoError::invalid(name, value, "a value >= 0"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_names_parameter() {
        let err = ensure_range("drive", 1.5, 0.0, 1.0, "a value in [0, 1]").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("drive"), "Message should name the parameter: {msg}");
        assert!(msg.contains("1.5"), "Message should carry the value: {msg}");
    }

    #[test]
    fn nan_is_never_in_range() {
        assert!(ensure_range("mix", f64::NAN, 0.0, 1.0, "a value in [0, 1]").is_err());
        assert!(ensure_positive("freq", f64::NAN).is_err());
        assert!(ensure_non_negative("time", f64::INFINITY).is_err());
    }
}
