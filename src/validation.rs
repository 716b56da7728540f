//! Validation helpers for user-supplied settings and action parameters.
//!
//! Produces descriptive messages suitable for a settings UI.

use anyhow::{bail, Result};

/// Seek step in seconds: positive, at most ten minutes.
pub fn validate_seek_amount(seconds: f64) -> Result<()> {
    if !seconds.is_finite() {
        bail!("Seek amount must be a finite number of seconds");
    }
    if seconds <= 0.0 {
        bail!("Seek amount {} must be positive", seconds);
    }
    if seconds > 600.0 {
        bail!("Seek amount {} exceeds 600 seconds", seconds);
    }
    Ok(())
}

/// Volume step on the 0..=1 scale: greater than 0, at most 1.
pub fn validate_volume_step(step: f64) -> Result<()> {
    if !step.is_finite() || step <= 0.0 || step > 1.0 {
        bail!("Volume step {} is outside (0, 1]", step);
    }
    Ok(())
}

/// Absolute seek target as a percentage of the duration.
pub fn validate_percentage(percent: f64) -> Result<()> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        bail!("Percentage {} is outside [0, 100]", percent);
    }
    Ok(())
}

/// Millisecond timing knobs (debounce, metadata-wait, toast duration).
pub fn validate_interval_ms(name: &str, millis: u64, max: u64) -> Result<()> {
    if millis == 0 {
        bail!("{} must be greater than 0 ms", name);
    }
    if millis > max {
        bail!("{} of {} ms exceeds {} ms", name, millis, max);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_seek_amounts() {
        assert!(validate_seek_amount(5.0).is_ok());
        assert!(validate_seek_amount(0.5).is_ok());
        assert!(validate_seek_amount(0.0).is_err());
        assert!(validate_seek_amount(-5.0).is_err());
        assert!(validate_seek_amount(f64::NAN).is_err());
        assert!(validate_seek_amount(601.0).is_err());
    }

    #[test]
    fn validates_volume_steps() {
        assert!(validate_volume_step(0.1).is_ok());
        assert!(validate_volume_step(1.0).is_ok());
        assert!(validate_volume_step(0.0).is_err());
        assert!(validate_volume_step(1.5).is_err());
    }

    #[test]
    fn validates_percentages() {
        assert!(validate_percentage(0.0).is_ok());
        assert!(validate_percentage(90.0).is_ok());
        assert!(validate_percentage(100.0).is_ok());
        assert!(validate_percentage(-1.0).is_err());
        assert!(validate_percentage(100.5).is_err());
    }

    #[test]
    fn validates_intervals() {
        assert!(validate_interval_ms("debounce", 500, 10_000).is_ok());
        assert!(validate_interval_ms("debounce", 0, 10_000).is_err());
        let err = validate_interval_ms("debounce", 20_000, 10_000).unwrap_err();
        assert!(err.to_string().contains("debounce"));
    }
}
