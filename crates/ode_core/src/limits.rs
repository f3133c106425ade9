use serde::{Deserialize, Serialize};

/// Upper bound on `max_steps` that no configuration may exceed.
pub const MAX_STEPS_CEILING: usize = 1_000_000;

/// Bounds a solve request must respect before any stepping starts.
/// They cap memory (`max_steps + 1` rows) and runtime per solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverLimits {
    pub max_steps: usize,
    pub min_step_size: f64,
    pub max_step_size: f64,
}

impl Default for SolverLimits {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            min_step_size: 1e-8,
            max_step_size: 10.0,
        }
    }
}

impl SolverLimits {
    /// Checks that the limits themselves are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("max_steps must be greater than zero.".to_string());
        }
        if self.max_steps > MAX_STEPS_CEILING {
            return Err(format!("max_steps must not exceed {MAX_STEPS_CEILING}."));
        }
        if !(self.min_step_size.is_finite() && self.min_step_size > 0.0) {
            return Err("min_step_size must be positive and finite.".to_string());
        }
        if !self.max_step_size.is_finite() || self.max_step_size < self.min_step_size {
            return Err("max_step_size must be finite and at least min_step_size.".to_string());
        }
        Ok(())
    }

    pub fn allows_step_size(&self, h: f64) -> bool {
        h.is_finite() && (self.min_step_size..=self.max_step_size).contains(&h.abs())
    }

    /// Narrows these limits by `other`; the result is never looser than `self`.
    pub fn restricted_by(&self, other: &SolverLimits) -> SolverLimits {
        SolverLimits {
            max_steps: self.max_steps.min(other.max_steps),
            min_step_size: self.min_step_size.max(other.min_step_size),
            max_step_size: self.max_step_size.min(other.max_step_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let limits = SolverLimits::default();
        assert!(limits.validate().is_ok());
        assert_eq!(limits.max_steps, 10_000);
    }

    #[test]
    fn rejects_inconsistent_limits() {
        let limits = SolverLimits {
            max_steps: 0,
            ..SolverLimits::default()
        };
        assert!(limits.validate().unwrap_err().contains("max_steps"));

        let limits = SolverLimits {
            min_step_size: 0.0,
            ..SolverLimits::default()
        };
        assert!(limits.validate().unwrap_err().contains("min_step_size"));

        let limits = SolverLimits {
            min_step_size: 1.0,
            max_step_size: 0.5,
            ..SolverLimits::default()
        };
        assert!(limits.validate().unwrap_err().contains("max_step_size"));
    }

    #[test]
    fn rejects_step_counts_above_ceiling() {
        let limits = SolverLimits {
            max_steps: usize::MAX,
            ..SolverLimits::default()
        };
        assert!(limits.validate().unwrap_err().contains("must not exceed"));

        let limits = SolverLimits {
            max_steps: MAX_STEPS_CEILING,
            ..SolverLimits::default()
        };
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn restriction_only_tightens() {
        let defaults = SolverLimits::default();
        let looser = SolverLimits {
            max_steps: usize::MAX,
            min_step_size: 1e-12,
            max_step_size: 100.0,
        };
        assert_eq!(defaults.restricted_by(&looser), defaults);

        let tighter = SolverLimits {
            max_steps: 50,
            min_step_size: 1e-3,
            max_step_size: 1.0,
        };
        assert_eq!(defaults.restricted_by(&tighter), tighter);
    }

    #[test]
    fn step_size_bounds_use_magnitude() {
        let limits = SolverLimits::default();
        assert!(limits.allows_step_size(0.1));
        assert!(limits.allows_step_size(-0.1));
        assert!(limits.allows_step_size(10.0));
        assert!(!limits.allows_step_size(0.0));
        assert!(!limits.allows_step_size(1e-9));
        assert!(!limits.allows_step_size(10.5));
        assert!(!limits.allows_step_size(f64::NAN));
        assert!(!limits.allows_step_size(f64::INFINITY));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let limits: SolverLimits = serde_json::from_str(r#"{ "max_steps": 50 }"#).unwrap();
        assert_eq!(limits.max_steps, 50);
        assert_eq!(limits.min_step_size, 1e-8);
        assert_eq!(limits.max_step_size, 10.0);
    }
}
