use crate::recorder::Trajectory;
use crate::traits::SlopeFunction;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Grid size used when framing a trajectory.
pub const DEFAULT_NX: usize = 15;
pub const DEFAULT_NY: usize = 12;
/// Fraction of the data span added on each side when framing a trajectory.
pub const MARGIN_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeFieldSpec {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub nx: usize,
    pub ny: usize,
}

impl SlopeFieldSpec {
    /// Frames the trajectory's bounding box, padded by 10% per side.
    /// A flat axis (zero span) is padded by 1 instead.
    pub fn around(trajectory: &Trajectory) -> Self {
        let (x_min, x_max) = padded_bounds(trajectory.records().iter().map(|r| r.x));
        let (y_min, y_max) = padded_bounds(trajectory.records().iter().map(|r| r.y));
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            nx: DEFAULT_NX,
            ny: DEFAULT_NY,
        }
    }

    fn validate(&self) -> Result<()> {
        let bounds = [self.x_min, self.x_max, self.y_min, self.y_max];
        if bounds.iter().any(|v| !v.is_finite()) {
            bail!("Slope field bounds must be finite.");
        }
        if self.x_min >= self.x_max {
            bail!(
                "Slope field x range [{}, {}] is empty or inverted.",
                self.x_min,
                self.x_max
            );
        }
        if self.y_min >= self.y_max {
            bail!(
                "Slope field y range [{}, {}] is empty or inverted.",
                self.y_min,
                self.y_max
            );
        }
        if self.nx < 2 || self.ny < 2 {
            bail!("Slope field needs at least 2 samples per axis.");
        }
        Ok(())
    }
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = max - min;
    let pad = if span > 0.0 { MARGIN_FRACTION * span } else { 1.0 };
    (min - pad, max + pad)
}

/// One grid point and the unit direction of `(1, f(x, y))` there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeSample {
    pub x: f64,
    pub y: f64,
    /// `None` where `f` could not be evaluated.
    pub direction: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeField {
    pub spec: SlopeFieldSpec,
    /// Row-major: `ny` rows of `nx` samples, y ascending then x ascending.
    pub samples: Vec<SlopeSample>,
}

impl SlopeField {
    pub fn get(&self, ix: usize, iy: usize) -> Option<&SlopeSample> {
        if ix >= self.spec.nx {
            return None;
        }
        self.samples.get(iy * self.spec.nx + ix)
    }
}

pub fn slope_field(system: &impl SlopeFunction, spec: &SlopeFieldSpec) -> Result<SlopeField> {
    spec.validate()?;

    let dx = (spec.x_max - spec.x_min) / (spec.nx - 1) as f64;
    let dy = (spec.y_max - spec.y_min) / (spec.ny - 1) as f64;

    let mut samples = Vec::with_capacity(spec.nx * spec.ny);
    for iy in 0..spec.ny {
        let y = spec.y_min + dy * iy as f64;
        for ix in 0..spec.nx {
            let x = spec.x_min + dx * ix as f64;
            let direction = system.slope(x, y).ok().map(|slope| {
                let norm = 1.0f64.hypot(slope);
                (1.0 / norm, slope / norm)
            });
            samples.push(SlopeSample { x, y, direction });
        }
    }

    Ok(SlopeField {
        spec: *spec,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_engine::parse;
    use crate::recorder::solve;
    use crate::solvers::Method;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn unit_square(nx: usize, ny: usize) -> SlopeFieldSpec {
        SlopeFieldSpec {
            x_min: 0.0,
            x_max: 1.0,
            y_min: 0.0,
            y_max: 1.0,
            nx,
            ny,
        }
    }

    #[test]
    fn samples_cover_the_grid_with_unit_directions() {
        let expr = parse("y").unwrap();
        let field = slope_field(&expr, &unit_square(3, 2)).unwrap();
        assert_eq!(field.samples.len(), 6);

        let corner = field.get(2, 1).unwrap();
        assert_eq!((corner.x, corner.y), (1.0, 1.0));
        let (dx, dy) = corner.direction.unwrap();
        assert!((dx - dy).abs() < 1e-15);
        assert!((dx.hypot(dy) - 1.0).abs() < 1e-15);

        let flat = field.get(1, 0).unwrap();
        assert_eq!(flat.x, 0.5);
        assert_eq!(flat.direction, Some((1.0, 0.0)));
        assert!(field.get(3, 0).is_none());
    }

    #[test]
    fn failed_points_have_no_direction() {
        let expr = parse("1/x").unwrap();
        let field = slope_field(&expr, &unit_square(2, 2)).unwrap();
        assert_eq!(field.get(0, 0).unwrap().direction, None);
        assert_eq!(field.get(0, 1).unwrap().direction, None);
        assert!(field.get(1, 0).unwrap().direction.is_some());
    }

    #[test]
    fn steep_slopes_stay_normalized() {
        let expr = parse("1e300").unwrap();
        let field = slope_field(&expr, &unit_square(2, 2)).unwrap();
        let (dx, dy) = field.samples[0].direction.unwrap();
        assert!(dx >= 0.0 && dx < 1e-299);
        assert_eq!(dy, 1.0);
    }

    #[test]
    fn rejects_bad_grids() {
        let expr = parse("y").unwrap();
        let mut spec = unit_square(2, 2);
        spec.x_max = 0.0;
        assert_err_contains(slope_field(&expr, &spec), "x range");

        let mut spec = unit_square(2, 2);
        spec.y_min = 2.0;
        assert_err_contains(slope_field(&expr, &spec), "y range");

        let mut spec = unit_square(2, 2);
        spec.x_min = f64::NEG_INFINITY;
        assert_err_contains(slope_field(&expr, &spec), "finite");

        assert_err_contains(slope_field(&expr, &unit_square(1, 5)), "at least 2");
    }

    #[test]
    fn frames_a_trajectory_with_margin() {
        let trajectory = solve("1", 0.0, 0.0, 1.0, 10, Method::Euler).unwrap();
        let spec = SlopeFieldSpec::around(&trajectory);
        assert!((spec.x_min + 1.0).abs() < 1e-12);
        assert!((spec.x_max - 11.0).abs() < 1e-12);
        assert!((spec.y_min + 1.0).abs() < 1e-12);
        assert!((spec.y_max - 11.0).abs() < 1e-12);
        assert_eq!((spec.nx, spec.ny), (15, 12));
        assert!(slope_field(&parse("1").unwrap(), &spec).is_ok());
    }

    #[test]
    fn flat_trajectory_still_gets_a_frame() {
        let trajectory = solve("0", 0.0, 3.0, 0.5, 4, Method::Heun).unwrap();
        let spec = SlopeFieldSpec::around(&trajectory);
        assert_eq!((spec.y_min, spec.y_max), (2.0, 4.0));
        assert!(spec.validate().is_ok());
    }
}
