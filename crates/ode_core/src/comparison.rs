use crate::recorder::Trajectory;
use crate::solvers::Method;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Relative tolerance when checking that two trajectories share an x grid.
const GRID_TOLERANCE: f64 = 1e-9;

/// Pointwise `|y_b - y_a|` between two solves of the same problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodComparison {
    pub methods: (Method, Method),
    pub x_values: Vec<f64>,
    pub differences: Vec<f64>,
    pub max_difference: f64,
    pub max_difference_x: f64,
}

pub fn compare(a: &Trajectory, b: &Trajectory) -> Result<MethodComparison> {
    let (ra, rb) = (a.records(), b.records());
    if ra.len() != rb.len() {
        bail!(
            "Trajectories have different lengths ({} vs {}).",
            ra.len(),
            rb.len()
        );
    }

    let mut x_values = Vec::with_capacity(ra.len());
    let mut differences = Vec::with_capacity(ra.len());
    let mut max_difference = 0.0;
    let mut max_difference_x = a.x0();

    for (pa, pb) in ra.iter().zip(rb) {
        let scale = pa.x.abs().max(pb.x.abs()).max(1.0);
        if (pa.x - pb.x).abs() > GRID_TOLERANCE * scale {
            bail!(
                "Trajectories do not share an x grid at step {} ({} vs {}).",
                pa.step,
                pa.x,
                pb.x
            );
        }
        let diff = (pb.y - pa.y).abs();
        if diff > max_difference {
            max_difference = diff;
            max_difference_x = pa.x;
        }
        x_values.push(pa.x);
        differences.push(diff);
    }

    Ok(MethodComparison {
        methods: (a.method(), b.method()),
        x_values,
        differences,
        max_difference,
        max_difference_x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::solve;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn heun_minus_euler_on_linear_slope() {
        let euler = solve("x", 0.0, 0.0, 1.0, 2, Method::Euler).unwrap();
        let heun = solve("x", 0.0, 0.0, 1.0, 2, Method::Heun).unwrap();
        let cmp = compare(&euler, &heun).unwrap();
        assert_eq!(cmp.methods, (Method::Euler, Method::Heun));
        assert_eq!(cmp.x_values, vec![0.0, 1.0, 2.0]);
        assert_eq!(cmp.differences, vec![0.0, 0.5, 1.0]);
        assert_eq!(cmp.max_difference, 1.0);
        assert_eq!(cmp.max_difference_x, 2.0);
    }

    #[test]
    fn identical_solves_have_zero_difference() {
        let a = solve("sin(x) - y", 0.0, 1.0, 0.1, 20, Method::Rk4).unwrap();
        let cmp = compare(&a, &a).unwrap();
        assert!(cmp.differences.iter().all(|&d| d == 0.0));
        assert_eq!(cmp.max_difference, 0.0);
        assert_eq!(cmp.max_difference_x, 0.0);
    }

    #[test]
    fn rejects_mismatched_trajectories() {
        let a = solve("y", 0.0, 1.0, 0.1, 10, Method::Euler).unwrap();
        let shorter = solve("y", 0.0, 1.0, 0.1, 5, Method::Heun).unwrap();
        assert_err_contains(compare(&a, &shorter), "different lengths");

        let shifted = solve("y", 0.0, 1.0, 0.2, 10, Method::Heun).unwrap();
        assert_err_contains(compare(&a, &shifted), "x grid");
    }
}
