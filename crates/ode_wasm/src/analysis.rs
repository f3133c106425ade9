//! Slope field and method comparison helpers.

use crate::request::{solve_bridge, BridgeRequest};
use anyhow::{anyhow, Result};
use ode_core::comparison::{compare, MethodComparison};
use ode_core::equation_engine::parse;
use ode_core::slope_field::{slope_field, SlopeField, SlopeFieldSpec};
use ode_core::solvers::Method;

/// Solves the request, then samples the slope field over the frame of its trajectory.
pub fn slope_field_for(request: &BridgeRequest) -> Result<SlopeField> {
    let trajectory = solve_bridge(request, None)?;
    let expression = parse(&request.function).map_err(|e| anyhow!(e))?;
    slope_field(&expression, &SlopeFieldSpec::around(&trajectory))
}

pub fn compare_for(request: &BridgeRequest, a: &str, b: &str) -> Result<MethodComparison> {
    let a: Method = a.parse().map_err(|e: String| anyhow!(e))?;
    let b: Method = b.parse().map_err(|e: String| anyhow!(e))?;
    let first = solve_bridge(request, Some(a))?;
    let second = solve_bridge(request, Some(b))?;
    compare(&first, &second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BridgeRequest {
        BridgeRequest {
            function: "x".to_string(),
            x0: 0.0,
            y0: 0.0,
            xn: 2.0,
            num_steps: None,
            step_size: Some(1.0),
            method: Some("heun".to_string()),
            limits: None,
        }
    }

    #[test]
    fn slope_field_frames_the_solution() {
        let field = slope_field_for(&request()).expect("slope field");
        assert_eq!(field.samples.len(), 15 * 12);
        // x spans [0, 2] and y spans [0, 2] for Heun on y' = x.
        assert!((field.spec.x_min + 0.2).abs() < 1e-12);
        assert!((field.spec.y_max - 2.2).abs() < 1e-12);
        assert!(field.samples.iter().all(|s| s.direction.is_some()));
    }

    #[test]
    fn compares_two_methods_on_one_grid() {
        let cmp = compare_for(&request(), "euler", "heun").expect("comparison");
        assert_eq!(cmp.differences, vec![0.0, 0.5, 1.0]);
        assert_eq!(cmp.max_difference_x, 2.0);
    }

    #[test]
    fn rejects_unknown_method_names() {
        let err = compare_for(&request(), "euler", "leapfrog").unwrap_err();
        assert!(err.to_string().contains("leapfrog"), "{err}");
    }
}
