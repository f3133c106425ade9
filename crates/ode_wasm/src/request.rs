//! Request decoding and the solve entry points shared by the exported functions.

use anyhow::{anyhow, Context, Result};
use ode_core::limits::SolverLimits;
use ode_core::recorder::{SolveRequest, Trajectory, TrajectoryRecorder};
use ode_core::solvers::Method;
use serde::Deserialize;

/// The JSON/JS object a front end sends to `solve`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BridgeRequest {
    #[serde(alias = "expression")]
    pub function: String,
    pub x0: f64,
    pub y0: f64,
    pub xn: f64,
    #[serde(default)]
    pub num_steps: Option<f64>,
    #[serde(default)]
    pub step_size: Option<f64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub limits: Option<SolverLimits>,
}

impl BridgeRequest {
    /// Converts to a core request, using `method` when given or the request's own otherwise.
    pub fn to_solve_request(&self, method: Option<Method>) -> Result<SolveRequest> {
        let method = match method {
            Some(method) => method,
            None => self
                .method
                .as_deref()
                .ok_or_else(|| anyhow!("A method is required."))?
                .parse::<Method>()
                .map_err(|e| anyhow!(e))?,
        };
        // JS numbers arrive as f64; a step count must be a whole, non-negative number.
        let num_steps = match self.num_steps {
            Some(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 => Some(n as usize),
            Some(n) => return Err(anyhow!("invalid num_steps: {n} is not a whole number of steps")),
            None => None,
        };
        Ok(SolveRequest {
            function: self.function.clone(),
            x0: self.x0,
            y0: self.y0,
            xn: self.xn,
            num_steps,
            step_size: self.step_size,
            method,
        })
    }

    /// A front end may tighten the default limits but never loosen them.
    pub fn recorder(&self) -> Result<TrajectoryRecorder> {
        let defaults = SolverLimits::default();
        let limits = match &self.limits {
            Some(requested) => defaults.restricted_by(requested),
            None => defaults,
        };
        Ok(TrajectoryRecorder::new(limits)?)
    }
}

pub fn solve_bridge(request: &BridgeRequest, method: Option<Method>) -> Result<Trajectory> {
    let solve_request = request.to_solve_request(method)?;
    let trajectory = request
        .recorder()?
        .solve_request(&solve_request)
        .with_context(|| format!("{} solve failed", solve_request.method))?;
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str) -> BridgeRequest {
        BridgeRequest {
            function: "x + y".to_string(),
            x0: 0.0,
            y0: 1.0,
            xn: 1.0,
            num_steps: Some(10.0),
            step_size: None,
            method: Some(method.to_string()),
            limits: None,
        }
    }

    #[test]
    fn solves_with_named_method() {
        let trajectory = solve_bridge(&request("runge_kutta"), None).expect("solve");
        assert_eq!(trajectory.method(), Method::Rk4);
        assert_eq!(trajectory.records().len(), 11);
    }

    #[test]
    fn explicit_method_overrides_request() {
        let trajectory = solve_bridge(&request("euler"), Some(Method::Heun)).expect("solve");
        assert_eq!(trajectory.method(), Method::Heun);
    }

    #[test]
    fn rejects_unknown_method_and_fractional_steps() {
        let err = solve_bridge(&request("midpoint"), None).unwrap_err();
        assert!(err.to_string().contains("Unknown method"), "{err}");

        let mut fractional = request("euler");
        fractional.num_steps = Some(2.5);
        let err = solve_bridge(&fractional, None).unwrap_err();
        assert!(err.to_string().contains("num_steps"), "{err}");

        let mut missing = request("euler");
        missing.method = None;
        assert!(solve_bridge(&missing, None).is_err());
    }

    #[test]
    fn limits_override_is_applied() {
        let mut req = request("euler");
        req.limits = Some(SolverLimits {
            max_steps: 5,
            ..SolverLimits::default()
        });
        let err = solve_bridge(&req, None).unwrap_err();
        assert!(format!("{err:#}").contains("must not exceed 5"), "{err:#}");

        req.limits = Some(SolverLimits {
            max_steps: 0,
            ..SolverLimits::default()
        });
        let err = solve_bridge(&req, None).unwrap_err();
        assert!(err.to_string().contains("limits"), "{err}");
    }

    #[test]
    fn limits_override_cannot_loosen_defaults() {
        let mut req = request("euler");
        req.num_steps = Some(20_000.0);
        req.limits = Some(SolverLimits {
            max_steps: usize::MAX,
            min_step_size: 1e-12,
            max_step_size: 1e6,
        });
        let recorder = req.recorder().expect("recorder");
        assert_eq!(*recorder.limits(), SolverLimits::default());

        let err = solve_bridge(&req, None).unwrap_err();
        assert!(format!("{err:#}").contains("must not exceed 10000"), "{err:#}");
    }

    #[test]
    fn evaluation_failure_is_described() {
        let mut req = request("euler");
        req.function = "1/(x-0.5)".to_string();
        let err = solve_bridge(&req, None).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Euler solve failed"), "{message}");
        assert!(message.contains("step 5"), "{message}");
    }
}
