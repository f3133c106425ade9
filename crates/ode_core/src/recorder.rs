//! Drives a stepper across an interval and records the trajectory.

use crate::equation_engine::{parse, ErrorKind, EvalError, PROBE_POINT};
use crate::limits::SolverLimits;
use crate::solvers::{Method, MethodInfo, StepDiagnostics};
use crate::traits::SlopeFunction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Input that a [`SolveError::InvalidParameter`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Expression,
    X0,
    Y0,
    Xn,
    StepSize,
    NumSteps,
    /// The pairing of `num_steps` and `step_size` in a request.
    StepPlan,
    Limits,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Expression => "expression",
            Field::X0 => "x0",
            Field::Y0 => "y0",
            Field::Xn => "xn",
            Field::StepSize => "step_size",
            Field::NumSteps => "num_steps",
            Field::StepPlan => "num_steps/step_size",
            Field::Limits => "limits",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("invalid {field}: {constraint}")]
    InvalidParameter { field: Field, constraint: String },
    #[error("evaluation failed at step {step}: {cause}")]
    EvaluationFailed {
        step: usize,
        #[source]
        cause: EvalError,
    },
}

impl SolveError {
    fn invalid(field: Field, constraint: impl Into<String>) -> Self {
        SolveError::InvalidParameter {
            field,
            constraint: constraint.into(),
        }
    }

    /// The evaluator error kind, if the solve failed while evaluating.
    pub fn cause_kind(&self) -> Option<ErrorKind> {
        match self {
            SolveError::InvalidParameter { .. } => None,
            SolveError::EvaluationFailed { cause, .. } => Some(cause.kind()),
        }
    }
}

fn failed(step: usize) -> impl FnOnce(EvalError) -> SolveError {
    move |cause| SolveError::EvaluationFailed { step, cause }
}

// --- Step plan ---

/// Which of step count and step size the caller fixes; the other is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSpec {
    Count(usize),
    Size(f64),
}

/// A resolved `(h, num_steps)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepPlan {
    pub h: f64,
    pub num_steps: usize,
}

impl StepPlan {
    /// `Count(n)` gives `h = (xn - x0) / n`; `Size(h)` gives `n = floor((xn - x0) / h)`.
    pub fn resolve(
        x0: f64,
        xn: f64,
        spec: StepSpec,
        limits: &SolverLimits,
    ) -> Result<Self, SolveError> {
        if !x0.is_finite() {
            return Err(SolveError::invalid(Field::X0, "must be finite"));
        }
        if !xn.is_finite() {
            return Err(SolveError::invalid(Field::Xn, "must be finite"));
        }

        match spec {
            StepSpec::Count(num_steps) => {
                if num_steps == 0 {
                    return Err(SolveError::invalid(
                        Field::NumSteps,
                        "must be at least 1 to derive a step size",
                    ));
                }
                if num_steps > limits.max_steps {
                    return Err(SolveError::invalid(
                        Field::NumSteps,
                        format!("must not exceed {}", limits.max_steps),
                    ));
                }
                let h = (xn - x0) / num_steps as f64;
                if !limits.allows_step_size(h) {
                    return Err(SolveError::invalid(
                        Field::StepSize,
                        format!(
                            "derived step size {h} must have magnitude within [{}, {}]",
                            limits.min_step_size, limits.max_step_size
                        ),
                    ));
                }
                Ok(Self { h, num_steps })
            }
            StepSpec::Size(h) => {
                if !limits.allows_step_size(h) {
                    return Err(SolveError::invalid(
                        Field::StepSize,
                        format!(
                            "must be finite, nonzero, with magnitude within [{}, {}]",
                            limits.min_step_size, limits.max_step_size
                        ),
                    ));
                }
                let steps = ((xn - x0) / h).floor();
                if !steps.is_finite() || steps < 0.0 {
                    return Err(SolveError::invalid(
                        Field::Xn,
                        "must lie in the direction of the step from x0",
                    ));
                }
                if steps > limits.max_steps as f64 {
                    return Err(SolveError::invalid(
                        Field::NumSteps,
                        format!(
                            "derived step count {steps} must not exceed {}",
                            limits.max_steps
                        ),
                    ));
                }
                Ok(Self {
                    h,
                    num_steps: steps as usize,
                })
            }
        }
    }
}

/// A solve request as it arrives from a front end.
/// Exactly one of `num_steps` and `step_size` must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    #[serde(alias = "expression")]
    pub function: String,
    pub x0: f64,
    pub y0: f64,
    pub xn: f64,
    #[serde(default)]
    pub num_steps: Option<usize>,
    #[serde(default)]
    pub step_size: Option<f64>,
    pub method: Method,
}

impl SolveRequest {
    pub fn step_spec(&self) -> Result<StepSpec, SolveError> {
        match (self.num_steps, self.step_size) {
            (Some(n), None) => Ok(StepSpec::Count(n)),
            (None, Some(h)) => Ok(StepSpec::Size(h)),
            (Some(_), Some(_)) => Err(SolveError::invalid(
                Field::StepPlan,
                "supply either num_steps or step_size, not both",
            )),
            (None, None) => Err(SolveError::invalid(
                Field::StepPlan,
                "one of num_steps or step_size is required",
            )),
        }
    }
}

// --- Trajectory ---

/// One row of the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub x: f64,
    pub y: f64,
    /// `f(x, y)` at this row.
    pub slope: f64,
    /// Slopes used to advance from this row; absent on the final row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<StepDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub initial_value: String,
    pub final_value: String,
    pub interval: String,
    pub total_steps: usize,
    pub step_size: f64,
}

/// The series a plot of the solution needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_predictor: Option<Vec<f64>>,
}

/// A completed solve. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    method: Method,
    expression: String,
    x0: f64,
    y0: f64,
    h: f64,
    num_steps: usize,
    records: Vec<StepRecord>,
    summary: Summary,
}

impl Trajectory {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn method_info(&self) -> &'static MethodInfo {
        self.method.info()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    pub fn y0(&self) -> f64 {
        self.y0
    }

    pub fn step_size(&self) -> f64 {
        self.h
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn x_values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.x).collect()
    }

    pub fn y_values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.y).collect()
    }

    pub fn slopes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.slope).collect()
    }

    /// Heun's predicted values, one per advancing step. `None` for other methods.
    pub fn predictor_values(&self) -> Option<Vec<f64>> {
        if self.method != Method::Heun {
            return None;
        }
        Some(
            self.records
                .iter()
                .filter_map(|r| match r.diagnostics {
                    Some(StepDiagnostics::Heun { y_predictor, .. }) => Some(y_predictor),
                    _ => None,
                })
                .collect(),
        )
    }

    pub fn final_point(&self) -> (f64, f64) {
        self.records
            .last()
            .map(|r| (r.x, r.y))
            .unwrap_or((self.x0, self.y0))
    }

    pub fn plot_data(&self) -> PlotData {
        PlotData {
            x_values: self.x_values(),
            y_values: self.y_values(),
            method: self.method.label().to_string(),
            y_predictor: self.predictor_values(),
        }
    }

    /// The update written out with this row's numbers, e.g.
    /// `y_1 = 1.000000 + 0.1 * 1.000000 = 1.100000`. `None` on the final row.
    pub fn calculation(&self, step: usize) -> Option<String> {
        let row = self.records.get(step)?;
        let next = self.records.get(step + 1)?;
        let h = self.h;
        let text = match row.diagnostics? {
            StepDiagnostics::Euler { slope } => format!(
                "y_{} = {:.6} + {h} * {slope:.6} = {:.6}",
                step + 1,
                row.y,
                next.y
            ),
            StepDiagnostics::Heun { k1, k2, .. } => format!(
                "y_{} = {:.6} + ({h}/2) * ({k1:.6} + {k2:.6}) = {:.6}",
                step + 1,
                row.y,
                next.y
            ),
            StepDiagnostics::Rk4 { k1, k2, k3, k4, .. } => format!(
                "y_{} = {:.6} + ({h}/6) * ({k1:.6} + 2*{k2:.6} + 2*{k3:.6} + {k4:.6}) = {:.6}",
                step + 1,
                row.y,
                next.y
            ),
        };
        Some(text)
    }
}

// --- Recorder ---

/// Validates solve inputs against [`SolverLimits`] and runs the step loop.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryRecorder {
    limits: SolverLimits,
}

impl TrajectoryRecorder {
    pub fn new(limits: SolverLimits) -> Result<Self, SolveError> {
        limits
            .validate()
            .map_err(|reason| SolveError::invalid(Field::Limits, reason))?;
        Ok(Self { limits })
    }

    pub fn limits(&self) -> &SolverLimits {
        &self.limits
    }

    /// Parses `expression` once and integrates `dy/dx = f(x, y)` for `num_steps` steps of `h`.
    ///
    /// Parameters are checked before the expression is touched. A parse failure is
    /// reported as `EvaluationFailed` at step 0; an expression that parses but fails
    /// at the probe point `x = 1, y = 1` is an `InvalidParameter`.
    pub fn solve(
        &self,
        expression: &str,
        x0: f64,
        y0: f64,
        h: f64,
        num_steps: usize,
        method: Method,
    ) -> Result<Trajectory, SolveError> {
        self.check_parameters(x0, y0, h, num_steps)
            .inspect_err(|err| warn!(error = %err, "solve rejected"))?;

        let parsed = parse(expression)
            .map_err(|err| failed(0)(err.into()))
            .inspect_err(|err| warn!(error = %err, expression, "expression rejected"))?;
        if let Err(err) = parsed.evaluate(PROBE_POINT.0, PROBE_POINT.1) {
            warn!(error = %err, expression, "expression failed probe evaluation");
            return Err(SolveError::invalid(
                Field::Expression,
                format!("must evaluate at x = 1, y = 1 ({err})"),
            ));
        }

        self.integrate(&parsed, expression, x0, y0, h, num_steps, method)
    }

    /// Resolves the step plan from an interval end, then solves.
    pub fn solve_interval(
        &self,
        expression: &str,
        x0: f64,
        y0: f64,
        xn: f64,
        spec: StepSpec,
        method: Method,
    ) -> Result<Trajectory, SolveError> {
        let plan = StepPlan::resolve(x0, xn, spec, &self.limits)
            .inspect_err(|err| warn!(error = %err, "step plan rejected"))?;
        self.solve(expression, x0, y0, plan.h, plan.num_steps, method)
    }

    pub fn solve_request(&self, request: &SolveRequest) -> Result<Trajectory, SolveError> {
        let spec = request.step_spec()?;
        self.solve_interval(
            &request.function,
            request.x0,
            request.y0,
            request.xn,
            spec,
            request.method,
        )
    }

    /// Runs the step loop against any slope function.
    /// `expression` is recorded on the trajectory as given.
    #[allow(clippy::too_many_arguments)]
    pub fn integrate(
        &self,
        system: &impl SlopeFunction,
        expression: &str,
        x0: f64,
        y0: f64,
        h: f64,
        num_steps: usize,
        method: Method,
    ) -> Result<Trajectory, SolveError> {
        self.check_parameters(x0, y0, h, num_steps)?;
        debug!(%method, h, num_steps, x0, y0, "starting solve");

        let rows = num_steps.checked_add(1).ok_or_else(|| {
            SolveError::invalid(Field::NumSteps, "step count overflows the row count")
        })?;
        let mut records = Vec::with_capacity(rows);

        // Boundary slope for the first row; the loop recomputes it as k1.
        let initial_slope = system.slope(x0, y0).map_err(failed(0))?;

        let (mut x, mut y) = (x0, y0);
        for step in 0..num_steps {
            let next = method.step(system, x, y, h).map_err(failed(step))?;
            if !next.x.is_finite() || !next.y.is_finite() {
                return Err(failed(step)(EvalError::NonFiniteResult {
                    operation: "step update",
                }));
            }
            let slope = if step == 0 {
                initial_slope
            } else {
                next.diagnostics.initial_slope()
            };
            records.push(StepRecord {
                step,
                x,
                y,
                slope,
                diagnostics: Some(next.diagnostics),
            });
            trace!(step, x = next.x, y = next.y, "step complete");
            x = next.x;
            y = next.y;
        }

        // Boundary slope for the final row, for display only.
        let final_slope = if num_steps == 0 {
            initial_slope
        } else {
            system.slope(x, y).map_err(failed(num_steps))?
        };
        records.push(StepRecord {
            step: num_steps,
            x,
            y,
            slope: final_slope,
            diagnostics: None,
        });

        let summary = Summary {
            initial_value: format!("y({x0:?}) = {y0:?}"),
            final_value: format!("y({x:.6}) ≈ {y:.6}"),
            interval: format!("[{x0:?}, {x:.6}]"),
            total_steps: num_steps,
            step_size: h,
        };
        debug!(%method, x_final = x, y_final = y, "solve finished");

        Ok(Trajectory {
            method,
            expression: expression.to_string(),
            x0,
            y0,
            h,
            num_steps,
            records,
            summary,
        })
    }

    fn check_parameters(&self, x0: f64, y0: f64, h: f64, num_steps: usize) -> Result<(), SolveError> {
        if !x0.is_finite() {
            return Err(SolveError::invalid(Field::X0, "must be finite"));
        }
        if !y0.is_finite() {
            return Err(SolveError::invalid(Field::Y0, "must be finite"));
        }
        if num_steps > self.limits.max_steps {
            return Err(SolveError::invalid(
                Field::NumSteps,
                format!("must not exceed {}", self.limits.max_steps),
            ));
        }
        if !h.is_finite() || h == 0.0 {
            return Err(SolveError::invalid(Field::StepSize, "must be finite and nonzero"));
        }
        if !self.limits.allows_step_size(h) {
            return Err(SolveError::invalid(
                Field::StepSize,
                format!(
                    "magnitude must lie within [{}, {}]",
                    self.limits.min_step_size, self.limits.max_step_size
                ),
            ));
        }
        Ok(())
    }
}

/// Solves with default limits.
pub fn solve(
    expression: &str,
    x0: f64,
    y0: f64,
    h: f64,
    num_steps: usize,
    method: Method,
) -> Result<Trajectory, SolveError> {
    TrajectoryRecorder::default().solve(expression, x0, y0, h, num_steps, method)
}
