use crate::equation_engine::EvalError;
use crate::traits::{SlopeFunction, Stepper};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intermediate slopes a method used to advance one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum StepDiagnostics {
    Euler {
        slope: f64,
    },
    Heun {
        k1: f64,
        k2: f64,
        y_predictor: f64,
        avg_slope: f64,
    },
    Rk4 {
        k1: f64,
        k2: f64,
        k3: f64,
        k4: f64,
        weighted_slope: f64,
    },
}

impl StepDiagnostics {
    /// The slope at the start of the step, `f(x_i, y_i)`.
    pub fn initial_slope(&self) -> f64 {
        match *self {
            StepDiagnostics::Euler { slope } => slope,
            StepDiagnostics::Heun { k1, .. } | StepDiagnostics::Rk4 { k1, .. } => k1,
        }
    }
}

/// Result of advancing one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub x: f64,
    pub y: f64,
    pub diagnostics: StepDiagnostics,
}

/// Rejects an intermediate state before it reaches the slope function.
fn stage_value(operation: &'static str, value: f64) -> Result<f64, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFiniteResult { operation })
    }
}

/// Explicit Euler, order 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euler;

impl Stepper for Euler {
    fn step(&self, system: &impl SlopeFunction, x: f64, y: f64, h: f64) -> Result<Step, EvalError> {
        let slope = system.slope(x, y)?;
        Ok(Step {
            x: x + h,
            y: y + h * slope,
            diagnostics: StepDiagnostics::Euler { slope },
        })
    }
}

/// Heun's predictor-corrector (improved Euler), order 2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heun;

impl Stepper for Heun {
    fn step(&self, system: &impl SlopeFunction, x: f64, y: f64, h: f64) -> Result<Step, EvalError> {
        let k1 = system.slope(x, y)?;

        // Predictor: a plain Euler step to the end of the interval.
        let x_next = x + h;
        let y_predictor = stage_value("predictor", y + h * k1)?;

        let k2 = system.slope(x_next, y_predictor)?;

        // Corrector: average the slopes at both ends.
        let avg_slope = (k1 + k2) / 2.0;
        Ok(Step {
            x: x_next,
            y: y + (h / 2.0) * (k1 + k2),
            diagnostics: StepDiagnostics::Heun {
                k1,
                k2,
                y_predictor,
                avg_slope,
            },
        })
    }
}

/// Classic Runge-Kutta 4th Order
#[derive(Debug, Clone, Copy, Default)]
pub struct Rk4;

impl Stepper for Rk4 {
    fn step(&self, system: &impl SlopeFunction, x: f64, y: f64, h: f64) -> Result<Step, EvalError> {
        let half = h / 2.0;

        // k1 = f(x, y)
        let k1 = system.slope(x, y)?;

        // k2 = f(x + h/2, y + k1*h/2)
        let k2 = system.slope(x + half, stage_value("rk4 stage 2", y + k1 * half)?)?;

        // k3 = f(x + h/2, y + k2*h/2)
        let k3 = system.slope(x + half, stage_value("rk4 stage 3", y + k2 * half)?)?;

        // k4 = f(x + h, y + k3*h)
        let k4 = system.slope(x + h, stage_value("rk4 stage 4", y + k3 * h)?)?;

        // y_next = y + h/6 * (k1 + 2k2 + 2k3 + k4)
        let weighted_slope = (k1 + 2.0 * k2 + 2.0 * k3 + k4) / 6.0;
        Ok(Step {
            x: x + h,
            y: y + (h / 6.0) * (k1 + 2.0 * k2 + 2.0 * k3 + k4),
            diagnostics: StepDiagnostics::Rk4 {
                k1,
                k2,
                k3,
                k4,
                weighted_slope,
            },
        })
    }
}

/// Selects one of the fixed-step methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Euler,
    Heun,
    #[serde(alias = "runge_kutta")]
    Rk4,
}

/// Static description of a method for display next to results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MethodInfo {
    pub name: &'static str,
    pub formula: &'static str,
    pub description: &'static str,
    pub order: u32,
    pub error_type: &'static str,
    pub stages: &'static [&'static str],
}

const EULER_INFO: MethodInfo = MethodInfo {
    name: "Euler's method",
    formula: "y_{n+1} = y_n + h * f(x_n, y_n)",
    description: "First-order explicit method",
    order: 1,
    error_type: "O(h^2) local, O(h) global",
    stages: &["y_{n+1} = y_n + h * f(x_n, y_n)"],
};

const HEUN_INFO: MethodInfo = MethodInfo {
    name: "Heun's method (improved Euler)",
    formula: "y_{n+1} = y_n + (h/2) * [f(x_n, y_n) + f(x_{n+1}, y_pred)]",
    description: "Second-order predictor-corrector method",
    order: 2,
    error_type: "O(h^3) local, O(h^2) global",
    stages: &[
        "Predictor: y_pred = y_n + h * f(x_n, y_n)",
        "Corrector: y_{n+1} = y_n + (h/2) * [f(x_n, y_n) + f(x_{n+1}, y_pred)]",
    ],
};

const RK4_INFO: MethodInfo = MethodInfo {
    name: "Runge-Kutta method (4th order)",
    formula: "y_{n+1} = y_n + (h/6) * (k1 + 2k2 + 2k3 + k4)",
    description: "Classical fourth-order method",
    order: 4,
    error_type: "O(h^5) local, O(h^4) global",
    stages: &[
        "k1 = f(x_n, y_n)",
        "k2 = f(x_n + h/2, y_n + k1*h/2)",
        "k3 = f(x_n + h/2, y_n + k2*h/2)",
        "k4 = f(x_n + h, y_n + k3*h)",
        "y_{n+1} = y_n + (h/6)(k1 + 2k2 + 2k3 + k4)",
    ],
};

impl Method {
    pub const ALL: [Method; 3] = [Method::Euler, Method::Heun, Method::Rk4];

    pub fn info(self) -> &'static MethodInfo {
        match self {
            Method::Euler => &EULER_INFO,
            Method::Heun => &HEUN_INFO,
            Method::Rk4 => &RK4_INFO,
        }
    }

    /// Short label used by plots and history entries.
    pub fn label(self) -> &'static str {
        match self {
            Method::Euler => "Euler",
            Method::Heun => "Heun",
            Method::Rk4 => "Runge-Kutta",
        }
    }

    /// Dispatches one step to the selected method.
    pub fn step(
        self,
        system: &impl SlopeFunction,
        x: f64,
        y: f64,
        h: f64,
    ) -> Result<Step, EvalError> {
        match self {
            Method::Euler => Euler.step(system, x, y, h),
            Method::Heun => Heun.step(system, x, y, h),
            Method::Rk4 => Rk4.step(system, x, y, h),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euler" => Ok(Method::Euler),
            "heun" => Ok(Method::Heun),
            "rk4" | "runge_kutta" | "runge-kutta" => Ok(Method::Rk4),
            other => Err(format!("Unknown method: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_engine::parse;

    struct Linear {
        rate: f64,
    }

    impl SlopeFunction for Linear {
        fn slope(&self, _x: f64, y: f64) -> Result<f64, EvalError> {
            Ok(self.rate * y)
        }
    }

    struct Failing;

    impl SlopeFunction for Failing {
        fn slope(&self, _x: f64, _y: f64) -> Result<f64, EvalError> {
            Err(EvalError::DivisionByZero)
        }
    }

    #[test]
    fn euler_single_step_matches_formula() {
        let step = Euler.step(&Linear { rate: 2.0 }, 0.0, 1.0, 0.1).unwrap();
        assert!((step.x - 0.1).abs() < 1e-15);
        assert!((step.y - 1.2).abs() < 1e-15);
        assert_eq!(step.diagnostics, StepDiagnostics::Euler { slope: 2.0 });
    }

    #[test]
    fn heun_single_step_matches_formula() {
        let step = Heun.step(&Linear { rate: 1.0 }, 0.0, 1.0, 0.1).unwrap();
        // k1 = 1, y_pred = 1.1, k2 = 1.1, y = 1 + 0.05 * 2.1
        assert!((step.y - 1.105).abs() < 1e-15);
        match step.diagnostics {
            StepDiagnostics::Heun {
                k1,
                k2,
                y_predictor,
                avg_slope,
            } => {
                assert_eq!(k1, 1.0);
                assert!((k2 - 1.1).abs() < 1e-15);
                assert!((y_predictor - 1.1).abs() < 1e-15);
                assert!((avg_slope - 1.05).abs() < 1e-15);
            }
            other => panic!("unexpected diagnostics {other:?}"),
        }
    }

    #[test]
    fn rk4_single_step_matches_taylor_series() {
        let h: f64 = 0.1;
        let step = Rk4.step(&Linear { rate: 1.0 }, 0.0, 1.0, h).unwrap();
        // RK4 on y' = y reproduces the Taylor polynomial of e^h through h^4.
        let expected = 1.0 + h + h.powi(2) / 2.0 + h.powi(3) / 6.0 + h.powi(4) / 24.0;
        assert!((step.y - expected).abs() < 1e-14);
        assert!((step.x - h).abs() < 1e-15);
        assert!(matches!(step.diagnostics, StepDiagnostics::Rk4 { k1, .. } if k1 == 1.0));
    }

    #[test]
    fn rk4_stages_sample_midpoints() {
        let expr = parse("x").unwrap();
        let step = Rk4.step(&expr, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(
            step.diagnostics,
            StepDiagnostics::Rk4 {
                k1: 0.0,
                k2: 0.5,
                k3: 0.5,
                k4: 1.0,
                weighted_slope: 0.5,
            }
        );
        assert_eq!(step.y, 0.5);
    }

    #[test]
    fn negative_step_moves_backwards() {
        let step = Euler.step(&Linear { rate: 1.0 }, 1.0, 2.0, -0.5).unwrap();
        assert_eq!(step.x, 0.5);
        assert_eq!(step.y, 1.0);
    }

    #[test]
    fn evaluation_failures_propagate() {
        for method in Method::ALL {
            assert_eq!(
                method.step(&Failing, 0.0, 0.0, 0.1),
                Err(EvalError::DivisionByZero),
                "{method}"
            );
        }
    }

    struct Steep;

    impl SlopeFunction for Steep {
        fn slope(&self, _x: f64, y: f64) -> Result<f64, EvalError> {
            // Finite even for an infinite y, so only the stage check can stop it.
            Ok(1e308 * (-y).exp())
        }
    }

    #[test]
    fn overflowing_stage_states_are_rejected() {
        assert_eq!(
            Heun.step(&Steep, 0.0, 0.0, 2.0),
            Err(EvalError::NonFiniteResult {
                operation: "predictor"
            })
        );
        assert_eq!(
            Rk4.step(&Steep, 0.0, 0.0, 4.0),
            Err(EvalError::NonFiniteResult {
                operation: "rk4 stage 2"
            })
        );
    }

    #[test]
    fn initial_slope_reads_first_stage() {
        for method in Method::ALL {
            let step = method.step(&Linear { rate: 3.0 }, 0.0, 2.0, 0.1).unwrap();
            assert_eq!(step.diagnostics.initial_slope(), 6.0, "{method}");
        }
    }

    #[test]
    fn method_parses_names_and_aliases() {
        assert_eq!("euler".parse::<Method>(), Ok(Method::Euler));
        assert_eq!("Heun".parse::<Method>(), Ok(Method::Heun));
        assert_eq!("runge-kutta".parse::<Method>(), Ok(Method::Rk4));
        assert_eq!("RK4".parse::<Method>(), Ok(Method::Rk4));
        assert!("midpoint".parse::<Method>().is_err());
        assert_eq!(Method::Heun.info().order, 2);
        assert_eq!(Method::Rk4.info().stages.len(), 5);
    }
}
