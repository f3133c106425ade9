use crate::equation_engine::EvalError;
use crate::solvers::Step;

/// The right-hand side `f(x, y)` of a scalar first-order ODE `dy/dx = f(x, y)`.
///
/// Implemented by parsed expressions; tests and embedders may supply their own.
pub trait SlopeFunction {
    /// Evaluates `f` at the point `(x, y)`.
    fn slope(&self, x: f64, y: f64) -> Result<f64, EvalError>;
}

impl<S: SlopeFunction + ?Sized> SlopeFunction for &S {
    fn slope(&self, x: f64, y: f64) -> Result<f64, EvalError> {
        (**self).slope(x, y)
    }
}

/// A single-step integration method.
pub trait Stepper {
    /// Advances one step of size `h` from `(x, y)`.
    /// Returns the next point together with the intermediate slopes that produced it.
    fn step(&self, system: &impl SlopeFunction, x: f64, y: f64, h: f64) -> Result<Step, EvalError>;
}
