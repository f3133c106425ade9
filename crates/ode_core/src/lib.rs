/// The `ode_core` crate solves scalar first-order initial value problems
/// `dy/dx = f(x, y), y(x0) = y0` where `f` is a user-typed expression.
///
/// Key components:
/// - **Equation Engine**: A whitelisted expression language parsed into a closed AST.
/// - **Solvers**: Fixed-step Euler, Heun and classic RK4 behind the `Stepper` trait.
/// - **Recorder**: Parameter checks, the step loop, and the recorded `Trajectory`.
/// - **Slope field / comparison**: Auxiliary data for plotting results.
pub mod comparison;
pub mod equation_engine;
pub mod limits;
pub mod recorder;
pub mod slope_field;
pub mod solvers;
pub mod traits;

pub use equation_engine::{parse, validate, ErrorKind, EvalError, Expression, ParseError};
pub use limits::SolverLimits;
pub use recorder::{solve, SolveError, SolveRequest, Trajectory, TrajectoryRecorder};
pub use solvers::Method;
