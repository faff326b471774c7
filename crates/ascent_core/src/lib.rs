pub mod analysis;
pub mod drag;
pub mod equation_engine;
pub mod error;
pub mod rocket;
pub mod solvers;
pub mod symbolic;
pub mod trajectory;
/// The `ascent_core` crate integrates the vertical flight of a point-mass rocket
/// with a fixed-step classical RK4 scheme.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODE right-hand sides), `Steppable` (Solvers).
/// - **Rocket**: `RocketParams`, the `rocket_rhs` equations of motion with the depletion freeze, and `delta_v`.
/// - **Trajectory**: `integrate_vertical_rocket`, the fixed-grid driver producing `(t, h, v, m)` sequences.
/// - **Drag**: the `DragModel` capability, closures and compiled drag expressions.
/// - **Equation Engine**: A small bytecode VM for evaluating user-defined expressions.
/// - **Symbolic**: the model's relations as expression trees, checkable against the numerics.
/// - **Analysis**: observed-order convergence studies of the RK4 scheme.
pub mod traits;

#[cfg(test)]
mod proptest_trajectory;

pub use drag::{ConfiguredDrag, DragModel, DragConfig, ExpressionDrag, NoDrag};
pub use error::{ExpressionError, IntegrationError};
pub use rocket::{delta_v, rocket_rhs, Derivative, RocketConfig, RocketParams, G0};
pub use trajectory::{integrate, integrate_vertical_rocket, GridPolicy, IntegrationSettings, Trajectory};
