use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric type the solvers and the expression VM are generic over.
/// In practice this is `f64`; the bound keeps the RK4 kernel free of
/// hard-coded float literals.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A first-order ODE system `dx/dt = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Length of the state vector.
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out`.
    /// `x` and `out` both have length `dimension()`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A fixed-step integrator.
pub trait Steppable<T: Scalar> {
    /// Advances `state` from `*t` to `*t + dt` in place and updates `t`.
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
