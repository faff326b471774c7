use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Classic Runge-Kutta 4th Order Solver.
///
/// The struct owns scratch buffers only. Every buffer is overwritten before
/// it is read, so the result of `step` depends on nothing but its arguments.
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }

    pub fn dimension(&self) -> usize {
        self.tmp.len()
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        debug_assert_eq!(state.len(), self.dimension());
        debug_assert_eq!(system.dimension(), self.dimension());

        let two = T::one() + T::one();
        let six = two + two + two;
        let half_dt = dt / two;

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt/2*k1)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + half_dt * self.k1[i];
        }
        system.apply(t0 + half_dt, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt/2*k2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + half_dt * self.k2[i];
        }
        system.apply(t0 + half_dt, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        let weight = dt / six;
        for i in 0..state.len() {
            state[i] = state[i]
                + weight * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// x' = -x
    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    /// x' = t. RK4 reduces to Simpson's rule here, which is exact.
    struct Ramp;

    impl DynamicalSystem<f64> for Ramp {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, t: f64, _x: &[f64], out: &mut [f64]) {
            out[0] = t;
        }
    }

    /// Harmonic oscillator x'' = -x as a 2D flow.
    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    #[test]
    fn single_step_matches_taylor_polynomial() {
        let mut solver = RK4::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        let dt = 0.1;
        solver.step(&Decay, &mut t, &mut state, dt);

        // RK4 reproduces the 4th order Taylor expansion of exp(-dt) exactly.
        let expected = 1.0 - dt + dt * dt / 2.0 - dt.powi(3) / 6.0 + dt.powi(4) / 24.0;
        assert_relative_eq!(state[0], expected, epsilon = 1e-14);
        assert_relative_eq!(t, dt);
    }

    #[test]
    fn time_dependent_rhs_is_integrated_exactly() {
        let mut solver = RK4::new(1);
        let mut t = 1.0;
        let mut state = [0.0];
        for _ in 0..10 {
            solver.step(&Ramp, &mut t, &mut state, 0.25);
        }
        // x(t) = (t^2 - 1) / 2
        assert_relative_eq!(state[0], (t * t - 1.0) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn oscillator_stays_on_unit_circle() {
        let mut solver = RK4::new(2);
        let mut t = 0.0;
        let mut state = [1.0, 0.0];
        let dt = 0.01;
        let steps = (2.0 * std::f64::consts::PI / dt).round() as usize;
        for _ in 0..steps {
            solver.step(&Oscillator, &mut t, &mut state, dt);
        }
        let radius = (state[0] * state[0] + state[1] * state[1]).sqrt();
        assert!((radius - 1.0).abs() < 1e-8, "radius drifted to {radius}");
    }

    #[test]
    fn scratch_buffers_do_not_leak_between_calls() {
        let mut reused = RK4::new(2);
        let mut t_a = 0.0;
        let mut a = [0.3, -0.7];
        reused.step(&Oscillator, &mut t_a, &mut a, 0.5);

        let mut t_b = 2.0;
        let mut b = [1.0, 2.0];
        reused.step(&Oscillator, &mut t_b, &mut b, 0.1);

        let mut fresh = RK4::new(2);
        let mut t_c = 2.0;
        let mut c = [1.0, 2.0];
        fresh.step(&Oscillator, &mut t_c, &mut c, 0.1);

        assert_eq!(b, c);
        assert_eq!(t_b, t_c);
    }
}
